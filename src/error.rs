use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("layout is empty")]
    EmptyLayout,

    #[error("layout row {row} has width {width}, expected {expected}")]
    RaggedLayout {
        row: usize,
        width: usize,
        expected: usize,
    },

    #[error("unknown layout symbol {symbol:?} at row {row}, col {col}")]
    UnknownSymbol { symbol: char, row: usize, col: usize },

    #[error("layout has no player start marker '@'")]
    MissingPlayerStart,

    #[error("layout has more than one player start marker (second at row {row}, col {col})")]
    DuplicatePlayerStart { row: usize, col: usize },

    #[error("agent cell ({row}, {col}) is not open floor inside the pen")]
    BadAgentCell { row: i32, col: i32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("malformed score record on line {line}: {text:?}")]
    ScoreRecord { line: usize, text: String },

    #[error("failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shutdown timed out: engine exited = {engine_exited}, agents exited = {agents_exited}/{agents_total}")]
    ShutdownTimeout {
        engine_exited: bool,
        agents_exited: usize,
        agents_total: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
