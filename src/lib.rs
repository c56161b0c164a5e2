pub mod board;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod ghost_house;
pub mod input_queue;
pub mod metronome;
pub mod runtime;
pub mod score_store;
pub mod shutdown;
pub mod types;
pub mod ui;

pub use crate::error::{Result, SimError};
pub use crate::runtime::Simulation;
