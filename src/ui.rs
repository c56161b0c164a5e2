use serde::Serialize;

use crate::constants::{DEFAULT_USERNAME, MAX_NAME_LEN};
use crate::types::{InputEvent, Screen};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuItem {
    Play,
    Scoreboard,
    Instructions,
    Quit,
}

impl MenuItem {
    pub const ALL: [MenuItem; 4] = [
        MenuItem::Play,
        MenuItem::Scoreboard,
        MenuItem::Instructions,
        MenuItem::Quit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Scoreboard => "Scoreboard",
            Self::Instructions => "Instructions",
            Self::Quit => "Quit",
        }
    }

    pub fn screen(self) -> Screen {
        match self {
            Self::Play => Screen::Play,
            Self::Scoreboard => Screen::Scoreboard,
            Self::Instructions => Screen::Instructions,
            Self::Quit => Screen::Quit,
        }
    }
}

/// Main menu cursor plus the name scores are recorded under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Menu {
    selection: usize,
    username: String,
}

impl Default for Menu {
    fn default() -> Self {
        Self {
            selection: 0,
            username: DEFAULT_USERNAME.to_string(),
        }
    }
}

impl Menu {
    pub fn selection(&self) -> usize {
        self.selection
    }

    pub fn selected(&self) -> MenuItem {
        MenuItem::ALL[self.selection % MenuItem::ALL.len()]
    }

    pub fn move_up(&mut self) {
        let len = MenuItem::ALL.len();
        self.selection = (self.selection + len - 1) % len;
    }

    pub fn move_down(&mut self) {
        self.selection = (self.selection + 1) % MenuItem::ALL.len();
    }

    /// Event to publish for the highlighted item.
    pub fn select(&self) -> InputEvent {
        InputEvent::ScreenChange(self.selected().screen())
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn set_username(&mut self, name: &str) {
        self.username = name.chars().take(MAX_NAME_LEN).collect();
    }

    pub fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() || self.username.chars().count() >= MAX_NAME_LEN {
            return false;
        }
        self.username.push(ch);
        true
    }

    pub fn pop_char(&mut self) -> Option<char> {
        self.username.pop()
    }
}
