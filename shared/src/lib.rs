use serde::{Deserialize, Serialize};

pub const CLIENT_VERSION: u32 = 1;
pub const PAIR_COUNT: usize = 8;
pub const DECK_SIZE: usize = PAIR_COUNT * 2;
pub const HISTORY_LIMIT: usize = 20;
pub const MISMATCH_DELAY_MS: u64 = 900;
pub const MAX_NAME_LEN: usize = 32;
pub const MAX_PACKET_SIZE: usize = 16 * 1024;
/// Room reserved for everything in a snapshot except the roster
pub const SNAPSHOT_BASE_BUDGET: usize = 6 * 1024;
/// Worst-case encoded size of one `Player`: id, name length prefix, name, score
pub const PLAYER_WIRE_BUDGET: usize = 4 + 8 + MAX_NAME_LEN * 4 + 4;
/// Largest roster whose snapshot still fits in one datagram
pub const MAX_CLIENTS: usize = (MAX_PACKET_SIZE - SNAPSHOT_BASE_BUDGET) / PLAYER_WIRE_BUDGET;
pub const HEARTBEAT_INTERVAL_MS: u64 = 1000;
pub const CLIENT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_THEME_KEY: &str = "animals";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    JoinGame {
        name: String,
        theme_key: Option<String>,
    },
    FlipCard {
        index: i64,
    },
    ResetGame,
    ChangeTheme {
        theme_key: String,
    },
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
    },
    State(Snapshot),
    Error {
        message: String,
    },
    Disconnected {
        reason: String,
    },
}

/// A named set of symbols a deck is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub key: &'static str,
    pub label: &'static str,
    pub symbols: [&'static str; PAIR_COUNT],
}

pub static THEMES: [Theme; 4] = [
    Theme {
        key: "animals",
        label: "Animals",
        symbols: ["🐶", "🐱", "🐭", "🦊", "🐻", "🐼", "🐸", "🐵"],
    },
    Theme {
        key: "fruits",
        label: "Fruits",
        symbols: ["🍎", "🍌", "🍇", "🍉", "🍓", "🍑", "🍒", "🍍"],
    },
    Theme {
        key: "shapes",
        label: "Geometric Shapes",
        symbols: ["🔺", "🔻", "🔵", "🟢", "🟥", "🟨", "⬛", "⬜"],
    },
    Theme {
        key: "emojis",
        label: "Assorted Emojis",
        symbols: ["⭐", "🔥", "💧", "⚡", "🌙", "🌈", "❄️", "☀️"],
    },
];

pub fn themes() -> &'static [Theme] {
    &THEMES
}

pub fn default_theme() -> &'static Theme {
    &THEMES[0]
}

pub fn find_theme(key: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|theme| theme.key == key)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: usize,
    pub value: String,
    pub is_revealed: bool,
    pub is_matched: bool,
}

impl Card {
    pub fn new(id: usize, value: &str) -> Self {
        Self {
            id,
            value: value.to_string(),
            is_revealed: false,
            is_matched: false,
        }
    }

    pub fn is_face_up(&self) -> bool {
        self.is_revealed || self.is_matched
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub score: u32,
}

impl Player {
    pub fn new(id: u32, name: String) -> Self {
        Self { id, name, score: 0 }
    }
}

/// One resolved two-card attempt.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub player_name: String,
    pub description: String,
    pub success: bool,
    pub timestamp: u64,
}

/// Full session state pushed to every connected client after each change.
///
/// Face-down card values are included; hiding them is left to the renderer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub players: Vec<Player>,
    pub turn: usize,
    pub cards: Vec<Card>,
    pub revealed_indices: Vec<usize>,
    pub move_history: Vec<MoveRecord>,
    pub is_finished: bool,
    pub theme_key: String,
    pub theme_label: String,
}

impl Snapshot {
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.turn)
    }

    pub fn is_turn_of(&self, player_id: u32) -> bool {
        self.current_player()
            .map_or(false, |player| player.id == player_id)
    }
}
