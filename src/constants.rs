//! Configuration constants for the quiz lobby
//!
//! This module contains the timing, scoring, and capacity limits used
//! throughout the lobby so they live in one place and validation bounds
//! stay consistent with defaults.

/// Lobby capacity and round timing constants
pub mod lobby {
    /// Maximum number of participants allowed in the shared session
    pub const MAX_PLAYER_COUNT: usize = 1000;
    /// Default duration of the answering window for a round, in seconds
    pub const DEFAULT_ROUND_SECONDS: u64 = 15;
    /// Default pause between a round's settlement and the next round, in seconds
    pub const DEFAULT_INTERMISSION_SECONDS: u64 = 5;
    /// Minimum allowed answering window, in seconds
    pub const MIN_ROUND_SECONDS: u64 = 5;
    /// Maximum allowed answering window, in seconds
    pub const MAX_ROUND_SECONDS: u64 = 240;
    /// Minimum allowed intermission, in seconds
    pub const MIN_INTERMISSION_SECONDS: u64 = 1;
    /// Maximum allowed intermission, in seconds
    pub const MAX_INTERMISSION_SECONDS: u64 = 60;
}

/// Scoring constants
pub mod scoring {
    /// Default points awarded for a correct answer
    pub const DEFAULT_POINTS_AWARDED: u64 = 1;
    /// Maximum configurable points per correct answer
    pub const MAX_POINTS_AWARDED: u64 = 1000;
}

/// Leaderboard constants
pub mod leaderboard {
    /// Number of rows returned by a leaderboard request
    pub const TOP_LIMIT: usize = 10;
}
