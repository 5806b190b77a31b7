//! Boundary events emitted by the lobby
//!
//! This module defines every message that crosses the core's boundary:
//! pushed update events, connect-time synchronization payloads, and the
//! alarm messages the hosting layer schedules and feeds back into the
//! lobby when timers fire. All payloads are semantic; the transport layer
//! decides the wire framing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Why a participant left the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveReason {
    /// The participant asked to leave
    Request,
    /// The client reported an abnormal shutdown before leaving
    Crash,
    /// The connection dropped without an explicit leave
    Disconnect,
}

/// One row of the participant list snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerEntry {
    /// Display name of the participant
    pub name: String,
    /// Current total score
    pub score: u64,
    /// Whether an answer was accepted from them this round
    pub has_answered: bool,
    /// Whether they are permitted to answer the current round
    pub eligible: bool,
}

/// Per-participant outcome of a settled round
///
/// `submitted_answer` and `correct` are `None` for participants who never
/// answered; ineligible participants are reported with `was_eligible == false`
/// and are never scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerResult {
    /// Display name of the participant
    pub name: String,
    /// The answer they submitted, if any
    pub submitted_answer: Option<String>,
    /// Whether the submitted answer was correct, if any was submitted
    pub correct: Option<bool>,
    /// Points earned this round
    pub points_earned: u64,
    /// Total score after settlement
    pub total_score: u64,
    /// Whether they were eligible to answer this round
    pub was_eligible: bool,
}

/// One ranked row of the leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// Position in the leaderboard (1-indexed)
    pub rank: usize,
    /// Display name of the account
    pub name: String,
    /// Durable point total
    pub points: u64,
}

/// Events pushed to connected clients as the session progresses
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum UpdateMessage {
    /// A new round has started; the correct answer is never included
    NewRound {
        /// Monotonically increasing round number, starting at 1
        round_number: u64,
        /// The question prompt
        prompt: String,
    },
    /// A participant's answer was accepted (identity only, never the choice)
    PlayerAnswered {
        /// Display name of the participant who answered
        name: String,
    },
    /// Confirmation to the submitter that their answer was recorded
    AnswerAccepted {
        /// The choice that was recorded
        choice: String,
    },
    /// A round settled; reveals the correct answer and per-participant results
    RoundEnd {
        /// The correct answer for the round's question
        correct_answer: String,
        /// Where the question came from, when known
        source: Option<String>,
        /// Outcome for every currently registered participant
        results: Vec<AnswerResult>,
    },
    /// A participant joined the session
    PlayerJoined {
        /// Display name of the new participant
        name: String,
    },
    /// A participant left the session
    PlayerLeft {
        /// Display name of the departed participant
        name: String,
        /// Why they left
        reason: LeaveReason,
    },
    /// Full participant list snapshot for UI sync
    PlayerListUpdate {
        /// One entry per registered participant, in join order
        players: Vec<PlayerEntry>,
    },
    /// Reply to a source request from a participant who already answered
    SourceResponse {
        /// Source reference of the current question
        source: String,
    },
    /// Reply to a leaderboard request
    LeaderboardUpdate {
        /// Top accounts by durable point total
        entries: Vec<LeaderboardEntry>,
    },
    /// A command was rejected; sent only to the offending caller
    Error {
        /// Human-readable rejection reason
        message: String,
    },
}

/// The round in progress, as seen by a participant joining mid-round
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct CurrentRound {
    /// Number of the round in progress
    pub round_number: u64,
    /// The question prompt
    pub prompt: String,
    /// Time left before the round times out
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub remaining: Duration,
}

/// State sent to a single connection to synchronize its view
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub enum SyncMessage {
    /// Sent to a participant right after a successful join
    JoinSuccess {
        /// Current participant list, in join order
        players: Vec<PlayerEntry>,
        /// The display name the session resolved for the joiner
        your_name: String,
        /// The round in progress, if any; late joiners cannot answer it
        round: Option<CurrentRound>,
    },
}

/// Timer payloads scheduled by the lobby and fed back on expiry
///
/// Each alarm carries the round number it was armed for; the lobby ignores
/// alarms whose round no longer matches, which is how superseded timers are
/// cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The answering window for the given round has elapsed
    RoundTimeout {
        /// Round the timeout was armed for
        round: u64,
    },
    /// The intermission after the given round has elapsed
    IntermissionOver {
        /// Round whose settlement scheduled this alarm
        round: u64,
    },
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_message_serializes_round_fields() {
        let message = UpdateMessage::NewRound {
            round_number: 3,
            prompt: "Who said it?".to_owned(),
        };
        let json = message.to_message();

        assert!(json.contains("NewRound"));
        assert!(json.contains("\"round_number\":3"));
        assert!(json.contains("Who said it?"));
    }

    #[test]
    fn round_end_keeps_null_result_fields() {
        let message = UpdateMessage::RoundEnd {
            correct_answer: "B".to_owned(),
            source: None,
            results: vec![AnswerResult {
                name: "ada".to_owned(),
                submitted_answer: None,
                correct: None,
                points_earned: 0,
                total_score: 2,
                was_eligible: true,
            }],
        };
        let json = message.to_message();

        // An unanswered result is reported as null, not omitted.
        assert!(json.contains("\"submitted_answer\":null"));
        assert!(json.contains("\"correct\":null"));
        // The optional source on the event itself is skipped when absent.
        assert!(!json.contains("\"source\""));
    }

    #[test]
    fn sync_message_reports_remaining_millis() {
        let message = SyncMessage::JoinSuccess {
            players: Vec::new(),
            your_name: "grace".to_owned(),
            round: Some(CurrentRound {
                round_number: 1,
                prompt: "?".to_owned(),
                remaining: Duration::from_secs(9),
            }),
        };
        let json = message.to_message();

        assert!(json.contains("\"remaining\":9000"));
    }

    #[test]
    fn leave_reason_uses_snake_case() {
        let json = serde_json::to_string(&LeaveReason::Disconnect).unwrap();
        assert_eq!(json, "\"disconnect\"");
    }
}
