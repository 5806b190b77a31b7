//! Lobby configuration
//!
//! Timing and scoring knobs for the shared session, with validation bounds
//! taken from [`crate::constants`]. Defaults match the classic 15 second
//! round with a 5 second intermission and one point per correct answer.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use super::constants;

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Validates the answering window of a round
fn validate_round_duration(val: &Duration) -> ValidationResult {
    validate_duration::<
        { constants::lobby::MIN_ROUND_SECONDS },
        { constants::lobby::MAX_ROUND_SECONDS },
    >("round_duration", val)
}

/// Validates the pause between rounds
fn validate_intermission(val: &Duration) -> ValidationResult {
    validate_duration::<
        { constants::lobby::MIN_INTERMISSION_SECONDS },
        { constants::lobby::MAX_INTERMISSION_SECONDS },
    >("intermission", val)
}

/// Configuration for the shared live session
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct LobbyConfig {
    /// How long participants have to answer once a round starts
    #[garde(custom(|v, _| validate_round_duration(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub round_duration: Duration,
    /// Pause between a round's settlement and the next round's start
    #[garde(custom(|v, _| validate_intermission(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub intermission: Duration,
    /// Points awarded for a correct answer
    #[garde(range(min = 1, max = constants::scoring::MAX_POINTS_AWARDED))]
    pub points_awarded: u64,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(constants::lobby::DEFAULT_ROUND_SECONDS),
            intermission: Duration::from_secs(constants::lobby::DEFAULT_INTERMISSION_SECONDS),
            points_awarded: constants::scoring::DEFAULT_POINTS_AWARDED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LobbyConfig::default().validate().is_ok());
    }

    #[test]
    fn round_duration_below_minimum_is_rejected() {
        let config = LobbyConfig {
            round_duration: Duration::from_secs(constants::lobby::MIN_ROUND_SECONDS - 1),
            ..LobbyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn intermission_above_maximum_is_rejected() {
        let config = LobbyConfig {
            intermission: Duration::from_secs(constants::lobby::MAX_INTERMISSION_SECONDS + 1),
            ..LobbyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_points_awarded_is_rejected() {
        let config = LobbyConfig {
            points_awarded: 0,
            ..LobbyConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations_serialize_as_milliseconds() {
        let json = serde_json::to_string(&LobbyConfig::default()).unwrap();
        assert!(json.contains("\"round_duration\":15000"));
        assert!(json.contains("\"intermission\":5000"));
    }
}
