//! [`NamedValues`] – symbolic command tokens mapped to servo values.
//!
//! `manual-throttle-forward` and `manual-throttle-65` mean the same thing
//! with the default table.  The table also carries the default throttle
//! duration under the key `throttleTime`.

use std::collections::BTreeMap;
use std::time::Duration;

use rcpilot_types::PilotError;
use serde::{Deserialize, Serialize};

/// Key holding the throttle stop-after duration in milliseconds.
pub const THROTTLE_TIME: &str = "throttleTime";
/// Key holding the throttle value that holds the car still.
pub const STOP: &str = "stop";
/// Key holding the straight-ahead steering value.
pub const NEUTRAL: &str = "neutral";

const DEFAULT_STOP: i32 = 90;
const DEFAULT_NEUTRAL: i32 = 75;
const DEFAULT_THROTTLE_TIME_MS: i32 = 500;

/// Read-only lookup table shared by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedValues(BTreeMap<String, i32>);

impl Default for NamedValues {
    fn default() -> Self {
        let table = [
            // throttle
            ("forward", 65),
            ("reverse", 105),
            (STOP, DEFAULT_STOP),
            (THROTTLE_TIME, DEFAULT_THROTTLE_TIME_MS),
            // steering
            ("left", 40),
            ("right", 100),
            (NEUTRAL, DEFAULT_NEUTRAL),
        ];
        Self(
            table
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl NamedValues {
    /// Default table with `overrides` layered on top.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (String, i32)>) -> Self {
        let mut values = Self::default();
        values.0.extend(overrides);
        values
    }

    pub fn get(&self, key: &str) -> Option<i32> {
        self.0.get(key).copied()
    }

    /// Resolve a value token: table key first, then a plain integer.
    ///
    /// # Errors
    ///
    /// [`PilotError::UnresolvedValue`] when the token is neither.
    pub fn resolve(&self, token: &str) -> Result<i32, PilotError> {
        if let Some(v) = self.get(token) {
            return Ok(v);
        }
        token.parse::<i32>().map_err(|_| PilotError::UnresolvedValue {
            token: token.to_string(),
        })
    }

    /// Resolve a duration token (milliseconds) the same way.
    ///
    /// # Errors
    ///
    /// [`PilotError::UnresolvedValue`] when the token is neither a key nor a
    /// non-negative integer.
    pub fn resolve_duration(&self, token: &str) -> Result<Duration, PilotError> {
        let unresolved = || PilotError::UnresolvedValue {
            token: token.to_string(),
        };
        let ms = match self.get(token) {
            Some(v) => u64::try_from(v).map_err(|_| unresolved())?,
            None => token.parse::<u64>().map_err(|_| unresolved())?,
        };
        Ok(Duration::from_millis(ms))
    }

    /// Throttle value that holds the car still.
    pub fn stop(&self) -> i32 {
        self.get(STOP).unwrap_or(DEFAULT_STOP)
    }

    /// Straight-ahead steering value.
    pub fn neutral(&self) -> i32 {
        self.get(NEUTRAL).unwrap_or(DEFAULT_NEUTRAL)
    }

    /// Default stop-after duration for throttle commands.
    pub fn throttle_time(&self) -> Duration {
        let ms = self
            .get(THROTTLE_TIME)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(DEFAULT_THROTTLE_TIME_MS as u64);
        Duration::from_millis(ms)
    }
}
