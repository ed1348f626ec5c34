//! Tokenizer and typed parser for the hyphen-delimited command grammar.
//!
//! Commands are positional: `category-action-value[-duration]`.
//!
//! | Input | Parsed |
//! |---|---|
//! | `manual-throttle-forward` | [`Command::Throttle`] with default duration |
//! | `manual-throttle-forward-1000` | [`Command::Throttle`] for 1000 ms |
//! | `manual-turn-left` | [`Command::Turn`] |
//! | `face-begin` / `face-end` | [`Command::FaceTracking`] |
//! | `red-begin` / `red-end` | [`Command::RedTracking`] |
//! | anything else (`stop`, …) | [`Command::Stop`] |
//!
//! Value tokens stay raw strings here; they are resolved against the
//! [`NamedValues`][crate::named_values::NamedValues] table at dispatch time.

use std::str::FromStr;

use thiserror::Error;

/// Split a raw command on `-`.  Never fails; an empty input yields `[""]`.
pub fn tokenize(raw: &str) -> Vec<&str> {
    raw.split('-').collect()
}

/// A structured command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set the throttle and (re)arm the stop timer.
    Throttle {
        value: String,
        /// `None` means "use the configured `throttleTime`".
        duration: Option<String>,
    },
    /// Set the steering directly.  No timer.
    Turn { value: String },
    /// Toggle upper-body tracking for the vision subsystem.
    FaceTracking { begin: bool },
    /// Toggle red-object tracking for the vision subsystem.
    RedTracking { begin: bool },
    /// Centre the steering and cut the throttle immediately.
    Stop,
}

/// A recognised prefix with too few or unknown tokens after it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("manual command has no action")]
    MissingAction,

    #[error("unknown manual action '{0}'")]
    UnknownAction(String),

    #[error("manual {action} command has no value")]
    MissingValue { action: &'static str },
}

impl Command {
    /// Parse a raw command string.
    ///
    /// Tokens past the ones a pattern needs are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] for `manual` commands whose action or value
    /// token is missing or unknown.  Every other input parses; unknown
    /// categories deliberately map to [`Command::Stop`].
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        let tokens = tokenize(raw);
        let arg = |i: usize| tokens.get(i).copied();

        match tokens[0] {
            "manual" => match arg(1) {
                Some("throttle") => {
                    let value = arg(2).ok_or(CommandError::MissingValue { action: "throttle" })?;
                    Ok(Command::Throttle {
                        value: value.to_string(),
                        duration: arg(3).map(str::to_string),
                    })
                }
                Some("turn") => {
                    let value = arg(2).ok_or(CommandError::MissingValue { action: "turn" })?;
                    Ok(Command::Turn {
                        value: value.to_string(),
                    })
                }
                Some(other) => Err(CommandError::UnknownAction(other.to_string())),
                None => Err(CommandError::MissingAction),
            },
            "face" => Ok(Command::FaceTracking {
                begin: arg(1) == Some("begin"),
            }),
            "red" => Ok(Command::RedTracking {
                begin: arg(1) == Some("begin"),
            }),
            _ => Ok(Command::Stop),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s)
    }
}
