use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Requests an operator can make of a running viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OperatorCommand {
    Toggle,
    /// `steps` is kept untyped so range and integrality checks happen in one place.
    Train {
        #[serde(default)]
        steps: Option<f64>,
    },
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed JSON command: {0}")]
    Json(#[from] serde_json::Error),
}

impl FromStr for OperatorCommand {
    type Err = CommandError;

    /// Accepts JSON (`{"command":"train","steps":5000}`) or a text line (`train 5000`).
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.starts_with('{') {
            return Ok(serde_json::from_str(line)?);
        }

        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?;
        let command = match verb.to_ascii_lowercase().as_str() {
            "toggle" => OperatorCommand::Toggle,
            "train" => {
                let steps = match words.next() {
                    Some(raw) => Some(
                        raw.replace('_', "")
                            .parse::<f64>()
                            .map_err(|_| CommandError::InvalidArgument(raw.to_string()))?,
                    ),
                    None => None,
                };
                OperatorCommand::Train { steps }
            }
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        if let Some(extra) = words.next() {
            return Err(CommandError::InvalidArgument(extra.to_string()));
        }
        Ok(command)
    }
}
