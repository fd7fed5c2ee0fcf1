use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Deref;
use thiserror::Error;

const AGENT_ID_MAX_LENGTH: usize = 32;

/// Unique identifier of a managed agent instance.
///
/// At most 32 characters, lowercase alphanumeric or dashes only, starting
/// alphabetic and ending alphanumeric, so ids embed cleanly in compose
/// service names, thread names, and log fields.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Hash, Eq)]
#[serde(try_from = "String")]
pub struct AgentID(String);

#[derive(Error, Debug)]
pub enum AgentIDError {
    #[error("agent ids must contain {AGENT_ID_MAX_LENGTH} characters at most, contain lowercase alphanumeric characters or dashes only, start with alphabetic, and end with alphanumeric")]
    InvalidFormat,
}

impl AgentID {
    pub fn new(s: &str) -> Result<Self, AgentIDError> {
        Self::try_from(s.to_string())
    }

    fn is_valid_format(s: &str) -> bool {
        s.len() <= AGENT_ID_MAX_LENGTH
            && s.starts_with(|c: char| c.is_ascii_lowercase())
            && s.ends_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit())
            && s.chars()
                .all(|c| c.eq(&'-') || c.is_ascii_digit() || c.is_ascii_lowercase())
    }
}

impl TryFrom<String> for AgentID {
    type Error = AgentIDError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if AgentID::is_valid_format(&s) {
            Ok(AgentID(s))
        } else {
            Err(AgentIDError::InvalidFormat)
        }
    }
}

impl Deref for AgentID {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for AgentID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}
