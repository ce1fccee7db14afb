//! Typed search errors.

use crate::state::StateDecodeError;

/// Typed failure for search operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchError {
    /// A configuration value was outside its legal range.
    InvalidParams { detail: String },

    /// `get_result()` was called before the search reached a terminal
    /// state.
    ResultNotReady,

    /// A state snapshot failed to decode.
    StateDecode(StateDecodeError),
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParams { detail } => write!(f, "invalid search params: {detail}"),
            Self::ResultNotReady => {
                write!(f, "result requested before the search reached a terminal state")
            }
            Self::StateDecode(e) => write!(f, "state snapshot decode failed: {e}"),
        }
    }
}

impl std::error::Error for SearchError {}

impl From<StateDecodeError> for SearchError {
    fn from(e: StateDecodeError) -> Self {
        Self::StateDecode(e)
    }
}
