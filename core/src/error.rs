use thiserror::Error;

/// Failures scoped to a single view or negotiation session. None of these is
/// fatal to the host process.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
	/// Bad user input, caught before anything is dispatched.
	#[error("{0}")]
	Validation(String),

	#[error("{0}")]
	NotFound(String),

	/// A network call failed. The caller keeps its prior state so the step can
	/// be retried.
	#[error("request failed: {0}")]
	Transport(String),

	#[error("could not save file: {0}")]
	Storage(String),

	/// A request of the same kind is still outstanding.
	#[error("{0} is already in progress")]
	Busy(&'static str),

	/// The operation is not available in the current state, section or
	/// selection.
	#[error("{0}")]
	Unavailable(String),
}

pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
	pub fn validation(msg: impl Into<String>) -> Self {
		MarketError::Validation(msg.into())
	}

	pub fn unavailable(msg: impl Into<String>) -> Self {
		MarketError::Unavailable(msg.into())
	}

	pub fn is_transport(&self) -> bool {
		matches!(self, MarketError::Transport(_))
	}
}

impl From<reqwest::Error> for MarketError {
	fn from(err: reqwest::Error) -> Self {
		MarketError::Transport(err.to_string())
	}
}

impl From<std::io::Error> for MarketError {
	fn from(err: std::io::Error) -> Self {
		MarketError::Storage(err.to_string())
	}
}
