pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod filter;
pub mod negotiation;
pub mod receipt;
pub mod record;
pub mod section;
pub mod selection;
pub mod sort;
pub mod storage;
pub mod view;

pub use api::{HttpMarketApi, MarketApi};
pub use app::{App, Command, Message};
pub use config::Config;
pub use error::{MarketError, MarketResult};
pub use record::{FileKind, FileRecord, PeerRecord, Section, Wallet};

/// Outcome of offering a response to the state it was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
	Accepted,
	/// The request was superseded or its session closed; nothing changed.
	Stale,
}
