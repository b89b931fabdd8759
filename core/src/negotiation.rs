//! Download negotiation: hash lookup, provider discovery, per-peer metadata,
//! confirmation against the wallet balance, then transfer.
//!
//! The session never performs I/O. Each transition that needs the network
//! returns a [`Request`] carrying a [`Ticket`], and the matching response
//! method only applies a result whose ticket is still the outstanding one.

use std::path::PathBuf;

use crate::Applied;
use crate::error::{MarketError, MarketResult};
use crate::receipt::{BalanceGate, Receipt};
use crate::record::{FileRecord, PeerRecord, Wallet};

pub const EMPTY_HASH: &str = "Please input a hash value.";
pub const NO_PROVIDERS: &str = "No file found with that hash.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NegotiationState {
	#[default]
	Idle,
	Searching,
	PeerList,
	NotFound,
	MetadataLoading,
	Confirming,
	Transferring,
	Complete,
	Failed,
}

impl NegotiationState {
	/// A request of this session is in flight.
	pub fn is_busy(self) -> bool {
		matches!(
			self,
			NegotiationState::Searching
				| NegotiationState::MetadataLoading
				| NegotiationState::Transferring
		)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
	pub epoch: u64,
	pub seq: u64,
	pub hash: String,
	pub peer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
	Wallet { epoch: u64 },
	FindProviders { ticket: Ticket },
	Metadata { ticket: Ticket },
	Download {
		ticket: Ticket,
		price: f64,
		record: FileRecord,
	},
}

/// A payload written to the download directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
	pub path: PathBuf,
	pub record: FileRecord,
}

#[derive(Debug, Clone, Default)]
pub struct NegotiationSession {
	epoch: u64,
	seq: u64,
	open: bool,
	hash: String,
	state: NegotiationState,
	/// Where a failed provider lookup returns to.
	resume: NegotiationState,
	pending: Option<Ticket>,
	peers: Vec<PeerRecord>,
	selected_peer: Option<String>,
	metadata: Option<FileRecord>,
	wallet_balance: Option<f64>,
	wallet_pending: bool,
	/// Kept apart from `error` so later steps do not clear it.
	wallet_error: Option<MarketError>,
	error: Option<MarketError>,
	saved: Option<SavedFile>,
}

impl NegotiationSession {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_open(&self) -> bool {
		self.open
	}

	pub fn epoch(&self) -> u64 {
		self.epoch
	}

	pub fn state(&self) -> NegotiationState {
		self.state
	}

	pub fn hash(&self) -> &str {
		&self.hash
	}

	pub fn peers(&self) -> &[PeerRecord] {
		&self.peers
	}

	pub fn selected_peer(&self) -> Option<&str> {
		self.selected_peer.as_deref()
	}

	pub fn metadata(&self) -> Option<&FileRecord> {
		self.metadata.as_ref()
	}

	pub fn wallet_balance(&self) -> Option<f64> {
		self.wallet_balance
	}

	/// The last step's error, else a failed wallet fetch.
	pub fn error(&self) -> Option<&MarketError> {
		self.error.as_ref().or(self.wallet_error.as_ref())
	}

	pub fn wallet_error(&self) -> Option<&MarketError> {
		self.wallet_error.as_ref()
	}

	pub fn saved(&self) -> Option<&SavedFile> {
		self.saved.as_ref()
	}

	/// Discovery can be re-run from the peer list when nothing is in flight.
	pub fn can_refresh_peers(&self) -> bool {
		self.state == NegotiationState::PeerList
	}

	/// Starts a fresh session. Returns the wallet fetch, followed by the
	/// provider lookup when `hash` is given.
	pub fn open(&mut self, hash: Option<&str>) -> Vec<Request> {
		self.reset();
		self.open = true;
		self.wallet_pending = true;
		log::debug!("negotiation {} opened", self.epoch);
		let mut requests = vec![Request::Wallet { epoch: self.epoch }];
		if let Some(hash) = hash {
			match self.submit(hash) {
				Ok(request) => requests.push(request),
				Err(err) => log::debug!("lookup not started: {err}"),
			}
		}
		requests
	}

	/// Ends the session from any state. Late responses are ignored.
	pub fn close(&mut self) {
		log::debug!("negotiation {} closed in {:?}", self.epoch, self.state);
		self.reset();
	}

	fn reset(&mut self) {
		let epoch = self.epoch + 1;
		*self = Self {
			epoch,
			..Self::default()
		};
	}

	fn issue(&mut self, peer: Option<String>) -> Ticket {
		self.seq += 1;
		let ticket = Ticket {
			epoch: self.epoch,
			seq: self.seq,
			hash: self.hash.clone(),
			peer,
		};
		self.pending = Some(ticket.clone());
		ticket
	}

	fn accepts(&self, ticket: &Ticket, expected: NegotiationState) -> bool {
		let current = self.open && self.state == expected && self.pending.as_ref() == Some(ticket);
		if !current {
			log::debug!(
				"dropping stale response for {} (epoch {}, seq {})",
				ticket.hash,
				ticket.epoch,
				ticket.seq
			);
		}
		current
	}

	fn ensure_open(&self) -> MarketResult<()> {
		if !self.open {
			return Err(MarketError::unavailable("No download is in progress."));
		}
		Ok(())
	}

	fn ensure_idle(&self, what: &'static str) -> MarketResult<()> {
		self.ensure_open()?;
		if self.state.is_busy() {
			return Err(MarketError::Busy(what));
		}
		Ok(())
	}

	fn fail(&mut self, err: MarketError) -> MarketError {
		self.error = Some(err.clone());
		err
	}

	/// Looks up the providers of `hash`.
	pub fn submit(&mut self, hash: &str) -> MarketResult<Request> {
		self.ensure_idle("a search")?;
		if self.state == NegotiationState::Confirming {
			return Err(MarketError::unavailable(
				"Decline the current offer before searching again.",
			));
		}
		let hash = hash.trim();
		if hash.is_empty() {
			return Err(self.fail(MarketError::validation(EMPTY_HASH)));
		}
		self.hash = hash.to_string();
		self.peers.clear();
		self.selected_peer = None;
		self.metadata = None;
		self.saved = None;
		self.error = None;
		if !hash.chars().all(|c| c.is_ascii_alphanumeric()) {
			self.state = NegotiationState::NotFound;
			return Err(self.fail(MarketError::NotFound(NO_PROVIDERS.to_string())));
		}
		self.resume = NegotiationState::Idle;
		self.state = NegotiationState::Searching;
		Ok(Request::FindProviders {
			ticket: self.issue(None),
		})
	}

	pub fn refresh_peers(&mut self) -> MarketResult<Request> {
		self.ensure_idle("a search")?;
		if !self.can_refresh_peers() {
			return Err(MarketError::unavailable("There is no peer list to refresh."));
		}
		self.resume = NegotiationState::PeerList;
		self.state = NegotiationState::Searching;
		self.error = None;
		Ok(Request::FindProviders {
			ticket: self.issue(None),
		})
	}

	pub fn peers_loaded(&mut self, ticket: &Ticket, result: MarketResult<Vec<String>>) -> Applied {
		if !self.accepts(ticket, NegotiationState::Searching) {
			return Applied::Stale;
		}
		self.pending = None;
		match result {
			Ok(ids) => {
				let mut peers: Vec<PeerRecord> = Vec::with_capacity(ids.len());
				for id in ids {
					let id = id.trim();
					if id.is_empty() || peers.iter().any(|p| p.peer_id == id) {
						continue;
					}
					let known = self
						.peers
						.iter()
						.find(|p| p.peer_id == id)
						.and_then(|p| p.price);
					peers.push(PeerRecord {
						peer_id: id.to_string(),
						price: known,
					});
				}
				self.peers = peers;
				if self.peers.is_empty() {
					log::info!("no providers for {}", self.hash);
					self.state = NegotiationState::NotFound;
					self.error = Some(MarketError::NotFound(NO_PROVIDERS.to_string()));
				} else {
					log::info!("{} providers for {}", self.peers.len(), self.hash);
					self.state = NegotiationState::PeerList;
					self.error = None;
				}
			}
			Err(err) => {
				log::warn!("provider lookup for {} failed: {err}", self.hash);
				self.state = self.resume;
				self.error = Some(err);
			}
		}
		Applied::Accepted
	}

	/// Picks a provider and asks it for the file's metadata. Picking another
	/// peer while a metadata request is in flight supersedes it.
	pub fn select_peer(&mut self, peer_id: &str) -> MarketResult<Request> {
		self.ensure_open()?;
		if !matches!(
			self.state,
			NegotiationState::PeerList | NegotiationState::MetadataLoading
		) {
			return Err(MarketError::unavailable("No peer list to choose from."));
		}
		if !self.peers.iter().any(|p| p.peer_id == peer_id) {
			return Err(MarketError::NotFound(format!("Unknown peer: {peer_id}")));
		}
		self.selected_peer = Some(peer_id.to_string());
		self.metadata = None;
		self.error = None;
		self.state = NegotiationState::MetadataLoading;
		Ok(Request::Metadata {
			ticket: self.issue(Some(peer_id.to_string())),
		})
	}

	pub fn metadata_loaded(&mut self, ticket: &Ticket, result: MarketResult<FileRecord>) -> Applied {
		if !self.accepts(ticket, NegotiationState::MetadataLoading) {
			return Applied::Stale;
		}
		self.pending = None;
		match result {
			Ok(mut record) => {
				if record.hash.is_empty() {
					record.hash = self.hash.clone();
				}
				if let Some(peer) = self
					.peers
					.iter_mut()
					.find(|p| Some(p.peer_id.as_str()) == ticket.peer.as_deref())
				{
					peer.price = record.price;
				}
				self.metadata = Some(record);
				self.state = NegotiationState::Confirming;
			}
			Err(err) => {
				log::warn!("metadata from {:?} failed: {err}", ticket.peer);
				self.selected_peer = None;
				self.metadata = None;
				self.state = NegotiationState::PeerList;
				self.error = Some(err);
			}
		}
		Applied::Accepted
	}

	/// Goes back to the peer list, keeping the hash.
	pub fn decline(&mut self) -> MarketResult<()> {
		if self.state != NegotiationState::Confirming {
			return Err(MarketError::unavailable("Nothing to decline."));
		}
		self.selected_peer = None;
		self.metadata = None;
		self.error = None;
		self.state = NegotiationState::PeerList;
		Ok(())
	}

	pub fn receipt(&self) -> MarketResult<Receipt> {
		let record = match self.state {
			NegotiationState::Confirming
			| NegotiationState::Transferring
			| NegotiationState::Complete
			| NegotiationState::Failed => self.metadata.as_ref(),
			_ => None,
		}
		.ok_or_else(|| MarketError::unavailable("No file has been chosen yet."))?;
		let gate = BalanceGate::check(self.wallet_balance, record.price)?;
		Ok(Receipt::purchase(gate, record.clone()))
	}

	/// Commits the purchase. Also retries a failed transfer.
	pub fn confirm(&mut self) -> MarketResult<Request> {
		self.ensure_idle("a transfer")?;
		if !matches!(
			self.state,
			NegotiationState::Confirming | NegotiationState::Failed
		) {
			return Err(MarketError::unavailable("Nothing to confirm."));
		}
		let (Some(record), Some(peer)) = (self.metadata.clone(), self.selected_peer.clone()) else {
			return Err(MarketError::unavailable("No file has been chosen yet."));
		};
		let gate = match BalanceGate::check(self.wallet_balance, record.price) {
			Ok(gate) => gate,
			Err(err) => return Err(self.fail(err)),
		};
		if gate.overdrawn() {
			log::warn!(
				"purchase of {} leaves a negative balance of {}",
				self.hash,
				gate.new_balance
			);
		}
		self.error = None;
		self.state = NegotiationState::Transferring;
		Ok(Request::Download {
			ticket: self.issue(Some(peer)),
			price: gate.price,
			record,
		})
	}

	pub fn transfer_finished(&mut self, ticket: &Ticket, result: MarketResult<SavedFile>) -> Applied {
		if !self.accepts(ticket, NegotiationState::Transferring) {
			return Applied::Stale;
		}
		self.pending = None;
		match result {
			Ok(saved) => {
				log::info!("saved {} to {}", self.hash, saved.path.display());
				self.saved = Some(saved);
				self.state = NegotiationState::Complete;
			}
			Err(err) => {
				log::warn!("transfer of {} failed: {err}", self.hash);
				self.error = Some(err);
				self.state = NegotiationState::Failed;
			}
		}
		Applied::Accepted
	}

	/// Fetches the balance again, as after a failed wallet request.
	pub fn refresh_wallet(&mut self) -> MarketResult<Request> {
		self.ensure_open()?;
		if self.wallet_pending {
			return Err(MarketError::Busy("a wallet fetch"));
		}
		self.wallet_pending = true;
		self.wallet_error = None;
		Ok(Request::Wallet { epoch: self.epoch })
	}

	pub fn wallet_loaded(&mut self, epoch: u64, result: MarketResult<Wallet>) -> Applied {
		if !self.open || epoch != self.epoch {
			log::debug!("dropping wallet for closed negotiation {epoch}");
			return Applied::Stale;
		}
		self.wallet_pending = false;
		match result {
			Ok(wallet) => {
				self.wallet_balance = Some(wallet.current_balance);
				self.wallet_error = None;
			}
			Err(err) => {
				log::warn!("wallet fetch failed: {err}");
				self.wallet_error = Some(err);
			}
		}
		Applied::Accepted
	}
}
