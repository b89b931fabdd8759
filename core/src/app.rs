//! Event loop tying the grid and the negotiation session to the market API.
//!
//! [`App::update`] mutates state synchronously and returns a [`Command`]: the
//! futures that must run next. Each future resolves to the [`Message`] that
//! reports its outcome, which is fed back into `update`.

use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

use crate::Applied;
use crate::api::MarketApi;
use crate::error::{MarketError, MarketResult};
use crate::filter::FilterField;
use crate::negotiation::{NegotiationSession, NegotiationState, Request, SavedFile, Ticket};
use crate::record::{FileRecord, Section, Wallet};
use crate::section::BatchAction;
use crate::sort::{Column, SortSpec};
use crate::storage::{DownloadStore, payload_name};
use crate::view::{LoadToken, PendingBatch, ViewState};

#[derive(Debug)]
pub enum Message {
	SectionSelected(Section),
	SectionLoaded {
		token: LoadToken,
		result: MarketResult<Vec<FileRecord>>,
	},
	Refresh,
	FilterChanged {
		field: FilterField,
		tag: String,
	},
	FiltersCleared,
	SortClicked(Column),
	SortSet(SortSpec),
	RowToggled(String),
	ToggleAll,
	/// Toolbar button. `price` is the hosting price text for Host.
	BatchRequested {
		action: BatchAction,
		price: Option<String>,
	},
	BatchConfirmed,
	BatchCancelled,
	BatchFinished {
		action: BatchAction,
		section: Section,
		results: Vec<(String, MarketResult<Option<String>>)>,
	},
	InfoClosed,
	NegotiationOpened(Option<String>),
	HashSubmitted(String),
	PeersRefreshRequested,
	WalletRefreshRequested,
	PeersLoaded {
		ticket: Ticket,
		result: MarketResult<Vec<String>>,
	},
	PeerSelected(String),
	MetadataLoaded {
		ticket: Ticket,
		result: MarketResult<FileRecord>,
	},
	PurchaseConfirmed,
	PurchaseDeclined,
	TransferFinished {
		ticket: Ticket,
		result: MarketResult<SavedFile>,
	},
	WalletLoaded {
		epoch: u64,
		result: MarketResult<Wallet>,
	},
	NegotiationClosed,
}

/// Work to run after an update.
#[must_use]
pub struct Command {
	futures: Vec<BoxFuture<'static, Message>>,
}

impl Command {
	pub fn none() -> Self {
		Self {
			futures: Vec::new(),
		}
	}

	pub fn perform<F, T>(future: F, map: impl FnOnce(T) -> Message + Send + 'static) -> Self
	where
		F: Future<Output = T> + Send + 'static,
	{
		Self {
			futures: vec![future.map(map).boxed()],
		}
	}

	pub fn batch(commands: impl IntoIterator<Item = Command>) -> Self {
		Self {
			futures: commands.into_iter().flat_map(|c| c.futures).collect(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.futures.is_empty()
	}

	pub fn len(&self) -> usize {
		self.futures.len()
	}

	pub fn into_futures(self) -> Vec<BoxFuture<'static, Message>> {
		self.futures
	}
}

pub struct App {
	api: Arc<dyn MarketApi>,
	store: DownloadStore,
	view: ViewState,
	session: NegotiationSession,
	pending: Option<PendingBatch>,
	batch_running: bool,
	info: Option<FileRecord>,
	status: String,
	notices: Vec<String>,
}

impl App {
	/// Creates the app showing `section` and the command loading it.
	pub fn new(api: Arc<dyn MarketApi>, store: DownloadStore, section: Section) -> (Self, Command) {
		let mut app = Self {
			api,
			store,
			view: ViewState::new(section),
			session: NegotiationSession::new(),
			pending: None,
			batch_running: false,
			info: None,
			status: String::from("Ready"),
			notices: Vec::new(),
		};
		let token = app.view.switch_section(section);
		let command = app.load(token);
		(app, command)
	}

	pub fn view(&self) -> &ViewState {
		&self.view
	}

	pub fn session(&self) -> &NegotiationSession {
		&self.session
	}

	pub fn pending_batch(&self) -> Option<&PendingBatch> {
		self.pending.as_ref()
	}

	pub fn is_batch_running(&self) -> bool {
		self.batch_running
	}

	pub fn info(&self) -> Option<&FileRecord> {
		self.info.as_ref()
	}

	pub fn status(&self) -> &str {
		&self.status
	}

	/// Server replies collected since the last call, such as share links.
	pub fn take_notices(&mut self) -> Vec<String> {
		std::mem::take(&mut self.notices)
	}

	fn report(&mut self, err: MarketError) -> Command {
		log::debug!("rejected: {err}");
		self.status = err.to_string();
		Command::none()
	}

	pub fn update(&mut self, message: Message) -> Command {
		match message {
			Message::SectionSelected(section) => {
				self.pending = None;
				self.info = None;
				let token = self.view.switch_section(section);
				self.status = format!("Loading {section}...");
				self.load(token)
			}
			Message::SectionLoaded { token, result } => {
				if self.view.finish_load(token, result) == Applied::Accepted {
					self.status = match self.view.error() {
						Some(err) => format!("Failed to load {}: {err}", token.section),
						None => format!("{} files in {}", self.view.records().len(), token.section),
					};
				}
				Command::none()
			}
			Message::Refresh => match self.view.begin_refresh() {
				Some(token) => self.load(token),
				None => self.report(MarketError::Busy("a refresh")),
			},
			Message::FilterChanged { field, tag } => match self.view.set_filter(field, &tag) {
				Ok(()) => Command::none(),
				Err(err) => self.report(err),
			},
			Message::FiltersCleared => {
				self.view.clear_filters();
				Command::none()
			}
			Message::SortClicked(column) => match self.view.click_column(column) {
				Ok(()) => Command::none(),
				Err(err) => self.report(err),
			},
			Message::SortSet(spec) => match self.view.set_sort(spec) {
				Ok(()) => Command::none(),
				Err(err) => self.report(err),
			},
			Message::RowToggled(hash) => match self.view.toggle_row(&hash) {
				Ok(_) => Command::none(),
				Err(err) => self.report(err),
			},
			Message::ToggleAll => {
				self.view.toggle_all();
				Command::none()
			}
			Message::BatchRequested { action, price } => self.request_batch(action, price),
			Message::BatchConfirmed => self.confirm_batch(),
			Message::BatchCancelled => {
				if self.pending.take().is_some() {
					self.status = String::from("Cancelled");
				}
				Command::none()
			}
			Message::BatchFinished {
				action,
				section,
				results,
			} => self.finish_batch(action, section, results),
			Message::InfoClosed => {
				self.info = None;
				Command::none()
			}
			Message::NegotiationOpened(hash) => {
				let requests = self.session.open(hash.as_deref());
				self.execute_all(requests)
			}
			Message::HashSubmitted(hash) => match self.session.submit(&hash) {
				Ok(request) => self.execute(request),
				Err(err) => self.report(err),
			},
			Message::PeersRefreshRequested => match self.session.refresh_peers() {
				Ok(request) => self.execute(request),
				Err(err) => self.report(err),
			},
			Message::PeersLoaded { ticket, result } => {
				self.session.peers_loaded(&ticket, result);
				Command::none()
			}
			Message::PeerSelected(peer) => match self.session.select_peer(&peer) {
				Ok(request) => self.execute(request),
				Err(err) => self.report(err),
			},
			Message::MetadataLoaded { ticket, result } => {
				self.session.metadata_loaded(&ticket, result);
				Command::none()
			}
			Message::PurchaseConfirmed => match self.session.confirm() {
				Ok(request) => self.execute(request),
				Err(err) => {
					let command = self.report(err);
					if self.session.wallet_balance().is_some() {
						return command;
					}
					match self.session.refresh_wallet() {
						Ok(request) => self.execute(request),
						Err(_) => command,
					}
				}
			},
			Message::WalletRefreshRequested => match self.session.refresh_wallet() {
				Ok(request) => self.execute(request),
				Err(err) => self.report(err),
			},
			Message::PurchaseDeclined => match self.session.decline() {
				Ok(()) => Command::none(),
				Err(err) => self.report(err),
			},
			Message::TransferFinished { ticket, result } => {
				let saved = result.as_ref().ok().map(|saved| saved.record.clone());
				let applied = self.session.transfer_finished(&ticket, result);
				if applied == Applied::Accepted {
					if let Some(record) = saved {
						if self.view.section() == Section::Purchased {
							self.view.append_record(record);
						}
					}
					if let Some(saved) = self.session.saved() {
						self.status = format!("Saved to {}", saved.path.display());
					}
				}
				Command::none()
			}
			Message::WalletLoaded { epoch, result } => {
				self.session.wallet_loaded(epoch, result);
				Command::none()
			}
			Message::NegotiationClosed => {
				self.session.close();
				Command::none()
			}
		}
	}

	fn load(&self, token: LoadToken) -> Command {
		let api = self.api.clone();
		Command::perform(
			async move { api.list(token.section).await },
			move |result| Message::SectionLoaded { token, result },
		)
	}

	fn request_batch(&mut self, action: BatchAction, price: Option<String>) -> Command {
		self.info = None;
		match action {
			BatchAction::Info => match self.view.info() {
				Ok(record) => {
					self.info = Some(record.clone());
					Command::none()
				}
				Err(err) => self.report(err),
			},
			BatchAction::Download => match self.view.download_target() {
				Ok(record) => {
					let hash = record.hash.clone();
					self.update(Message::NegotiationOpened(Some(hash)))
				}
				Err(err) => self.report(err),
			},
			_ => match self.view.prepare_batch(action, price.as_deref()) {
				Ok(batch) => {
					self.status = format!("Confirm {} of {} files", action, batch.records.len());
					self.pending = Some(batch);
					Command::none()
				}
				Err(err) => self.report(err),
			},
		}
	}

	fn confirm_batch(&mut self) -> Command {
		if self.batch_running {
			return self.report(MarketError::Busy("a batch"));
		}
		let Some(batch) = self.pending.take() else {
			return self.report(MarketError::unavailable("Nothing to confirm."));
		};
		self.batch_running = true;
		self.status = format!("{} of {} files in progress", batch.action, batch.records.len());
		let api = self.api.clone();
		let PendingBatch {
			action,
			section,
			records,
			..
		} = batch;
		Command::perform(
			async move {
				let mut results = Vec::with_capacity(records.len());
				for record in &records {
					let result = match action {
						BatchAction::Delete => api.delete(section, &record.hash).await,
						BatchAction::Host => api.add(Section::Hosting, record).await,
						BatchAction::Share => api.add(Section::Sharing, record).await,
						_ => Err(MarketError::unavailable(format!("{action} is not a batch"))),
					};
					results.push((record.hash.clone(), result));
				}
				results
			},
			move |results| Message::BatchFinished {
				action,
				section,
				results,
			},
		)
	}

	fn finish_batch(
		&mut self,
		action: BatchAction,
		section: Section,
		results: Vec<(String, MarketResult<Option<String>>)>,
	) -> Command {
		self.batch_running = false;
		let mut failed = 0;
		for (hash, result) in results.iter() {
			match result {
				Ok(Some(notice)) => self.notices.push(notice.clone()),
				Ok(None) => {}
				Err(err) => {
					log::warn!("{action} of {hash} failed: {err}");
					self.notices.push(format!("{hash}: {err}"));
					failed += 1;
				}
			}
		}
		self.status = if failed == 0 {
			format!("{action} finished for {} files", results.len())
		} else {
			format!("{action} failed for {failed} of {} files", results.len())
		};
		if self.view.section() != section {
			return Command::none();
		}
		self.view.clear_selection();
		let token = self.view.restart_load();
		self.load(token)
	}

	fn execute_all(&self, requests: Vec<Request>) -> Command {
		Command::batch(requests.into_iter().map(|request| self.execute(request)))
	}

	fn execute(&self, request: Request) -> Command {
		let api = self.api.clone();
		match request {
			Request::Wallet { epoch } => Command::perform(
				async move { api.wallet().await },
				move |result| Message::WalletLoaded { epoch, result },
			),
			Request::FindProviders { ticket } => {
				let hash = ticket.hash.clone();
				Command::perform(
					async move { api.find_providers(&hash).await },
					move |result| Message::PeersLoaded { ticket, result },
				)
			}
			Request::Metadata { ticket } => {
				let hash = ticket.hash.clone();
				let peer = ticket.peer.clone().unwrap_or_default();
				Command::perform(
					async move { api.request_metadata(&peer, &hash).await },
					move |result| Message::MetadataLoaded { ticket, result },
				)
			}
			Request::Download {
				ticket,
				price,
				record,
			} => {
				let store = self.store.clone();
				let hash = ticket.hash.clone();
				let peer = ticket.peer.clone().unwrap_or_default();
				Command::perform(
					transfer(api, store, peer, hash, price, record),
					move |result| Message::TransferFinished { ticket, result },
				)
			}
		}
	}

	/// Whether the negotiation popup should be showing.
	pub fn negotiation_state(&self) -> Option<NegotiationState> {
		self.session.is_open().then(|| self.session.state())
	}
}

/// Downloads and persists a purchased file. The payload is written even if
/// the session has moved on by the time it arrives.
async fn transfer(
	api: Arc<dyn MarketApi>,
	store: DownloadStore,
	peer: String,
	hash: String,
	price: f64,
	mut record: FileRecord,
) -> MarketResult<SavedFile> {
	let download = api.download(&peer, &hash, price).await?;
	let name = payload_name(
		download.file_name.as_deref(),
		&record.name,
		record.extension.as_deref(),
	);
	let path = store.save(&name, &download.data).await?;
	record.price = Some(price);
	record.date = Some(Local::now().date_naive());
	if record.size.is_none() {
		record.size = Some(download.data.len() as u64);
	}
	Ok(SavedFile { path, record })
}

/// Runs `command` and every command that follows from it until nothing is
/// outstanding.
pub async fn drive(app: &mut App, command: Command) {
	let mut pending: FuturesUnordered<BoxFuture<'static, Message>> =
		command.into_futures().into_iter().collect();
	while let Some(message) = pending.next().await {
		let next = app.update(message);
		pending.extend(next.into_futures());
	}
}

/// Applies `message` and drives the resulting work to completion.
pub async fn dispatch(app: &mut App, message: Message) {
	let command = app.update(message);
	drive(app, command).await;
}
