use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, bail};
use orcanet_core::app::{App, Message, dispatch, drive};
use orcanet_core::filter::FilterField;
use orcanet_core::negotiation::NegotiationState;
use orcanet_core::section::BatchAction;
use orcanet_core::sort::{Column, SortSpec};
use orcanet_core::storage::DownloadStore;
use orcanet_core::{Config, HttpMarketApi, MarketApi, Section};

use crate::render;

pub struct Client {
	api: Arc<dyn MarketApi>,
	store: DownloadStore,
}

impl Client {
	pub fn new(config: &Config) -> anyhow::Result<Self> {
		let api = HttpMarketApi::new(&config.api_url, config.timeout())
			.with_context(|| format!("cannot use api url {}", config.api_url))?;
		Ok(Self {
			api: Arc::new(api),
			store: DownloadStore::new(&config.download_dir),
		})
	}

	/// An app with `section` loaded.
	async fn open(&self, section: Section) -> anyhow::Result<App> {
		let (mut app, command) = App::new(self.api.clone(), self.store.clone(), section);
		drive(&mut app, command).await;
		if let Some(err) = app.view().error() {
			bail!("failed to load {section}: {err}");
		}
		Ok(app)
	}

	pub async fn list(
		&self,
		section: &str,
		filters: Vec<(FilterField, Option<String>)>,
		sort: Option<&str>,
		desc: bool,
	) -> anyhow::Result<()> {
		let section: Section = section.parse()?;
		let mut app = self.open(section).await?;
		for (field, tag) in filters {
			let Some(tag) = tag else { continue };
			dispatch(
				&mut app,
				Message::FilterChanged {
					field,
					tag: tag.clone(),
				},
			)
			.await;
			if app.view().filters().tag(field) != tag.trim() {
				bail!("{}", app.status());
			}
		}
		if sort.is_some() || desc {
			let column = match sort {
				Some(column) => column.parse::<Column>()?,
				None => app.view().sort_spec().column,
			};
			let spec = if desc {
				SortSpec::descending(column)
			} else {
				SortSpec::ascending(column)
			};
			dispatch(&mut app, Message::SortSet(spec)).await;
			if app.view().sort_spec() != spec {
				bail!("{}", app.status());
			}
		}
		println!("{}", render::table(app.view()));
		Ok(())
	}

	pub async fn wallet(&self) -> anyhow::Result<()> {
		let wallet = self.api.wallet().await?;
		if let Some(address) = &wallet.address {
			println!("Address: {address}");
		}
		println!("Balance: {}", orcanet_core::receipt::format_amount(wallet.current_balance));
		println!("Pending: {}", orcanet_core::receipt::format_amount(wallet.pending_balance));
		Ok(())
	}

	pub async fn download(&self, hash: &str, peer: Option<&str>, yes: bool) -> anyhow::Result<()> {
		let mut app = self.open(Section::Purchased).await?;
		dispatch(&mut app, Message::NegotiationOpened(Some(hash.to_string()))).await;
		let session = app.session();
		if session.state() != NegotiationState::PeerList {
			bail!("{}", session_error(&app));
		}
		println!("{}", render::peers(session));

		let peer = match peer {
			Some(peer) => peer.to_string(),
			None if session.peers().len() == 1 => session.peers()[0].peer_id.clone(),
			None => {
				let answer = prompt(&format!("Choose a provider [1-{}]: ", session.peers().len()))?;
				let index: usize = answer.trim().parse().context("not a number")?;
				match index.checked_sub(1).and_then(|i| session.peers().get(i)) {
					Some(peer) => peer.peer_id.clone(),
					None => bail!("no provider {index}"),
				}
			}
		};
		dispatch(&mut app, Message::PeerSelected(peer)).await;
		if app.session().state() != NegotiationState::Confirming {
			bail!("{}", session_error(&app));
		}
		if app.session().wallet_balance().is_none() {
			dispatch(&mut app, Message::WalletRefreshRequested).await;
		}
		let receipt = app.session().receipt()?;
		println!("{receipt}");
		if !yes && !confirm("Buy this file?")? {
			dispatch(&mut app, Message::PurchaseDeclined).await;
			println!("Declined");
			return Ok(());
		}
		dispatch(&mut app, Message::PurchaseConfirmed).await;
		match app.session().saved() {
			Some(saved) => println!("Saved to {}", saved.path.display()),
			None => bail!("{}", session_error(&app)),
		}
		Ok(())
	}

	pub async fn delete(&self, section: &str, hashes: &[String], yes: bool) -> anyhow::Result<()> {
		let section: Section = section.parse()?;
		self.batch(section, hashes, BatchAction::Delete, None, yes).await
	}

	pub async fn host(&self, from: &str, hash: &str, price: &str, yes: bool) -> anyhow::Result<()> {
		let section: Section = from.parse()?;
		self.batch(
			section,
			&[hash.to_string()],
			BatchAction::Host,
			Some(price.to_string()),
			yes,
		)
		.await
	}

	pub async fn share(&self, from: &str, hash: &str, yes: bool) -> anyhow::Result<()> {
		let section: Section = from.parse()?;
		self.batch(section, &[hash.to_string()], BatchAction::Share, None, yes)
			.await
	}

	async fn batch(
		&self,
		section: Section,
		hashes: &[String],
		action: BatchAction,
		price: Option<String>,
		yes: bool,
	) -> anyhow::Result<()> {
		let mut app = self.open(section).await?;
		for hash in hashes {
			if app.view().selection().contains(hash) {
				continue;
			}
			dispatch(&mut app, Message::RowToggled(hash.clone())).await;
			if !app.view().selection().contains(hash) {
				bail!("{}", app.status());
			}
		}
		dispatch(&mut app, Message::BatchRequested { action, price }).await;
		let Some(batch) = app.pending_batch() else {
			bail!("{}", app.status());
		};
		println!("{}", batch.receipt);
		if !yes && !confirm("Proceed?")? {
			dispatch(&mut app, Message::BatchCancelled).await;
			println!("Cancelled");
			return Ok(());
		}
		dispatch(&mut app, Message::BatchConfirmed).await;
		for notice in app.take_notices() {
			println!("{notice}");
		}
		println!("{}", app.status());
		Ok(())
	}
}

fn session_error(app: &App) -> String {
	match app.session().error() {
		Some(err) => err.to_string(),
		None => app.status().to_string(),
	}
}

fn prompt(question: &str) -> anyhow::Result<String> {
	print!("{question}");
	std::io::stdout().flush()?;
	let mut answer = String::new();
	std::io::stdin().lock().read_line(&mut answer)?;
	Ok(answer)
}

fn confirm(question: &str) -> anyhow::Result<bool> {
	let answer = prompt(&format!("{question} [y/N] "))?;
	Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
