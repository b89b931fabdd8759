use chrono::{Local, NaiveDate};

use crate::Applied;
use crate::error::{MarketError, MarketResult};
use crate::filter::{self, FilterCriteria, FilterField};
use crate::receipt::Receipt;
use crate::record::{FileRecord, Section, parse_amount};
use crate::section::{self, BatchAction, SectionSpec};
use crate::selection::SelectionSet;
use crate::sort::{self, Column, SortSpec};

/// Identity of a collection fetch. A response is applied only while the
/// token is still the outstanding one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken {
	pub section: Section,
	pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionButton {
	pub action: BatchAction,
	pub enabled: bool,
	pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Toolbar {
	Filters {
		criteria: FilterCriteria,
		fields: &'static [FilterField],
	},
	Batch {
		count: usize,
		actions: Vec<ActionButton>,
	},
}

/// A mutation awaiting confirmation. Dropping it cancels without side
/// effects.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingBatch {
	pub action: BatchAction,
	pub section: Section,
	pub records: Vec<FileRecord>,
	/// Hosting price, set for [`BatchAction::Host`] only.
	pub price: Option<f64>,
	pub receipt: Receipt,
}

/// Grid state shared by the table and its toolbar.
#[derive(Debug, Clone)]
pub struct ViewState {
	section: Section,
	records: Vec<FileRecord>,
	generation: u64,
	loading: Option<LoadToken>,
	filters: FilterCriteria,
	sort: SortSpec,
	selection: SelectionSet,
	error: Option<MarketError>,
}

impl ViewState {
	pub fn new(section: Section) -> Self {
		Self {
			section,
			records: Vec::new(),
			generation: 0,
			loading: None,
			filters: FilterCriteria::default(),
			sort: section::spec(section).default_sort,
			selection: SelectionSet::new(),
			error: None,
		}
	}

	pub fn section(&self) -> Section {
		self.section
	}

	pub fn spec(&self) -> &'static SectionSpec {
		section::spec(self.section)
	}

	pub fn records(&self) -> &[FileRecord] {
		&self.records
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_loading(&self) -> bool {
		self.loading.is_some()
	}

	pub fn filters(&self) -> &FilterCriteria {
		&self.filters
	}

	pub fn sort_spec(&self) -> SortSpec {
		self.sort
	}

	pub fn selection(&self) -> &SelectionSet {
		&self.selection
	}

	pub fn error(&self) -> Option<&MarketError> {
		self.error.as_ref()
	}

	pub fn clear_error(&mut self) {
		self.error = None;
	}

	fn next_token(&mut self) -> LoadToken {
		self.generation += 1;
		let token = LoadToken {
			section: self.section,
			generation: self.generation,
		};
		self.loading = Some(token);
		token
	}

	/// Moves to another section. The previous collection, selection and
	/// filters are dropped, and any load still in flight becomes stale.
	pub fn switch_section(&mut self, section: Section) -> LoadToken {
		log::debug!("switching to {section}");
		self.section = section;
		self.records.clear();
		self.selection.clear();
		self.filters.clear();
		self.sort = section::spec(section).default_sort;
		self.error = None;
		self.next_token()
	}

	/// Starts a refetch of the current section, unless one is outstanding.
	pub fn begin_refresh(&mut self) -> Option<LoadToken> {
		if self.loading.is_some() {
			return None;
		}
		Some(self.next_token())
	}

	/// Refetches even when a load is in flight. The older load becomes stale,
	/// since it may predate a change the caller just made on the server.
	pub fn restart_load(&mut self) -> LoadToken {
		self.next_token()
	}

	pub fn finish_load(
		&mut self,
		token: LoadToken,
		result: MarketResult<Vec<FileRecord>>,
	) -> Applied {
		if self.loading != Some(token) {
			log::debug!(
				"dropping stale {} listing (generation {})",
				token.section,
				token.generation
			);
			return Applied::Stale;
		}
		self.loading = None;
		match result {
			Ok(records) => {
				log::info!("loaded {} {} files", records.len(), token.section);
				self.records = records;
				self.selection.clear();
				self.error = None;
			}
			Err(err) => {
				log::warn!("loading {} failed: {err}", token.section);
				self.error = Some(err);
			}
		}
		Applied::Accepted
	}

	/// Adds or replaces a row by hash, as after a completed purchase. A load
	/// still in flight predates the row and is dropped when it lands.
	pub fn append_record(&mut self, record: FileRecord) {
		match self.records.iter_mut().find(|r| r.hash == record.hash) {
			Some(existing) => *existing = record,
			None => self.records.push(record),
		}
		self.generation += 1;
		if let Some(token) = self.loading.take() {
			log::debug!("superseding {} load (generation {})", token.section, token.generation);
		}
		self.selection.clear();
	}

	pub fn rows(&self) -> Vec<&FileRecord> {
		self.rows_on(Local::now().date_naive())
	}

	/// Visible rows: the collection filtered, then sorted.
	pub fn rows_on(&self, today: NaiveDate) -> Vec<&FileRecord> {
		let mut rows = filter::apply(&self.records, &self.filters, today);
		sort::sort(&mut rows, self.sort);
		rows
	}

	pub fn set_filter(&mut self, field: FilterField, tag: &str) -> MarketResult<()> {
		if !self.spec().shows_filter(field) {
			return Err(MarketError::unavailable(format!(
				"{} has no {} filter",
				self.section,
				field.label()
			)));
		}
		self.filters.set(field, tag)?;
		self.selection.settle();
		Ok(())
	}

	pub fn clear_filters(&mut self) {
		self.filters.clear();
		self.selection.settle();
	}

	pub fn click_column(&mut self, column: Column) -> MarketResult<()> {
		self.set_sort(self.sort.clicked(column))
	}

	pub fn set_sort(&mut self, spec: SortSpec) -> MarketResult<()> {
		if !self.spec().columns.contains(&spec.column) {
			return Err(MarketError::unavailable(format!(
				"{} has no {} column",
				self.section,
				spec.column.header()
			)));
		}
		self.sort = spec;
		Ok(())
	}

	/// Returns whether the row is selected afterwards.
	pub fn toggle_row(&mut self, hash: &str) -> MarketResult<bool> {
		if !self.records.iter().any(|r| r.hash == hash) {
			return Err(MarketError::NotFound(format!("No file {hash} in {}", self.section)));
		}
		Ok(self.selection.toggle(hash))
	}

	pub fn toggle_all(&mut self) {
		self.toggle_all_on(Local::now().date_naive());
	}

	pub fn toggle_all_on(&mut self, today: NaiveDate) {
		let visible: Vec<String> = self
			.rows_on(today)
			.into_iter()
			.map(|r| r.hash.clone())
			.collect();
		self.selection.toggle_all(visible.iter().map(String::as_str));
	}

	pub fn clear_selection(&mut self) {
		self.selection.clear();
	}

	/// Selected rows in collection order.
	pub fn selected_records(&self) -> Vec<&FileRecord> {
		self.records
			.iter()
			.filter(|r| self.selection.contains(&r.hash))
			.collect()
	}

	fn check_action(&self, action: BatchAction) -> MarketResult<()> {
		if !self.spec().allows(action) {
			return Err(MarketError::unavailable(format!(
				"{action} is not available in {}",
				self.section
			)));
		}
		match self.selection.len() {
			0 => Err(MarketError::unavailable("No files selected.")),
			1 => Ok(()),
			_ if action.needs_single() => Err(MarketError::unavailable(format!(
				"Select a single file to use {action}."
			))),
			_ => Ok(()),
		}
	}

	pub fn toolbar(&self) -> Toolbar {
		if self.selection.is_empty() {
			return Toolbar::Filters {
				criteria: self.filters,
				fields: self.spec().filters,
			};
		}
		let actions = self
			.spec()
			.actions
			.iter()
			.map(|&action| {
				let reason = self.check_action(action).err().map(|err| err.to_string());
				ActionButton {
					action,
					enabled: reason.is_none(),
					reason,
				}
			})
			.collect();
		Toolbar::Batch {
			count: self.selection.len(),
			actions,
		}
	}

	/// Builds the confirmation for a Host, Share or Delete. Nothing is sent
	/// until the batch is confirmed.
	pub fn prepare_batch(
		&self,
		action: BatchAction,
		price_text: Option<&str>,
	) -> MarketResult<PendingBatch> {
		if !action.is_mutation() {
			return Err(MarketError::unavailable(format!(
				"{action} does not need a confirmation"
			)));
		}
		self.check_action(action)?;
		let price = match action {
			BatchAction::Host => Some(parse_amount(price_text.unwrap_or_default())?),
			_ => None,
		};
		let records: Vec<FileRecord> = self
			.selected_records()
			.into_iter()
			.cloned()
			.map(|mut record| {
				if price.is_some() {
					record.price = price;
				}
				record
			})
			.collect();
		Ok(PendingBatch {
			action,
			section: self.section,
			receipt: Receipt::batch(action, records.clone()),
			records,
			price,
		})
	}

	pub fn info(&self) -> MarketResult<&FileRecord> {
		self.single_target(BatchAction::Info)
	}

	/// Row a download negotiation should be opened for.
	pub fn download_target(&self) -> MarketResult<&FileRecord> {
		self.single_target(BatchAction::Download)
	}

	fn single_target(&self, action: BatchAction) -> MarketResult<&FileRecord> {
		self.check_action(action)?;
		self.selected_records()
			.into_iter()
			.next()
			.ok_or_else(|| MarketError::unavailable("No files selected."))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sort::Direction;

	fn today() -> NaiveDate {
		NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
	}

	fn record(hash: &str, size: u64, days_ago: u64) -> FileRecord {
		FileRecord {
			extension: Some("txt".into()),
			size: Some(size),
			date: today().checked_sub_days(chrono::Days::new(days_ago)),
			..FileRecord::new(hash, format!("{hash}.txt"))
		}
	}

	fn loaded(section: Section, records: Vec<FileRecord>) -> ViewState {
		let mut view = ViewState::new(section);
		let token = view.switch_section(section);
		assert_eq!(view.finish_load(token, Ok(records)), Applied::Accepted);
		view
	}

	fn hashes(rows: &[&FileRecord]) -> Vec<String> {
		rows.iter().map(|r| r.hash.clone()).collect()
	}

	#[test]
	fn rows_are_filtered_then_sorted() {
		let mut view = loaded(
			Section::Storing,
			vec![record("h1", 500, 3), record("h2", 2_000_000_000, 1), record("h3", 10, 0)],
		);
		assert_eq!(hashes(&view.rows_on(today())), vec!["h3", "h2", "h1"]);
		view.set_filter(FilterField::Size, "less1mb").unwrap();
		assert_eq!(hashes(&view.rows_on(today())), vec!["h3", "h1"]);
		view.click_column(Column::Size).unwrap();
		assert_eq!(hashes(&view.rows_on(today())), vec!["h3", "h1"]);
		view.click_column(Column::Size).unwrap();
		assert_eq!(view.sort_spec().direction, Direction::Descending);
		assert_eq!(hashes(&view.rows_on(today())), vec!["h1", "h3"]);
	}

	#[test]
	fn switching_sections_resets_everything() {
		let mut view = loaded(Section::Hosting, vec![record("h1", 1, 0), record("h2", 2, 0)]);
		view.toggle_row("h1").unwrap();
		view.toggle_row("h2").unwrap();
		view.set_filter(FilterField::Price, "less5").unwrap();
		view.click_column(Column::Name).unwrap();

		let token = view.switch_section(Section::Saved);
		assert!(view.selection().is_empty());
		assert!(view.filters().is_unconstrained());
		assert!(view.records().is_empty());
		assert_eq!(view.sort_spec(), SortSpec::ascending(Column::Name));
		assert_eq!(token.section, Section::Saved);
	}

	#[test]
	fn stale_listing_is_dropped() {
		let mut view = ViewState::new(Section::Hosting);
		let first = view.switch_section(Section::Hosting);
		let second = view.switch_section(Section::Explore);
		assert_eq!(
			view.finish_load(first, Ok(vec![record("old", 1, 0)])),
			Applied::Stale
		);
		assert!(view.records().is_empty());
		assert!(view.is_loading());
		assert_eq!(
			view.finish_load(second, Ok(vec![record("new", 1, 0)])),
			Applied::Accepted
		);
		assert_eq!(view.records()[0].hash, "new");
	}

	#[test]
	fn refresh_waits_for_outstanding_load() {
		let mut view = ViewState::new(Section::Hosting);
		let token = view.switch_section(Section::Hosting);
		assert!(view.begin_refresh().is_none());
		view.finish_load(token, Ok(Vec::new()));
		assert!(view.begin_refresh().is_some());
	}

	#[test]
	fn failed_load_keeps_previous_rows() {
		let mut view = loaded(Section::Hosting, vec![record("h1", 1, 0)]);
		let token = view.begin_refresh().unwrap();
		view.finish_load(token, Err(MarketError::Transport("timeout".into())));
		assert_eq!(view.records().len(), 1);
		assert!(view.error().is_some());
		assert!(!view.is_loading());
	}

	#[test]
	fn selection_is_invalidated_by_new_collection() {
		let mut view = loaded(Section::Storing, vec![record("h1", 1, 0), record("h2", 1, 0)]);
		view.toggle_row("h1").unwrap();
		let token = view.begin_refresh().unwrap();
		view.finish_load(token, Ok(vec![record("h2", 1, 0)]));
		assert!(view.selection().is_empty());
		assert!(view.toggle_row("h1").is_err());
	}

	#[test]
	fn toolbar_shows_filters_without_selection() {
		let view = loaded(Section::Saved, vec![record("h1", 1, 0)]);
		match view.toolbar() {
			Toolbar::Filters { fields, .. } => {
				assert_eq!(fields, &[FilterField::Type, FilterField::Size])
			}
			other => panic!("unexpected toolbar {other:?}"),
		}
	}

	#[test]
	fn two_selected_hosting_rows_offer_share_and_delete() {
		let mut view = loaded(Section::Hosting, vec![record("h1", 1, 0), record("h2", 1, 0)]);
		view.toggle_row("h1").unwrap();
		view.toggle_row("h2").unwrap();
		let Toolbar::Batch { count, actions } = view.toolbar() else {
			panic!("expected batch toolbar");
		};
		assert_eq!(count, 2);
		let enabled: Vec<BatchAction> = actions
			.iter()
			.filter(|a| a.enabled)
			.map(|a| a.action)
			.collect();
		assert_eq!(enabled, vec![BatchAction::Share, BatchAction::Delete]);
		assert!(actions.iter().all(|a| a.action != BatchAction::Download));
		let info = actions.iter().find(|a| a.action == BatchAction::Info).unwrap();
		assert!(!info.enabled);
		assert!(info.reason.is_some());
	}

	#[test]
	fn explore_download_needs_exactly_one_row() {
		let mut view = loaded(Section::Explore, vec![record("h1", 1, 0), record("h2", 1, 0)]);
		view.toggle_row("h1").unwrap();
		assert_eq!(view.download_target().unwrap().hash, "h1");
		view.toggle_row("h2").unwrap();
		assert!(view.download_target().is_err());
	}

	#[test]
	fn toggle_all_round_trip_through_view() {
		let mut view = loaded(Section::Storing, vec![record("a", 1, 0), record("b", 1, 0)]);
		view.toggle_row("a").unwrap();
		view.toggle_all_on(today());
		assert_eq!(view.selection().len(), 2);
		view.toggle_all_on(today());
		assert_eq!(view.selection().iter().collect::<Vec<_>>(), vec!["a"]);
	}

	#[test]
	fn host_batch_requires_a_price() {
		let mut view = loaded(Section::Storing, vec![record("h1", 1, 0)]);
		view.toggle_row("h1").unwrap();
		assert!(matches!(
			view.prepare_batch(BatchAction::Host, Some("")),
			Err(MarketError::Validation(_))
		));
		let batch = view.prepare_batch(BatchAction::Host, Some("12.5")).unwrap();
		assert_eq!(batch.price, Some(12.5));
		assert_eq!(batch.records[0].price, Some(12.5));
		assert_eq!(batch.receipt.files.len(), 1);
	}

	#[test]
	fn batch_is_rejected_where_not_offered() {
		let mut view = loaded(Section::Purchased, vec![record("h1", 1, 0)]);
		view.toggle_row("h1").unwrap();
		assert!(view.prepare_batch(BatchAction::Delete, None).is_err());
		assert_eq!(view.info().unwrap().hash, "h1");
	}

	#[test]
	fn filters_outside_the_section_are_refused() {
		let mut view = ViewState::new(Section::Saved);
		assert!(view.set_filter(FilterField::Price, "less5").is_err());
		assert!(view.set_sort(SortSpec::ascending(Column::Price)).is_err());
	}

	#[test]
	fn appended_purchase_replaces_same_hash() {
		let mut view = loaded(Section::Purchased, vec![record("h1", 1, 0)]);
		view.toggle_row("h1").unwrap();
		let before = view.generation();
		view.append_record(record("h1", 99, 0));
		view.append_record(record("h2", 5, 0));
		assert_eq!(view.records().len(), 2);
		assert_eq!(view.records()[0].size, Some(99));
		assert!(view.selection().is_empty());
		assert!(view.generation() > before);
	}

	#[test]
	fn appended_purchase_outlives_an_older_refresh() {
		let mut view = loaded(Section::Purchased, Vec::new());
		let refresh = view.begin_refresh().unwrap();
		view.append_record(record("h1", 5, 0));
		assert!(!view.is_loading());
		assert_eq!(view.finish_load(refresh, Ok(Vec::new())), Applied::Stale);
		assert_eq!(hashes(&view.rows_on(today())), vec!["h1"]);
		assert!(view.begin_refresh().is_some());
	}
}
