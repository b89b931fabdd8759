//! Record filtering for the file grids.
//!
//! Every criterion is independent and the active ones are AND-combined. A
//! record that lacks the attribute a criterion looks at is kept by that
//! criterion: rows without a price are never hidden by the price filter.

use chrono::{Datelike, Days, Local, Months, NaiveDate};

use crate::error::{MarketError, MarketResult};
use crate::record::{FileKind, FileRecord};

/// A named, non-numeric range used by one filter control.
pub trait Bucket: Copy + PartialEq + Sized + 'static {
	const ALL: &'static [Self];

	/// Wire value of the option, as bound to the toolbar select.
	fn tag(self) -> &'static str;

	fn label(self) -> &'static str;

	fn parse(tag: &str) -> MarketResult<Self> {
		let tag = tag.trim();
		Self::ALL
			.iter()
			.copied()
			.find(|bucket| bucket.tag().eq_ignore_ascii_case(tag))
			.ok_or_else(|| MarketError::validation(format!("unknown filter value: {tag}")))
	}
}

impl Bucket for FileKind {
	const ALL: &'static [Self] = &[FileKind::Document, FileKind::Media, FileKind::Other];

	fn tag(self) -> &'static str {
		match self {
			FileKind::Document => "document",
			FileKind::Media => "media",
			FileKind::Other => "other",
		}
	}

	fn label(self) -> &'static str {
		FileKind::label(self)
	}
}

/// `<1MB` and `<1GB` are cumulative thresholds; `>1GB` starts at exactly one
/// gigabyte so every size falls into `<1GB` or `>1GB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBucket {
	Under1Mb,
	Under1Gb,
	Over1Gb,
}

const MB: u64 = 1_000_000;
const GB: u64 = 1_000_000_000;

impl SizeBucket {
	pub fn contains(self, size: u64) -> bool {
		match self {
			SizeBucket::Under1Mb => size < MB,
			SizeBucket::Under1Gb => size < GB,
			SizeBucket::Over1Gb => size >= GB,
		}
	}
}

impl Bucket for SizeBucket {
	const ALL: &'static [Self] = &[SizeBucket::Under1Mb, SizeBucket::Under1Gb, SizeBucket::Over1Gb];

	fn tag(self) -> &'static str {
		match self {
			SizeBucket::Under1Mb => "less1mb",
			SizeBucket::Under1Gb => "less1gb",
			SizeBucket::Over1Gb => "more1gb",
		}
	}

	fn label(self) -> &'static str {
		match self {
			SizeBucket::Under1Mb => "< 1 MB",
			SizeBucket::Under1Gb => "< 1 GB",
			SizeBucket::Over1Gb => "> 1 GB",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBucket {
	Today,
	Last7Days,
	Last30Days,
	Last6Months,
	ThisYear,
	LastYear,
}

impl DateBucket {
	/// Inclusive `(lower, upper)` bounds relative to `today`.
	pub fn bounds(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
		let jan_first = |year: i32| NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MIN);
		match self {
			DateBucket::Today => (today, today),
			DateBucket::Last7Days => (days_before(today, 7), today),
			DateBucket::Last30Days => (days_before(today, 30), today),
			DateBucket::Last6Months => (
				today
					.checked_sub_months(Months::new(6))
					.unwrap_or(NaiveDate::MIN),
				today,
			),
			DateBucket::ThisYear => (jan_first(today.year()), today),
			DateBucket::LastYear => {
				let year = today.year() - 1;
				let dec_last = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(NaiveDate::MIN);
				(jan_first(year), dec_last)
			}
		}
	}

	pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
		let (lower, upper) = self.bounds(today);
		date >= lower && date <= upper
	}
}

fn days_before(date: NaiveDate, days: u64) -> NaiveDate {
	date.checked_sub_days(Days::new(days))
		.unwrap_or(NaiveDate::MIN)
}

impl Bucket for DateBucket {
	const ALL: &'static [Self] = &[
		DateBucket::Today,
		DateBucket::Last7Days,
		DateBucket::Last30Days,
		DateBucket::Last6Months,
		DateBucket::ThisYear,
		DateBucket::LastYear,
	];

	fn tag(self) -> &'static str {
		match self {
			DateBucket::Today => "today",
			DateBucket::Last7Days => "7days",
			DateBucket::Last30Days => "30days",
			DateBucket::Last6Months => "6months",
			DateBucket::ThisYear => "thisyear",
			DateBucket::LastYear => "lastyear",
		}
	}

	fn label(self) -> &'static str {
		match self {
			DateBucket::Today => "Today",
			DateBucket::Last7Days => "Last 7 days",
			DateBucket::Last30Days => "Last 30 days",
			DateBucket::Last6Months => "Last 6 months",
			DateBucket::ThisYear => "This year",
			DateBucket::LastYear => "Last year",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBucket {
	Under5,
	From5To20,
	Over20,
}

impl PriceBucket {
	pub fn contains(self, price: f64) -> bool {
		match self {
			PriceBucket::Under5 => price < 5.0,
			PriceBucket::From5To20 => (5.0..=20.0).contains(&price),
			PriceBucket::Over20 => price > 20.0,
		}
	}
}

impl Bucket for PriceBucket {
	const ALL: &'static [Self] = &[PriceBucket::Under5, PriceBucket::From5To20, PriceBucket::Over20];

	fn tag(self) -> &'static str {
		match self {
			PriceBucket::Under5 => "less5",
			PriceBucket::From5To20 => "5to20",
			PriceBucket::Over20 => "more20",
		}
	}

	fn label(self) -> &'static str {
		match self {
			PriceBucket::Under5 => "< 5",
			PriceBucket::From5To20 => "5 - 20",
			PriceBucket::Over20 => "> 20",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadsBucket {
	Under100,
	From100To1000,
	Over1000,
}

impl DownloadsBucket {
	pub fn contains(self, downloads: u64) -> bool {
		match self {
			DownloadsBucket::Under100 => downloads < 100,
			DownloadsBucket::From100To1000 => (100..=1000).contains(&downloads),
			DownloadsBucket::Over1000 => downloads > 1000,
		}
	}
}

impl Bucket for DownloadsBucket {
	const ALL: &'static [Self] = &[
		DownloadsBucket::Under100,
		DownloadsBucket::From100To1000,
		DownloadsBucket::Over1000,
	];

	fn tag(self) -> &'static str {
		match self {
			DownloadsBucket::Under100 => "less100",
			DownloadsBucket::From100To1000 => "100to1000",
			DownloadsBucket::Over1000 => "more1000",
		}
	}

	fn label(self) -> &'static str {
		match self {
			DownloadsBucket::Under100 => "< 100",
			DownloadsBucket::From100To1000 => "100 - 1000",
			DownloadsBucket::Over1000 => "> 1000",
		}
	}
}

/// One filter control of the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
	Type,
	Size,
	Date,
	Price,
	Downloads,
}

impl FilterField {
	pub fn label(self) -> &'static str {
		match self {
			FilterField::Type => "Type",
			FilterField::Size => "Size",
			FilterField::Date => "Date",
			FilterField::Price => "Price",
			FilterField::Downloads => "Downloads",
		}
	}

	/// `(tag, label)` pairs in display order.
	pub fn options(self) -> Vec<(&'static str, &'static str)> {
		fn pairs<B: Bucket>() -> Vec<(&'static str, &'static str)> {
			B::ALL.iter().map(|b| (b.tag(), b.label())).collect()
		}
		match self {
			FilterField::Type => pairs::<FileKind>(),
			FilterField::Size => pairs::<SizeBucket>(),
			FilterField::Date => pairs::<DateBucket>(),
			FilterField::Price => pairs::<PriceBucket>(),
			FilterField::Downloads => pairs::<DownloadsBucket>(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterCriteria {
	pub kind: Option<FileKind>,
	pub size: Option<SizeBucket>,
	pub date: Option<DateBucket>,
	pub price: Option<PriceBucket>,
	pub downloads: Option<DownloadsBucket>,
}

impl FilterCriteria {
	pub fn is_unconstrained(&self) -> bool {
		*self == Self::default()
	}

	pub fn clear(&mut self) {
		*self = Self::default();
	}

	/// Binds a toolbar select. An empty tag removes the constraint.
	pub fn set(&mut self, field: FilterField, tag: &str) -> MarketResult<()> {
		let tag = tag.trim();
		let empty = tag.is_empty();
		match field {
			FilterField::Type => self.kind = parse_optional(tag, empty)?,
			FilterField::Size => self.size = parse_optional(tag, empty)?,
			FilterField::Date => self.date = parse_optional(tag, empty)?,
			FilterField::Price => self.price = parse_optional(tag, empty)?,
			FilterField::Downloads => self.downloads = parse_optional(tag, empty)?,
		}
		Ok(())
	}

	/// Current tag of a field, `""` when unconstrained.
	pub fn tag(&self, field: FilterField) -> &'static str {
		match field {
			FilterField::Type => self.kind.map(Bucket::tag),
			FilterField::Size => self.size.map(Bucket::tag),
			FilterField::Date => self.date.map(Bucket::tag),
			FilterField::Price => self.price.map(Bucket::tag),
			FilterField::Downloads => self.downloads.map(Bucket::tag),
		}
		.unwrap_or("")
	}

	/// Drops constraints on fields the current grid does not offer.
	pub fn retain_fields(&mut self, fields: &[FilterField]) {
		if !fields.contains(&FilterField::Type) {
			self.kind = None;
		}
		if !fields.contains(&FilterField::Size) {
			self.size = None;
		}
		if !fields.contains(&FilterField::Date) {
			self.date = None;
		}
		if !fields.contains(&FilterField::Price) {
			self.price = None;
		}
		if !fields.contains(&FilterField::Downloads) {
			self.downloads = None;
		}
	}

	pub fn matches(&self, record: &FileRecord, today: NaiveDate) -> bool {
		passes(self.kind, record.kind(), |kind, value| kind == value)
			&& passes(self.size, record.size, SizeBucket::contains)
			&& passes(self.date, record.date, |bucket, date| bucket.contains(date, today))
			&& passes(self.price, record.price, PriceBucket::contains)
			&& passes(self.downloads, record.downloads, DownloadsBucket::contains)
	}
}

fn parse_optional<B: Bucket>(tag: &str, empty: bool) -> MarketResult<Option<B>> {
	if empty {
		Ok(None)
	} else {
		B::parse(tag).map(Some)
	}
}

fn passes<B, T>(bucket: Option<B>, value: Option<T>, test: impl Fn(B, T) -> bool) -> bool {
	match (bucket, value) {
		(Some(bucket), Some(value)) => test(bucket, value),
		_ => true,
	}
}

/// Records satisfying `criteria`, in their original order.
pub fn apply<'a>(
	records: &'a [FileRecord],
	criteria: &FilterCriteria,
	today: NaiveDate,
) -> Vec<&'a FileRecord> {
	records
		.iter()
		.filter(|record| criteria.matches(record, today))
		.collect()
}

/// [`apply`] against the local calendar date.
pub fn apply_now<'a>(records: &'a [FileRecord], criteria: &FilterCriteria) -> Vec<&'a FileRecord> {
	apply(records, criteria, Local::now().date_naive())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn day(y: i32, m: u32, d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(y, m, d).unwrap()
	}

	fn sized(hash: &str, size: u64) -> FileRecord {
		FileRecord {
			size: Some(size),
			..FileRecord::new(hash, hash)
		}
	}

	fn sample() -> Vec<FileRecord> {
		let today = day(2024, 6, 15);
		vec![
			FileRecord {
				extension: Some("pdf".into()),
				size: Some(500_000),
				date: Some(today),
				price: Some(4.0),
				downloads: Some(10),
				..FileRecord::new("a", "report.pdf")
			},
			FileRecord {
				extension: Some("mp4".into()),
				size: Some(2_000_000_000),
				date: Some(day(2024, 6, 1)),
				price: Some(20.0),
				downloads: Some(1000),
				..FileRecord::new("b", "film.mp4")
			},
			FileRecord {
				extension: Some("zip".into()),
				size: Some(40_000_000),
				date: Some(day(2023, 2, 2)),
				price: Some(25.0),
				downloads: Some(5000),
				..FileRecord::new("c", "bundle.zip")
			},
			FileRecord::new("d", "bare"),
		]
	}

	fn every_criteria() -> Vec<FilterCriteria> {
		let mut all = vec![FilterCriteria::default()];
		for field in [
			FilterField::Type,
			FilterField::Size,
			FilterField::Date,
			FilterField::Price,
			FilterField::Downloads,
		] {
			let mut next = Vec::new();
			for base in &all {
				for (tag, _) in field.options() {
					let mut criteria = *base;
					criteria.set(field, tag).unwrap();
					next.push(criteria);
				}
			}
			all.extend(next);
		}
		all
	}

	#[test]
	fn size_less_than_one_megabyte() {
		let records = vec![sized("h1", 500_000), sized("h2", 2_000_000_000)];
		let mut criteria = FilterCriteria::default();
		criteria.set(FilterField::Size, "less1mb").unwrap();
		let result = apply(&records, &criteria, day(2024, 1, 1));
		let hashes: Vec<&str> = result.iter().map(|r| r.hash.as_str()).collect();
		assert_eq!(hashes, vec!["h1"]);
	}

	#[test]
	fn size_buckets_cover_every_size() {
		for size in [0, MB - 1, MB, GB - 1, GB, GB + 1, u64::MAX] {
			assert!(SizeBucket::Under1Gb.contains(size) || SizeBucket::Over1Gb.contains(size));
			assert!(!(SizeBucket::Under1Gb.contains(size) && SizeBucket::Over1Gb.contains(size)));
		}
	}

	#[test]
	fn missing_attributes_pass_every_filter() {
		let records = sample();
		let today = day(2024, 6, 15);
		for criteria in every_criteria() {
			let result = apply(&records, &criteria, today);
			assert!(result.iter().any(|r| r.hash == "d"), "{criteria:?}");
		}
	}

	#[test]
	fn results_satisfy_active_criteria() {
		let records = sample();
		let today = day(2024, 6, 15);
		for criteria in every_criteria() {
			for record in apply(&records, &criteria, today) {
				assert!(records.iter().any(|r| std::ptr::eq(r, record)));
				if let (Some(bucket), Some(size)) = (criteria.size, record.size) {
					assert!(bucket.contains(size));
				}
				if let (Some(bucket), Some(price)) = (criteria.price, record.price) {
					assert!(bucket.contains(price));
				}
				if let (Some(bucket), Some(date)) = (criteria.date, record.date) {
					assert!(bucket.contains(date, today));
				}
				if let (Some(kind), Some(actual)) = (criteria.kind, record.kind()) {
					assert_eq!(kind, actual);
				}
			}
		}
	}

	#[test]
	fn adding_a_constraint_never_grows_the_result() {
		let records = sample();
		let today = day(2024, 6, 15);
		for base in every_criteria() {
			let before = apply(&records, &base, today).len();
			for field in [
				FilterField::Type,
				FilterField::Size,
				FilterField::Date,
				FilterField::Price,
				FilterField::Downloads,
			] {
				if !base.tag(field).is_empty() {
					continue;
				}
				for (tag, _) in field.options() {
					let mut narrowed = base;
					narrowed.set(field, tag).unwrap();
					assert!(apply(&records, &narrowed, today).len() <= before);
				}
			}
		}
	}

	#[test]
	fn preserves_input_order() {
		let records = sample();
		let mut criteria = FilterCriteria::default();
		criteria.set(FilterField::Price, "more20").unwrap();
		let hashes: Vec<&str> = apply(&records, &criteria, day(2024, 6, 15))
			.iter()
			.map(|r| r.hash.as_str())
			.collect();
		assert_eq!(hashes, vec!["c", "d"]);
	}

	#[test]
	fn price_middle_bucket_is_inclusive() {
		assert!(PriceBucket::From5To20.contains(5.0));
		assert!(PriceBucket::From5To20.contains(20.0));
		assert!(!PriceBucket::From5To20.contains(20.01));
		assert!(PriceBucket::Under5.contains(4.99));
		assert!(!PriceBucket::Over20.contains(20.0));
	}

	#[test]
	fn date_buckets_include_their_bounds() {
		let today = day(2024, 3, 31);
		assert!(DateBucket::Today.contains(today, today));
		assert!(!DateBucket::Today.contains(day(2024, 3, 30), today));
		assert!(DateBucket::Last7Days.contains(day(2024, 3, 24), today));
		assert!(!DateBucket::Last7Days.contains(day(2024, 3, 23), today));
		assert!(DateBucket::Last30Days.contains(day(2024, 3, 1), today));
		assert!(DateBucket::Last6Months.contains(day(2023, 9, 30), today));
		assert!(!DateBucket::Last6Months.contains(day(2023, 9, 29), today));
		assert!(DateBucket::ThisYear.contains(day(2024, 1, 1), today));
		assert!(!DateBucket::ThisYear.contains(day(2024, 4, 1), today));
		assert!(DateBucket::LastYear.contains(day(2023, 12, 31), today));
		assert!(!DateBucket::LastYear.contains(day(2024, 1, 1), today));
		assert!(!DateBucket::Last30Days.contains(day(2024, 4, 2), today));
	}

	#[test]
	fn clearing_restores_the_full_collection() {
		let records = sample();
		let mut criteria = FilterCriteria::default();
		criteria.set(FilterField::Type, "media").unwrap();
		criteria.set(FilterField::Date, "today").unwrap();
		assert!(apply(&records, &criteria, day(2024, 6, 15)).len() < records.len());
		criteria.clear();
		assert!(criteria.is_unconstrained());
		assert_eq!(apply(&records, &criteria, day(2024, 6, 15)).len(), records.len());
	}

	#[test]
	fn rejects_unknown_tags() {
		let mut criteria = FilterCriteria::default();
		assert!(criteria.set(FilterField::Size, "1to5gb").is_err());
		assert!(criteria.is_unconstrained());
		criteria.set(FilterField::Size, "more1gb").unwrap();
		criteria.set(FilterField::Size, "").unwrap();
		assert_eq!(criteria.size, None);
	}
}
