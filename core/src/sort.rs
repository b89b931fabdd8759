use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::MarketError;
use crate::record::FileRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
	Name,
	Extension,
	Size,
	Date,
	Price,
	Downloads,
	Hash,
}

pub const COLUMNS: [Column; 7] = [
	Column::Name,
	Column::Extension,
	Column::Size,
	Column::Date,
	Column::Price,
	Column::Downloads,
	Column::Hash,
];

impl Column {
	pub fn key(self) -> &'static str {
		match self {
			Column::Name => "name",
			Column::Extension => "extension",
			Column::Size => "size",
			Column::Date => "date",
			Column::Price => "price",
			Column::Downloads => "downloads",
			Column::Hash => "hash",
		}
	}

	pub fn header(self) -> &'static str {
		match self {
			Column::Name => "Name",
			Column::Extension => "Type",
			Column::Size => "Size",
			Column::Date => "Date",
			Column::Price => "Price",
			Column::Downloads => "Downloads",
			Column::Hash => "Hash",
		}
	}
}

impl fmt::Display for Column {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.key())
	}
}

impl FromStr for Column {
	type Err = MarketError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		let value = value.trim();
		COLUMNS
			.iter()
			.copied()
			.find(|column| {
				column.key().eq_ignore_ascii_case(value) || column.header().eq_ignore_ascii_case(value)
			})
			.ok_or_else(|| MarketError::validation(format!("unknown column: {value}")))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
	#[default]
	Ascending,
	Descending,
}

impl Direction {
	pub fn flip(self) -> Self {
		match self {
			Direction::Ascending => Direction::Descending,
			Direction::Descending => Direction::Ascending,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
	pub column: Column,
	pub direction: Direction,
}

impl SortSpec {
	pub const fn new(column: Column, direction: Direction) -> Self {
		Self { column, direction }
	}

	pub const fn ascending(column: Column) -> Self {
		Self::new(column, Direction::Ascending)
	}

	pub const fn descending(column: Column) -> Self {
		Self::new(column, Direction::Descending)
	}

	/// Header click: the active column flips direction, any other column
	/// becomes active in ascending order.
	pub fn clicked(self, column: Column) -> Self {
		if self.column == column {
			Self::new(column, self.direction.flip())
		} else {
			Self::ascending(column)
		}
	}
}

enum Key<'a> {
	Integer(u64),
	Decimal(f64),
	Date(NaiveDate),
	Text(&'a str),
}

fn key(record: &FileRecord, column: Column) -> Option<Key<'_>> {
	match column {
		Column::Name => non_empty(&record.name),
		Column::Extension => record.extension.as_deref().and_then(non_empty),
		Column::Hash => non_empty(&record.hash),
		Column::Size => record.size.map(Key::Integer),
		Column::Downloads => record.downloads.map(Key::Integer),
		Column::Price => record.price.map(Key::Decimal),
		Column::Date => record.date.map(Key::Date),
	}
}

fn non_empty(value: &str) -> Option<Key<'_>> {
	(!value.trim().is_empty()).then_some(Key::Text(value))
}

fn compare_keys(a: &Key<'_>, b: &Key<'_>) -> Ordering {
	match (a, b) {
		(Key::Integer(a), Key::Integer(b)) => a.cmp(b),
		(Key::Decimal(a), Key::Decimal(b)) => a.total_cmp(b),
		(Key::Date(a), Key::Date(b)) => a.cmp(b),
		(Key::Text(a), Key::Text(b)) => natural_cmp(a, b),
		_ => Ordering::Equal,
	}
}

/// Orders two records by `spec`. Records lacking the key come last whichever
/// way the column is sorted.
pub fn compare(a: &FileRecord, b: &FileRecord, spec: SortSpec) -> Ordering {
	match (key(a, spec.column), key(b, spec.column)) {
		(Some(a), Some(b)) => {
			let ordering = compare_keys(&a, &b);
			match spec.direction {
				Direction::Ascending => ordering,
				Direction::Descending => ordering.reverse(),
			}
		}
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}

/// Stable sort; equal keys keep their relative order.
pub fn sort<T: AsRef<FileRecord>>(records: &mut [T], spec: SortSpec) {
	records.sort_by(|a, b| compare(a.as_ref(), b.as_ref(), spec));
}

/// Case-insensitive comparison treating digit runs as numbers, so `file2`
/// sorts before `file10`. Falls back to the raw strings to stay total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
	natural_fold(a, b).then_with(|| a.cmp(b))
}

fn natural_fold(a: &str, b: &str) -> Ordering {
	let mut left = a.chars().peekable();
	let mut right = b.chars().peekable();
	loop {
		match (left.peek().copied(), right.peek().copied()) {
			(None, None) => return Ordering::Equal,
			(None, Some(_)) => return Ordering::Less,
			(Some(_), None) => return Ordering::Greater,
			(Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
				let l_run = take_digits(&mut left);
				let r_run = take_digits(&mut right);
				let ordering = compare_digit_runs(&l_run, &r_run);
				if ordering != Ordering::Equal {
					return ordering;
				}
			}
			(Some(l), Some(r)) => {
				let ordering = l.to_lowercase().cmp(r.to_lowercase());
				if ordering != Ordering::Equal {
					return ordering;
				}
				left.next();
				right.next();
			}
		}
	}
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
	let mut run = String::new();
	while let Some(c) = chars.next_if(char::is_ascii_digit) {
		run.push(c);
	}
	run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
	let a_trimmed = a.trim_start_matches('0');
	let b_trimmed = b.trim_start_matches('0');
	a_trimmed
		.len()
		.cmp(&b_trimmed.len())
		.then_with(|| a_trimmed.cmp(b_trimmed))
		.then_with(|| a.len().cmp(&b.len()))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn named(hash: &str, name: &str) -> FileRecord {
		FileRecord::new(hash, name)
	}

	fn hashes(records: &[FileRecord]) -> Vec<&str> {
		records.iter().map(|r| r.hash.as_str()).collect()
	}

	#[test]
	fn natural_order_for_text() {
		let mut records = vec![
			named("a", "file10.txt"),
			named("b", "File2.txt"),
			named("c", "file1.txt"),
			named("d", "alpha"),
		];
		sort(&mut records, SortSpec::ascending(Column::Name));
		assert_eq!(hashes(&records), vec!["d", "c", "b", "a"]);
	}

	#[test]
	fn natural_cmp_is_total() {
		assert_eq!(natural_cmp("a", "A"), "a".cmp("A"));
		assert_ne!(natural_cmp("file01", "file1"), Ordering::Equal);
		assert_eq!(natural_cmp("x9", "x10"), Ordering::Less);
	}

	#[test]
	fn missing_keys_sort_last_both_ways() {
		let mut records = vec![
			FileRecord {
				price: None,
				..named("none", "n")
			},
			FileRecord {
				price: Some(3.0),
				..named("three", "t")
			},
			FileRecord {
				price: Some(1.0),
				..named("one", "o")
			},
		];
		sort(&mut records, SortSpec::ascending(Column::Price));
		assert_eq!(hashes(&records), vec!["one", "three", "none"]);
		sort(&mut records, SortSpec::descending(Column::Price));
		assert_eq!(hashes(&records), vec!["three", "one", "none"]);
	}

	#[test]
	fn empty_names_count_as_missing() {
		let mut records = vec![named("blank", ""), named("b", "b"), named("a", "a")];
		sort(&mut records, SortSpec::descending(Column::Name));
		assert_eq!(hashes(&records), vec!["b", "a", "blank"]);
	}

	#[test]
	fn sorting_twice_changes_nothing() {
		let day = |d| NaiveDate::from_ymd_opt(2024, 5, d);
		let records = vec![
			FileRecord {
				date: day(3),
				size: Some(10),
				..named("x", "x")
			},
			FileRecord {
				date: day(1),
				size: Some(10),
				..named("y", "y")
			},
			FileRecord {
				date: None,
				size: None,
				..named("z", "z")
			},
			FileRecord {
				date: day(3),
				size: Some(2),
				..named("w", "w")
			},
		];
		for column in COLUMNS {
			for spec in [SortSpec::ascending(column), SortSpec::descending(column)] {
				let mut once = records.clone();
				sort(&mut once, spec);
				let mut twice = once.clone();
				sort(&mut twice, spec);
				assert_eq!(once, twice, "{spec:?}");
			}
		}
	}

	#[test]
	fn equal_keys_keep_input_order() {
		let mut records = vec![
			FileRecord {
				size: Some(5),
				..named("first", "f")
			},
			FileRecord {
				size: Some(5),
				..named("second", "s")
			},
		];
		sort(&mut records, SortSpec::descending(Column::Size));
		assert_eq!(hashes(&records), vec!["first", "second"]);
	}

	#[test]
	fn sorts_references_too() {
		let records = vec![named("b", "b"), named("a", "a")];
		let mut rows: Vec<&FileRecord> = records.iter().collect();
		sort(&mut rows, SortSpec::ascending(Column::Hash));
		assert_eq!(rows[0].hash, "a");
	}

	#[test]
	fn header_clicks_toggle_or_switch() {
		let spec = SortSpec::descending(Column::Date);
		assert_eq!(spec.clicked(Column::Date), SortSpec::ascending(Column::Date));
		assert_eq!(spec.clicked(Column::Name), SortSpec::ascending(Column::Name));
		assert_eq!(
			spec.clicked(Column::Date).clicked(Column::Date),
			SortSpec::descending(Column::Date)
		);
	}

	#[test]
	fn parses_columns() {
		assert_eq!("size".parse::<Column>().unwrap(), Column::Size);
		assert_eq!("Type".parse::<Column>().unwrap(), Column::Extension);
		assert!("owner".parse::<Column>().is_err());
	}
}
