//! Per-section grid layout: which columns and filters are shown, the initial
//! sort, and which batch actions the toolbar offers.

use std::fmt;
use std::str::FromStr;

use crate::error::MarketError;
use crate::filter::FilterField;
use crate::record::Section;
use crate::sort::{Column, SortSpec};

use BatchAction::*;
use FilterField as F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchAction {
	Download,
	Host,
	Share,
	Delete,
	Info,
}

impl BatchAction {
	pub fn label(self) -> &'static str {
		match self {
			BatchAction::Download => "Download",
			BatchAction::Host => "Host",
			BatchAction::Share => "Share",
			BatchAction::Delete => "Delete",
			BatchAction::Info => "Info",
		}
	}

	/// Actions that act on one record at a time.
	pub fn needs_single(self) -> bool {
		matches!(self, BatchAction::Download | BatchAction::Info)
	}

	/// Actions that change a server collection and go through a receipt.
	pub fn is_mutation(self) -> bool {
		matches!(self, BatchAction::Host | BatchAction::Share | BatchAction::Delete)
	}
}

impl fmt::Display for BatchAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl FromStr for BatchAction {
	type Err = MarketError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		[
			BatchAction::Download,
			BatchAction::Host,
			BatchAction::Share,
			BatchAction::Delete,
			BatchAction::Info,
		]
		.into_iter()
		.find(|action| action.label().eq_ignore_ascii_case(value.trim()))
		.ok_or_else(|| MarketError::validation(format!("unknown action: {value}")))
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSpec {
	pub section: Section,
	pub columns: &'static [Column],
	pub filters: &'static [FilterField],
	pub default_sort: SortSpec,
	pub actions: &'static [BatchAction],
}

impl SectionSpec {
	pub fn allows(&self, action: BatchAction) -> bool {
		self.actions.contains(&action)
	}

	pub fn shows_filter(&self, field: FilterField) -> bool {
		self.filters.contains(&field)
	}
}

const FULL_COLUMNS: &[Column] = &[
	Column::Name,
	Column::Extension,
	Column::Size,
	Column::Date,
	Column::Price,
];
const DATED_COLUMNS: &[Column] = &[Column::Name, Column::Extension, Column::Size, Column::Date];
const EXPLORE_COLUMNS: &[Column] = &[
	Column::Name,
	Column::Extension,
	Column::Size,
	Column::Date,
	Column::Price,
	Column::Downloads,
];
const PLAIN_COLUMNS: &[Column] = &[Column::Name, Column::Extension, Column::Size];

const PRICED_FILTERS: &[FilterField] = &[F::Type, F::Size, F::Date, F::Price];
const DATED_FILTERS: &[FilterField] = &[F::Type, F::Size, F::Date];
const ALL_FILTERS: &[FilterField] = &[F::Type, F::Size, F::Date, F::Price, F::Downloads];
const PLAIN_FILTERS: &[FilterField] = &[F::Type, F::Size];

const NEWEST_FIRST: SortSpec = SortSpec::descending(Column::Date);

static SPECS: [SectionSpec; 6] = [
	SectionSpec {
		section: Section::Hosting,
		columns: FULL_COLUMNS,
		filters: PRICED_FILTERS,
		default_sort: NEWEST_FIRST,
		actions: &[Share, Delete, Info],
	},
	SectionSpec {
		section: Section::Storing,
		columns: DATED_COLUMNS,
		filters: DATED_FILTERS,
		default_sort: NEWEST_FIRST,
		actions: &[Host, Share, Delete, Info],
	},
	SectionSpec {
		section: Section::Sharing,
		columns: DATED_COLUMNS,
		filters: DATED_FILTERS,
		default_sort: NEWEST_FIRST,
		actions: &[Host, Delete, Info],
	},
	SectionSpec {
		section: Section::Explore,
		columns: EXPLORE_COLUMNS,
		filters: ALL_FILTERS,
		default_sort: NEWEST_FIRST,
		actions: &[Download, Info],
	},
	SectionSpec {
		section: Section::Saved,
		columns: PLAIN_COLUMNS,
		filters: PLAIN_FILTERS,
		default_sort: SortSpec::ascending(Column::Name),
		actions: &[Download, Delete, Info],
	},
	SectionSpec {
		section: Section::Purchased,
		columns: FULL_COLUMNS,
		filters: PRICED_FILTERS,
		default_sort: NEWEST_FIRST,
		actions: &[Info],
	},
];

pub fn spec(section: Section) -> &'static SectionSpec {
	match section {
		Section::Hosting => &SPECS[0],
		Section::Storing => &SPECS[1],
		Section::Sharing => &SPECS[2],
		Section::Explore => &SPECS[3],
		Section::Saved => &SPECS[4],
		Section::Purchased => &SPECS[5],
	}
}
