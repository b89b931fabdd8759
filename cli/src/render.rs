use orcanet_core::FileRecord;
use orcanet_core::negotiation::NegotiationSession;
use orcanet_core::receipt::{format_amount, format_optional_size};
use orcanet_core::sort::{Column, Direction};
use orcanet_core::view::ViewState;

const MISSING: &str = "——";

fn cell(record: &FileRecord, column: Column) -> String {
	match column {
		Column::Name => record.name.clone(),
		Column::Extension => record.extension.clone().unwrap_or_else(|| MISSING.to_string()),
		Column::Size => format_optional_size(record.size),
		Column::Date => record
			.date
			.map(|date| date.format("%Y-%m-%d").to_string())
			.unwrap_or_else(|| MISSING.to_string()),
		Column::Price => record
			.price
			.map(format_amount)
			.unwrap_or_else(|| MISSING.to_string()),
		Column::Downloads => record
			.downloads
			.map(|n| n.to_string())
			.unwrap_or_else(|| MISSING.to_string()),
		Column::Hash => record.hash.clone(),
	}
}

pub fn table(view: &ViewState) -> String {
	let mut columns = view.spec().columns.to_vec();
	columns.push(Column::Hash);
	let sort = view.sort_spec();
	let header: Vec<String> = columns
		.iter()
		.map(|&column| {
			let arrow = match sort.direction {
				_ if column != sort.column => "",
				Direction::Ascending => " ^",
				Direction::Descending => " v",
			};
			format!("{}{arrow}", column.header())
		})
		.collect();
	let visible = view.rows();
	let rows: Vec<Vec<String>> = visible
		.iter()
		.map(|record| columns.iter().map(|&column| cell(record, column)).collect())
		.collect();
	let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
	for row in &rows {
		for (width, value) in widths.iter_mut().zip(row) {
			*width = (*width).max(value.chars().count());
		}
	}
	let line = |values: &[String]| -> String {
		values
			.iter()
			.zip(&widths)
			.map(|(value, &width)| format!("{value:<width$}"))
			.collect::<Vec<_>>()
			.join("  ")
			.trim_end()
			.to_string()
	};
	let mut out = line(&header);
	out.push('\n');
	for row in &rows {
		out.push_str(&line(row));
		out.push('\n');
	}
	out.push_str(&format!(
		"{} of {} files in {}",
		visible.len(),
		view.records().len(),
		view.section()
	));
	out
}

pub fn peers(session: &NegotiationSession) -> String {
	let mut out = format!("Providers of {}:\n", session.hash());
	for (i, peer) in session.peers().iter().enumerate() {
		let price = peer
			.price
			.map(format_amount)
			.unwrap_or_else(|| MISSING.to_string());
		out.push_str(&format!("  [{}] {}  {}\n", i + 1, peer.peer_id, price));
	}
	out
}
