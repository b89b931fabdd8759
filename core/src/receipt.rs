use std::fmt;

use crate::error::{MarketError, MarketResult};
use crate::record::FileRecord;
use crate::section::BatchAction;

/// Accepts a price only when it is set, finite and not negative.
pub fn validate_price(price: Option<f64>) -> MarketResult<f64> {
	match price {
		None => Err(MarketError::validation("This file has no price.")),
		Some(price) if !price.is_finite() || price < 0.0 => Err(MarketError::validation(
			format!("Invalid price: {price}"),
		)),
		Some(price) => Ok(price),
	}
}

/// Balance check run before a purchase is committed.
///
/// A resulting negative balance is reported, never refused; the ledger is the
/// authority on whether the payment goes through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceGate {
	pub balance: f64,
	pub price: f64,
	pub new_balance: f64,
}

impl BalanceGate {
	pub fn check(balance: Option<f64>, price: Option<f64>) -> MarketResult<Self> {
		let price = validate_price(price)?;
		let balance = balance
			.filter(|balance| balance.is_finite())
			.ok_or_else(|| MarketError::unavailable("Wallet balance is not available yet."))?;
		Ok(Self {
			balance,
			price,
			new_balance: balance - price,
		})
	}

	pub fn overdrawn(&self) -> bool {
		self.new_balance < 0.0
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Funds {
	pub balance: f64,
	pub total: f64,
	pub new_balance: f64,
}

/// Summary shown before an action is committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
	pub title: String,
	pub action: BatchAction,
	pub files: Vec<FileRecord>,
	/// Present for purchases only.
	pub funds: Option<Funds>,
}

impl Receipt {
	pub fn purchase(gate: BalanceGate, record: FileRecord) -> Self {
		Self {
			title: "Transaction Information".to_string(),
			action: BatchAction::Download,
			files: vec![record],
			funds: Some(Funds {
				balance: gate.balance,
				total: gate.price,
				new_balance: gate.new_balance,
			}),
		}
	}

	pub fn batch(action: BatchAction, files: Vec<FileRecord>) -> Self {
		let title = match action {
			BatchAction::Delete => "Delete these files?",
			BatchAction::Host => "Host these files?",
			BatchAction::Share => "Share these files?",
			BatchAction::Download => "Transaction Information",
			BatchAction::Info => "File Information",
		};
		Self {
			title: title.to_string(),
			action,
			files,
			funds: None,
		}
	}

	pub fn total(&self) -> f64 {
		self.files.iter().filter_map(|file| file.price).sum()
	}
}

const MISSING: &str = "——";

impl fmt::Display for Receipt {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "{}", self.title)?;
		if let Some(funds) = &self.funds {
			writeln!(f, "Balance: {}", format_amount(funds.balance))?;
		}
		if self.action == BatchAction::Delete {
			for file in &self.files {
				writeln!(f, "  {}  {}", file.name, format_optional_size(file.size))?;
			}
		} else {
			for file in &self.files {
				writeln!(f, "File Name: {}", file.name)?;
				writeln!(f, "File Size: {}", format_optional_size(file.size))?;
				writeln!(
					f,
					"File Extension: {}",
					file.extension.as_deref().unwrap_or(MISSING)
				)?;
				if let Some(price) = file.price {
					writeln!(f, "File Price: {}", format_amount(price))?;
				}
			}
		}
		if let Some(funds) = &self.funds {
			writeln!(f, "Price: {}", format_amount(funds.total))?;
			write!(f, "New Balance: {}", format_amount(funds.new_balance))?;
		}
		Ok(())
	}
}

/// Up to eight decimals with trailing zeros removed: `480`, `12.5`.
pub fn format_amount(amount: f64) -> String {
	let text = format!("{amount:.8}");
	let text = text.trim_end_matches('0').trim_end_matches('.');
	match text {
		"-0" | "" => "0".to_string(),
		text => text.to_string(),
	}
}

/// Decimal units, two places above one kilobyte.
pub fn format_size(bytes: u64) -> String {
	let value = bytes as f64;
	if value >= 1e9 {
		format!("{:.2} GB", value / 1e9)
	} else if value >= 1e6 {
		format!("{:.2} MB", value / 1e6)
	} else if value >= 1e3 {
		format!("{:.2} KB", value / 1e3)
	} else {
		format!("{bytes} B")
	}
}

pub fn format_optional_size(bytes: Option<u64>) -> String {
	bytes.map(format_size).unwrap_or_else(|| MISSING.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_balance_is_balance_minus_price() {
		let gate = BalanceGate::check(Some(500.0), Some(20.0)).unwrap();
		assert_eq!(gate.new_balance, 480.0);
		let mut record = FileRecord::new("h1", "song.mp3");
		record.price = Some(20.0);
		let receipt = Receipt::purchase(gate, record);
		let text = receipt.to_string();
		assert!(text.contains("New Balance: 480"), "{text}");
		assert!(text.contains("Balance: 500"));
	}

	#[test]
	fn refuses_unusable_prices() {
		for price in [None, Some(f64::NAN), Some(f64::INFINITY), Some(-0.5)] {
			let err = BalanceGate::check(Some(10.0), price).unwrap_err();
			assert!(matches!(err, MarketError::Validation(_)), "{price:?}");
		}
	}

	#[test]
	fn negative_result_is_reported_not_blocked() {
		let gate = BalanceGate::check(Some(5.0), Some(7.5)).unwrap();
		assert!(gate.overdrawn());
		assert_eq!(format_amount(gate.new_balance), "-2.5");
	}

	#[test]
	fn needs_a_known_balance() {
		let err = BalanceGate::check(None, Some(1.0)).unwrap_err();
		assert!(matches!(err, MarketError::Unavailable(_)));
	}

	#[test]
	fn free_files_pass() {
		let gate = BalanceGate::check(Some(0.0), Some(0.0)).unwrap();
		assert_eq!(format_amount(gate.new_balance), "0");
	}

	#[test]
	fn formats_amounts_and_sizes() {
		assert_eq!(format_amount(12.50), "12.5");
		assert_eq!(format_amount(0.1 + 0.2), "0.3");
		assert_eq!(format_size(999), "999 B");
		assert_eq!(format_size(1_500), "1.50 KB");
		assert_eq!(format_size(2_000_000_000), "2.00 GB");
		assert_eq!(format_optional_size(None), "——");
	}

	#[test]
	fn delete_receipt_lists_names_and_sizes() {
		let mut a = FileRecord::new("a", "a.txt");
		a.size = Some(2_000);
		let receipt = Receipt::batch(BatchAction::Delete, vec![a, FileRecord::new("b", "b.bin")]);
		let text = receipt.to_string();
		assert!(text.starts_with("Delete these files?"));
		assert!(text.contains("a.txt  2.00 KB"));
		assert!(text.contains("b.bin  ——"));
		assert!(!text.contains("Balance"));
	}
}
