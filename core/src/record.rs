use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{MarketError, MarketResult};

/// Named file collections shown by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
	Hosting,
	Storing,
	Sharing,
	Explore,
	Saved,
	Purchased,
}

pub const SECTIONS: [Section; 6] = [
	Section::Hosting,
	Section::Storing,
	Section::Sharing,
	Section::Explore,
	Section::Saved,
	Section::Purchased,
];

impl Section {
	pub fn label(self) -> &'static str {
		match self {
			Section::Hosting => "Hosting",
			Section::Storing => "Storing",
			Section::Sharing => "Sharing",
			Section::Explore => "Explore",
			Section::Saved => "Saved",
			Section::Purchased => "Purchased",
		}
	}

	/// Path segment of the `GET /{section}` listing. Purchased files are the
	/// server's download history.
	pub fn path(self) -> &'static str {
		match self {
			Section::Hosting => "hosting",
			Section::Storing => "storing",
			Section::Sharing => "sharing",
			Section::Explore => "explore",
			Section::Saved => "saved",
			Section::Purchased => "downloads",
		}
	}

	/// Whether the server exposes `add{section}` / `delete{section}` for it.
	pub fn is_mutable(self) -> bool {
		matches!(
			self,
			Section::Hosting | Section::Storing | Section::Sharing | Section::Saved
		)
	}
}

impl fmt::Display for Section {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.label())
	}
}

impl FromStr for Section {
	type Err = MarketError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		let value = value.trim();
		SECTIONS
			.iter()
			.copied()
			.find(|section| {
				section.label().eq_ignore_ascii_case(value)
					|| section.path().eq_ignore_ascii_case(value)
			})
			.ok_or_else(|| MarketError::validation(format!("unknown section: {value}")))
	}
}

/// A file row as listed by the server.
///
/// Numeric and date attributes that cannot be parsed decode as `None` so a
/// single malformed row never breaks a listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FileRecord {
	pub hash: String,
	#[serde(default, alias = "file_name", deserialize_with = "lenient_text")]
	pub name: String,
	#[serde(
		default,
		deserialize_with = "lenient_optional_text",
		skip_serializing_if = "Option::is_none"
	)]
	pub extension: Option<String>,
	#[serde(
		default,
		alias = "file_size",
		deserialize_with = "lenient_count",
		skip_serializing_if = "Option::is_none"
	)]
	pub size: Option<u64>,
	#[serde(
		default,
		deserialize_with = "lenient_date",
		serialize_with = "serialize_date",
		skip_serializing_if = "Option::is_none"
	)]
	pub date: Option<NaiveDate>,
	#[serde(
		default,
		alias = "file_price",
		deserialize_with = "lenient_amount",
		skip_serializing_if = "Option::is_none"
	)]
	pub price: Option<f64>,
	#[serde(
		default,
		alias = "download_times",
		deserialize_with = "lenient_count",
		skip_serializing_if = "Option::is_none"
	)]
	pub downloads: Option<u64>,
}

impl FileRecord {
	pub fn new(hash: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			hash: hash.into(),
			name: name.into(),
			..Self::default()
		}
	}

	pub fn kind(&self) -> Option<FileKind> {
		self.extension.as_deref().and_then(FileKind::from_extension)
	}
}

impl AsRef<FileRecord> for FileRecord {
	fn as_ref(&self) -> &FileRecord {
		self
	}
}

/// Coarse file category derived from an extension or MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
	Document,
	Media,
	Other,
}

const DOCUMENT_EXTENSIONS: &[&str] = &[
	"pdf", "doc", "docx", "odt", "rtf", "txt", "md", "tex", "epub", "xls", "xlsx", "ods", "csv",
	"ppt", "pptx", "odp", "pages", "numbers", "key",
];

impl FileKind {
	/// Accepts `pdf`, `.pdf` or `application/pdf`. Returns `None` for a blank
	/// value, which filters treat as a missing attribute.
	pub fn from_extension(value: &str) -> Option<Self> {
		let value = value.trim().to_ascii_lowercase();
		if value.is_empty() {
			return None;
		}
		if value.contains('/') {
			return Some(Self::from_mime(&value));
		}
		let ext = value.trim_start_matches('.');
		if DOCUMENT_EXTENSIONS.contains(&ext) {
			return Some(FileKind::Document);
		}
		match mime_guess::from_ext(ext).first_raw() {
			Some(mime) if is_media_mime(mime) => Some(FileKind::Media),
			_ => Some(FileKind::Other),
		}
	}

	fn from_mime(mime: &str) -> Self {
		let mime = mime.split(';').next().unwrap_or_default().trim();
		if is_media_mime(mime) {
			return FileKind::Media;
		}
		if mime.starts_with("text/") {
			return FileKind::Document;
		}
		let documented = mime_guess::get_mime_extensions_str(mime)
			.map(|exts| exts.iter().any(|ext| DOCUMENT_EXTENSIONS.contains(ext)))
			.unwrap_or(false);
		if documented {
			FileKind::Document
		} else {
			FileKind::Other
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			FileKind::Document => "Document",
			FileKind::Media => "Media",
			FileKind::Other => "Other",
		}
	}
}

fn is_media_mime(mime: &str) -> bool {
	mime.starts_with("image/") || mime.starts_with("audio/") || mime.starts_with("video/")
}

/// A provider of a file. The price is only known once that peer's metadata
/// has been fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRecord {
	pub peer_id: String,
	pub price: Option<f64>,
}

impl PeerRecord {
	pub fn new(peer_id: impl Into<String>) -> Self {
		Self {
			peer_id: peer_id.into(),
			price: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	#[serde(alias = "balance", deserialize_with = "strict_amount")]
	pub current_balance: f64,
	#[serde(default, deserialize_with = "lenient_amount_or_zero")]
	pub pending_balance: f64,
}

/// Parses user supplied amounts such as a hosting price.
pub fn parse_amount(text: &str) -> MarketResult<f64> {
	let text = text.trim();
	if text.is_empty() {
		return Err(MarketError::validation("Please input a price."));
	}
	match text.parse::<f64>() {
		Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
		Ok(_) => Err(MarketError::validation(
			"Price must be a non-negative number.",
		)),
		Err(_) => Err(MarketError::validation(format!("Invalid price: {text}"))),
	}
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

pub fn parse_date(text: &str) -> Option<NaiveDate> {
	let text = text.trim();
	if text.is_empty() {
		return None;
	}
	for format in DATE_FORMATS {
		if let Ok(date) = NaiveDate::parse_from_str(text, format) {
			return Some(date);
		}
	}
	DateTime::parse_from_rfc3339(text)
		.ok()
		.map(|value| value.date_naive())
}

fn value_to_f64(value: &Value) -> Option<f64> {
	let number = match value {
		Value::Number(n) => n.as_f64()?,
		Value::String(s) => s.trim().parse::<f64>().ok()?,
		_ => return None,
	};
	(number.is_finite() && number >= 0.0).then_some(number)
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Value::deserialize(deserializer)?;
	Ok(value_to_f64(&value))
}

fn lenient_amount_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(lenient_amount(deserializer)?.unwrap_or(0.0))
}

fn strict_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Value::deserialize(deserializer)?;
	match &value {
		Value::Number(n) => n
			.as_f64()
			.filter(|n| n.is_finite())
			.ok_or_else(|| serde::de::Error::custom("balance is not a finite number")),
		Value::String(s) => s
			.trim()
			.parse::<f64>()
			.ok()
			.filter(|n| n.is_finite())
			.ok_or_else(|| serde::de::Error::custom(format!("invalid balance: {s}"))),
		other => Err(serde::de::Error::custom(format!("invalid balance: {other}"))),
	}
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Value::deserialize(deserializer)?;
	let count = match &value {
		Value::Number(n) => n
			.as_u64()
			.or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).and_then(f64_to_u64)),
		Value::String(s) => s.trim().parse::<u64>().ok(),
		_ => None,
	};
	Ok(count)
}

fn f64_to_u64(value: f64) -> Option<u64> {
	(value >= 0.0 && value <= u64::MAX as f64).then_some(value as u64)
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Value::deserialize(deserializer)?;
	Ok(value.as_str().and_then(parse_date))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	Ok(lenient_optional_text(deserializer)?.unwrap_or_default())
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Value::deserialize(deserializer)?;
	let text = match value {
		Value::String(s) => s,
		Value::Number(n) => n.to_string(),
		_ => return Ok(None),
	};
	let trimmed = text.trim();
	Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn serialize_date<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
where
	S: Serializer,
{
	match date {
		Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
		None => serializer.serialize_none(),
	}
}
