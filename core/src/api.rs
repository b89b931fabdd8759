use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{MarketError, MarketResult};
use crate::record::{FileRecord, Section, Wallet};

/// Raw payload returned by a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
	/// Name from `Content-Disposition`, when the server sent one.
	pub file_name: Option<String>,
	pub content_type: Option<String>,
	pub data: Vec<u8>,
}

/// The marketplace node's HTTP surface.
#[async_trait]
pub trait MarketApi: Send + Sync {
	async fn list(&self, section: Section) -> MarketResult<Vec<FileRecord>>;

	/// Adds `record` to a section. Returns the server's text reply, such as a
	/// share link or "already hosted" notice.
	async fn add(&self, section: Section, record: &FileRecord) -> MarketResult<Option<String>>;

	async fn delete(&self, section: Section, hash: &str) -> MarketResult<Option<String>>;

	/// Peer ids currently providing `hash`.
	async fn find_providers(&self, hash: &str) -> MarketResult<Vec<String>>;

	/// The file as offered by `peer`, with that peer's price.
	async fn request_metadata(&self, peer: &str, hash: &str) -> MarketResult<FileRecord>;

	async fn download(&self, peer: &str, hash: &str, price: f64) -> MarketResult<Download>;

	async fn wallet(&self) -> MarketResult<Wallet>;
}

#[derive(Serialize)]
struct MetadataRequest<'a> {
	peer: &'a str,
	hash: &'a str,
}

#[derive(Serialize)]
struct DownloadRequest<'a> {
	peer: &'a str,
	hash: &'a str,
	price: f64,
}

pub struct HttpMarketApi {
	client: Client,
	base: Url,
}

impl HttpMarketApi {
	pub fn new(base: &str, timeout: Duration) -> MarketResult<Self> {
		let mut base = Url::parse(base.trim())
			.map_err(|err| MarketError::validation(format!("invalid api url {base}: {err}")))?;
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());
			base.set_path(&path);
		}
		let client = Client::builder()
			.timeout(timeout)
			.user_agent(concat!("orcanet/", env!("CARGO_PKG_VERSION")))
			.build()?;
		Ok(Self { client, base })
	}

	pub fn base(&self) -> &Url {
		&self.base
	}

	fn url(&self, path: &str) -> MarketResult<Url> {
		self.base
			.join(path)
			.map_err(|err| MarketError::validation(format!("invalid endpoint {path}: {err}")))
	}

	async fn send(&self, request: RequestBuilder) -> MarketResult<Response> {
		let response = request.send().await?;
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		let url = response.url().clone();
		let body = response.text().await.unwrap_or_default();
		log::warn!("{url} answered {status}");
		Err(MarketError::Transport(format!("{status}: {}", body.trim())))
	}

	async fn get_json<T: DeserializeOwned>(&self, path: &str) -> MarketResult<T> {
		let response = self.send(self.client.get(self.url(path)?)).await?;
		decode_json(response).await
	}

	async fn post_text(&self, path: &str, body: &str) -> MarketResult<Response> {
		let request = self
			.client
			.post(self.url(path)?)
			.header(CONTENT_TYPE, "text/plain")
			.body(body.to_string());
		self.send(request).await
	}
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> MarketResult<T> {
	let body = response.text().await?;
	let body = if body.trim().is_empty() { "null" } else { body.as_str() };
	serde_json::from_str(body)
		.map_err(|err| MarketError::Transport(format!("unexpected response: {err}")))
}

/// Text replies are either plain text or a JSON string.
async fn notice(response: Response) -> MarketResult<Option<String>> {
	let body = response.text().await?;
	let text = match serde_json::from_str::<serde_json::Value>(&body) {
		Ok(serde_json::Value::String(text)) => text,
		Ok(serde_json::Value::Null) => String::new(),
		_ => body,
	};
	let text = text.trim();
	Ok((!text.is_empty()).then(|| text.to_string()))
}

fn ensure_mutable(section: Section) -> MarketResult<()> {
	if section.is_mutable() {
		Ok(())
	} else {
		Err(MarketError::unavailable(format!(
			"{section} cannot be changed"
		)))
	}
}

#[async_trait]
impl MarketApi for HttpMarketApi {
	async fn list(&self, section: Section) -> MarketResult<Vec<FileRecord>> {
		let records: Option<Vec<FileRecord>> = self.get_json(section.path()).await?;
		Ok(records.unwrap_or_default())
	}

	async fn add(&self, section: Section, record: &FileRecord) -> MarketResult<Option<String>> {
		ensure_mutable(section)?;
		let url = self.url(&format!("add{}", section.path()))?;
		let response = self.send(self.client.post(url).json(record)).await?;
		notice(response).await
	}

	async fn delete(&self, section: Section, hash: &str) -> MarketResult<Option<String>> {
		ensure_mutable(section)?;
		let response = self.post_text(&format!("delete{}", section.path()), hash).await?;
		notice(response).await
	}

	async fn find_providers(&self, hash: &str) -> MarketResult<Vec<String>> {
		let response = self.post_text("getproviders", hash).await?;
		let peers: Option<Vec<String>> = decode_json(response).await?;
		Ok(peers.unwrap_or_default())
	}

	async fn request_metadata(&self, peer: &str, hash: &str) -> MarketResult<FileRecord> {
		let request = self
			.client
			.post(self.url("requestmetadata")?)
			.json(&MetadataRequest { peer, hash });
		let response = self.send(request).await?;
		let record: Option<FileRecord> = decode_json(response).await?;
		record.ok_or_else(|| MarketError::NotFound(format!("{peer} has no metadata for {hash}")))
	}

	async fn download(&self, peer: &str, hash: &str, price: f64) -> MarketResult<Download> {
		let request = self
			.client
			.post(self.url("downloadfile")?)
			.json(&DownloadRequest { peer, hash, price });
		let response = self.send(request).await?;
		let file_name = header_text(&response, CONTENT_DISPOSITION)
			.and_then(|value| disposition_file_name(&value));
		let content_type = header_text(&response, CONTENT_TYPE);
		let data = response.bytes().await?.to_vec();
		log::info!("received {} bytes of {hash} from {peer}", data.len());
		Ok(Download {
			file_name,
			content_type,
			data,
		})
	}

	async fn wallet(&self) -> MarketResult<Wallet> {
		self.get_json("wallet").await
	}
}

fn header_text(response: &Response, name: HeaderName) -> Option<String> {
	response
		.headers()
		.get(name)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string)
}

/// Extracts the file name of a `Content-Disposition` header. The extended
/// `filename*` form wins over the plain one.
pub fn disposition_file_name(value: &str) -> Option<String> {
	let mut plain = None;
	for param in value.split(';').map(str::trim) {
		let Some((key, raw)) = param.split_once('=') else {
			continue;
		};
		let raw = raw.trim();
		match key.trim().to_ascii_lowercase().as_str() {
			"filename*" => {
				let encoded = raw.split_once("''").map(|(_, rest)| rest).unwrap_or(raw);
				let decoded: String = url::form_urlencoded::parse(format!("n={encoded}").as_bytes())
					.map(|(_, value)| value.into_owned())
					.next()?;
				if !decoded.trim().is_empty() {
					return Some(decoded);
				}
			}
			"filename" => {
				let name = raw.trim_matches('"').trim();
				if !name.is_empty() {
					plain = Some(name.to_string());
				}
			}
			_ => {}
		}
	}
	plain
}
