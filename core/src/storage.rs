use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::MarketResult;

/// Directory purchased payloads are written to.
#[derive(Debug, Clone)]
pub struct DownloadStore {
	dir: PathBuf,
}

impl DownloadStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Writes `data` under a sanitized `name`. An existing file is never
	/// replaced; the name gets a ` (n)` suffix instead.
	pub async fn save(&self, name: &str, data: &[u8]) -> MarketResult<PathBuf> {
		fs::create_dir_all(&self.dir).await?;
		let name = sanitize_file_name(name);
		let path = self.free_path(&name).await?;
		let tmp = self.dir.join(format!(".{name}.part"));
		fs::write(&tmp, data).await?;
		if let Err(err) = fs::rename(&tmp, &path).await {
			let _ = fs::remove_file(&tmp).await;
			return Err(err.into());
		}
		log::info!("wrote {} bytes to {}", data.len(), path.display());
		Ok(path)
	}

	async fn free_path(&self, name: &str) -> MarketResult<PathBuf> {
		let candidate = self.dir.join(name);
		if !fs::try_exists(&candidate).await? {
			return Ok(candidate);
		}
		let (stem, ext) = match name.rsplit_once('.') {
			Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
			_ => (name, None),
		};
		let mut n = 1;
		loop {
			let next = match ext {
				Some(ext) => format!("{stem} ({n}).{ext}"),
				None => format!("{stem} ({n})"),
			};
			let candidate = self.dir.join(next);
			if !fs::try_exists(&candidate).await? {
				return Ok(candidate);
			}
			n += 1;
		}
	}
}

/// Reduces a server supplied name to a single safe path component.
pub fn sanitize_file_name(name: &str) -> String {
	let normalized = name.replace('\\', "/");
	let last = normalized
		.split('/')
		.filter(|part| !part.is_empty() && !matches!(*part, "." | ".."))
		.last()
		.unwrap_or_default();
	let safe: String = last
		.chars()
		.filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')'))
		.collect();
	let safe = safe.trim().trim_start_matches('.');
	if safe.is_empty() {
		"file".to_string()
	} else {
		safe.to_string()
	}
}

/// File name for a downloaded payload: the server's name, else the record's
/// name, with the record's extension appended when the name has none.
pub fn payload_name(server_name: Option<&str>, record_name: &str, extension: Option<&str>) -> String {
	let base = server_name
		.map(str::trim)
		.filter(|name| !name.is_empty())
		.unwrap_or(record_name);
	let ext = extension
		.map(|ext| ext.trim().trim_start_matches('.'))
		.filter(|ext| !ext.is_empty() && !ext.contains('/'));
	match ext {
		Some(ext) if !base.contains('.') => format!("{base}.{ext}"),
		_ => base.to_string(),
	}
}
