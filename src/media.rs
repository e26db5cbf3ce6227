use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;

const IMAGE_SUBDIR: &str = "chat_images";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported image type")]
    Unsupported,
    #[error("empty image")]
    Empty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Uploaded chat images on local disk, served back under a URL prefix.
#[derive(Debug, Clone)]
pub struct Media {
    dir: PathBuf,
    url: String,
}

impl Media {
    pub fn new(dir: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url: url.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.media_dir, &config.media_url)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `bytes` under a fresh name and returns the URL it is reachable at.
    pub async fn save_image(
        &self,
        content_type: Option<&str>,
        file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        let ext = image_extension(content_type, file_name).ok_or(MediaError::Unsupported)?;

        let dir = self.dir.join(IMAGE_SUBDIR);
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{ext}", Uuid::now_v7().simple());
        tokio::fs::write(dir.join(&name), bytes).await?;
        info!(%name, size = bytes.len(), "image stored");

        Ok(format!("{}/{IMAGE_SUBDIR}/{name}", self.url))
    }
}

fn image_extension(content_type: Option<&str>, file_name: Option<&str>) -> Option<&'static str> {
    let by_type = match content_type.map(|mime| mime.trim().to_ascii_lowercase()).as_deref() {
        Some("image/jpeg" | "image/jpg") => Some("jpg"),
        Some("image/png") => Some("png"),
        Some("image/gif") => Some("gif"),
        Some("image/webp") => Some("webp"),
        Some(mime) if mime != "application/octet-stream" => return None,
        _ => None,
    };

    by_type.or_else(|| {
        let ext = Path::new(file_name?).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some("jpg"),
            "png" => Some("png"),
            "gif" => Some("gif"),
            "webp" => Some("webp"),
            _ => None,
        }
    })
}
