use image::RgbImage;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Where a request's image lives. Built once from the raw `file_path` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    RemoteUrl(Url),
    LocalPath(PathBuf),
}

impl ImageReference {
    /// Anything that parses as an `http`/`https` URL is fetched remotely;
    /// everything else is treated as a filesystem path.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => ImageReference::RemoteUrl(url),
            _ => ImageReference::LocalPath(PathBuf::from(raw)),
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageReference::RemoteUrl(url) => write!(f, "{}", url),
            ImageReference::LocalPath(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Decoded 8-bit RGB pixel buffer, owned for the duration of one request.
#[derive(Debug, Clone)]
pub struct DecodedImage(RgbImage);

impl DecodedImage {
    pub fn from_rgb(image: RgbImage) -> Self {
        Self(image)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, image::ImageError> {
        image::load_from_memory(bytes).map(|img| Self(img.to_rgb8()))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.0
    }
}

/// Display strings are returned to clients as-is; the fields carry the
/// diagnostics that only go to the server log.
#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Failed to fetch image from URL")]
    Fetch { url: String, reason: String },
    #[error("Image not found or invalid file path")]
    Decode { reference: String, reason: String },
}

#[derive(Clone)]
pub struct ImageAcquirer {
    client: reqwest::Client,
}

impl ImageAcquirer {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn acquire(&self, reference: &ImageReference) -> Result<DecodedImage, AcquisitionError> {
        let bytes = match reference {
            ImageReference::RemoteUrl(url) => self.fetch(url).await?,
            ImageReference::LocalPath(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|e| AcquisitionError::Decode {
                        reference: path.display().to_string(),
                        reason: e.to_string(),
                    })?
            }
        };

        let image = DecodedImage::from_bytes(&bytes).map_err(|e| AcquisitionError::Decode {
            reference: reference.to_string(),
            reason: e.to_string(),
        })?;
        log::debug!(
            "Decoded {} into {}x{} image",
            reference,
            image.width(),
            image.height()
        );
        Ok(image)
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>, AcquisitionError> {
        let fetch_error = |reason: String| AcquisitionError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(format!("status {}", status)));
        }

        let body = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(body.to_vec())
    }
}
