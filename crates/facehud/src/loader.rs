//! Reference image acquisition: HTTP fetch for URLs, filesystem for paths.
//!
//! Runs only on the startup path (gallery build), on a blocking thread.

use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;

use facehud_core::gallery::{ImageLoadError, ImageLoader, ImageSource};

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

pub struct HttpImageLoader {
    client: reqwest::blocking::Client,
}

impl HttpImageLoader {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }

    fn fetch_url(&self, url: &str) -> Result<RgbImage, String> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let bytes = response.bytes().map_err(|e| e.to_string())?;
        image::load_from_memory(&bytes)
            .map(|img| img.to_rgb8())
            .map_err(|e| format!("decode failed: {e}"))
    }
}

impl ImageLoader for HttpImageLoader {
    fn load(&self, source: &ImageSource) -> Result<RgbImage, ImageLoadError> {
        let result = match source {
            ImageSource::Url(url) => self.fetch_url(url),
            ImageSource::Path(path) => image::open(path)
                .map(|img| img.to_rgb8())
                .map_err(|e| e.to_string()),
        };

        result.map_err(|reason| ImageLoadError { uri: source.to_string(), reason })
    }
}
