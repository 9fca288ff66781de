//! Remote HTTP(S) source backend.
//!
//! Sizes come from `HEAD` requests; byte windows come from single-range
//! `GET` requests. Servers that ignore `Range` are treated as errors rather
//! than silently downloading whole files.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use tracing::debug;
use url::Url;

use super::{MediaSource, SourceError, SourceResult};

/// Timeout applied to each remote request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [`MediaSource`] over a remote HTTP(S) URL.
pub struct HttpFileSource {
    client: reqwest::Client,
    url: Url,
    locator: String,
}

impl HttpFileSource {
    /// Creates a source over `url`.
    ///
    /// # Errors
    /// - `SourceError::Http` - URL is not parsable or client construction
    ///   failed
    pub fn new(url: &str) -> SourceResult<Self> {
        let parsed = Url::parse(url).map_err(|e| SourceError::Http {
            url: url.to_string(),
            reason: format!("invalid URL: {e}"),
        })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Http {
                url: url.to_string(),
                reason: format!("client construction failed: {e}"),
            })?;

        Ok(Self {
            client,
            url: parsed,
            locator: url.to_string(),
        })
    }

    fn http_error(&self, reason: impl Into<String>) -> SourceError {
        SourceError::Http {
            url: self.locator.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MediaSource for HttpFileSource {
    fn locator(&self) -> &str {
        &self.locator
    }

    async fn exists(&self) -> bool {
        self.client
            .head(self.url.clone())
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    async fn file_size(&self) -> SourceResult<u64> {
        let response = self
            .client
            .head(self.url.clone())
            .send()
            .await
            .map_err(|e| self.http_error(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                locator: self.locator.clone(),
            });
        }
        if !response.status().is_success() {
            return Err(self.http_error(format!("HEAD returned {}", response.status())));
        }

        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| self.http_error("missing or invalid Content-Length"))
    }

    async fn read_range(&self, range: Range<u64>) -> SourceResult<Vec<u8>> {
        if range.start >= range.end {
            return Err(SourceError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }

        debug!(
            "Fetching bytes {}..{} from {}",
            range.start, range.end, self.locator
        );

        let response = self
            .client
            .get(self.url.clone())
            .header(RANGE, format!("bytes={}-{}", range.start, range.end - 1))
            .send()
            .await
            .map_err(|e| self.http_error(e.to_string()))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {}
            StatusCode::RANGE_NOT_SATISFIABLE => {
                let size = self.file_size().await.unwrap_or(0);
                return Err(SourceError::RangeExceedsSource {
                    start: range.start,
                    end: range.end,
                    size,
                });
            }
            status => {
                return Err(self.http_error(format!("range request returned {status}")));
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.http_error(e.to_string()))?;

        let expected = (range.end - range.start) as usize;
        if body.len() != expected {
            return Err(self.http_error(format!(
                "range response had {} bytes, expected {expected}",
                body.len()
            )));
        }

        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(matches!(
            HttpFileSource::new("not a url"),
            Err(SourceError::Http { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_range_is_rejected_before_any_request() {
        let source = HttpFileSource::new("https://media.example/movie.mkv").unwrap();
        assert!(matches!(
            source.read_range(9..9).await,
            Err(SourceError::InvalidRange { .. })
        ));
    }
}
