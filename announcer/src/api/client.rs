use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::engine::announcement::{Announcement, PublishedEnvelope};

/// Why the published-announcement list could not be loaded.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("backend reported failure")]
    Rejected,
}

/// Where published announcements come from.
pub trait AnnouncementSource: Send + Sync + 'static {
    fn fetch_published(
        &self,
    ) -> impl Future<Output = Result<Vec<Announcement>, FetchError>> + Send;
}

/// Fetches the published list from the REST backend.
pub struct HttpAnnouncementSource {
    client: reqwest::Client,
    url: String,
    timeout: Option<Duration>,
}

impl HttpAnnouncementSource {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AnnouncementSource for HttpAnnouncementSource {
    async fn fetch_published(&self) -> Result<Vec<Announcement>, FetchError> {
        let mut request = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::USER_AGENT, "announcer/0.1");
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let resp = request.send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let envelope = resp.json::<PublishedEnvelope>().await.map_err(classify)?;
        let announcements = envelope.into_announcements().ok_or(FetchError::Rejected)?;
        debug!(url = %self.url, count = announcements.len(), "published announcements fetched");
        Ok(announcements)
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_decode() {
        FetchError::Decode(e)
    } else {
        FetchError::Http(e)
    }
}

/// A fixed list, for hosts that already hold the announcements and for tests.
pub struct StaticSource {
    announcements: Vec<Announcement>,
}

impl StaticSource {
    pub fn new(announcements: Vec<Announcement>) -> Self {
        Self { announcements }
    }
}

impl AnnouncementSource for StaticSource {
    async fn fetch_published(&self) -> Result<Vec<Announcement>, FetchError> {
        Ok(self.announcements.clone())
    }
}
