// src/source/mod.rs
pub mod parser;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;

use crate::error::FetchError;

#[async_trait]
pub trait NoticeSource: Send + Sync {
    /// Fetch the raw listing markup. Non-success status is an error.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    fn name(&self) -> &'static str;
}

/// Single GET per call, transport defaults, no retry.
#[derive(Clone, Default)]
pub struct HttpNoticeSource {
    client: Client,
}

impl HttpNoticeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NoticeSource for HttpNoticeSource {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resp = match self.client.get(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                counter!("relay_fetch_errors_total").increment(1);
                return Err(FetchError::Transport(e));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            counter!("relay_fetch_errors_total").increment(1);
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        resp.text().await.map_err(|e| {
            counter!("relay_fetch_errors_total").increment(1);
            FetchError::Transport(e)
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
