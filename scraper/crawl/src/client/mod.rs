use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36 Edg/133.0.0.0";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client")]
    Build(#[source] reqwest::Error),
    #[error("invalid header value {value:?}")]
    InvalidHeader { value: String },
    #[error("GET {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Sent as the referer on every request.
    pub referer: String,
    /// Minimum pause between the end of one request and the start of the next.
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            referer: "https://www.ola.org".to_string(),
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct ScrapingClient {
    client: Client,
    throttle: Throttle,
}

impl ScrapingClient {
    pub fn new(options: ClientOptions) -> Result<Self, FetchError> {
        let client = Client::builder()
            .default_headers(headers(&options.referer)?)
            .timeout(options.timeout)
            .build()
            .map_err(FetchError::Build)?;

        Ok(ScrapingClient {
            client,
            throttle: Throttle::new(options.delay),
        })
    }

    /// Fetches `url` and returns the body, treating any non-success status as an error.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.throttle
            .run(async {
                tracing::debug!(url, "fetching");
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|source| FetchError::Transport {
                        url: url.to_string(),
                        source,
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status,
                    });
                }

                response.text().await.map_err(|source| FetchError::Transport {
                    url: url.to_string(),
                    source,
                })
            })
            .await
    }
}

fn headers(referer: &str) -> Result<header::HeaderMap, FetchError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::USER_AGENT, header::HeaderValue::from_static(USER_AGENT));
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"));
    headers.insert(header::ACCEPT_LANGUAGE, header::HeaderValue::from_static("en-CA,en;q=0.9"));
    headers.insert(header::CONNECTION, header::HeaderValue::from_static("keep-alive"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, header::HeaderValue::from_static("1"));
    let referer_value = header::HeaderValue::from_str(referer).map_err(|_| FetchError::InvalidHeader {
        value: referer.to_string(),
    })?;
    headers.insert(header::REFERER, referer_value);

    Ok(headers)
}

/// Serializes requests and keeps a fixed pause between them.
pub struct Throttle {
    delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(delay: Duration) -> Self {
        Throttle {
            delay,
            last: Mutex::new(None),
        }
    }

    pub async fn run<F, T>(&self, request: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            tokio::time::sleep_until(previous + self.delay).await;
        }

        let output = request.await;
        *last = Some(Instant::now());
        output
    }
}
