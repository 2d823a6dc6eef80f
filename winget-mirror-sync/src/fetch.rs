//! Artifact transport.
//!
//! [`Fetcher`] is the seam between the sync engine and the network: the
//! engine only ever asks for "the bytes at this URL, written to this path".
//! [`HttpFetcher`] is the production implementation; tests substitute an
//! in-memory one.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use thiserror::Error;

use winget_mirror_core::DownloadSettings;

/// A single failed transfer attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connect, TLS or read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {code}")]
    Status { code: u16 },

    /// The response body could not be written to disk.
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Io(_) => true,
            FetchError::Status { code } => *code == 408 || *code == 429 || *code >= 500,
        }
    }
}

/// Downloads the body at a URL into a local file.
pub trait Fetcher: Send + Sync {
    /// Write the body of `url` to `dest`, replacing any existing file.
    /// Returns the number of bytes written.
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Blocking HTTP(S) fetcher backed by a shared `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(settings: &DownloadSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(concat!("winget-mirror/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(FetchError::Status { code }),
            Err(ureq::Error::Transport(t)) => return Err(FetchError::Transport(t.to_string())),
        };
        let mut body = response.into_reader();
        let mut out = BufWriter::new(File::create(dest)?);
        let written = io::copy(&mut body, &mut out)
            .map_err(|e| FetchError::Transport(format!("reading response body: {e}")))?;
        out.flush()?;
        Ok(written)
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
    /// with the exponent capped at 8.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(8);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }
}

impl From<&DownloadSettings> for RetryPolicy {
    fn from(settings: &DownloadSettings) -> Self {
        Self {
            retries: settings.retries,
            base_delay: Duration::from_millis(settings.backoff_ms),
        }
    }
}

/// Failure after the retry budget is spent.
#[derive(Debug)]
pub struct FetchFailure {
    pub attempts: u32,
    pub error: FetchError,
}

/// Fetch `url` into `dest`, retrying retryable failures per `policy`.
pub fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &str,
    dest: &Path,
    policy: &RetryPolicy,
) -> Result<u64, FetchFailure> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetcher.fetch(url, dest) {
            Ok(bytes) => return Ok(bytes),
            Err(error) if error.is_retryable() && attempt <= policy.retries => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    "fetch {url} failed (attempt {attempt}): {error}; retrying in {}ms",
                    delay.as_millis()
                );
                sleep(delay);
            }
            Err(error) => {
                return Err(FetchFailure {
                    attempts: attempt,
                    error,
                })
            }
        }
    }
}
