use std::thread;

use attohttpc::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use log::{debug, warn};

use crate::config::NetworkSettings;
use crate::error::{Error, Result};

/// Browser identification sent with every request. The listing service
/// throttles or rejects clients that do not send one.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Anything able to turn a URL into bytes.
pub trait Fetch: Send + Sync {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP client with timeouts and bounded retry.
#[derive(Debug, Clone)]
pub struct HttpClient {
    settings: NetworkSettings,
}

enum Failure {
    Retryable(String),
    Fatal(String),
}

impl HttpClient {
    pub fn new(settings: NetworkSettings) -> Self {
        Self { settings }
    }

    fn attempt(&self, url: &str) -> std::result::Result<Vec<u8>, Failure> {
        let response = attohttpc::get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "application/json, image/*;q=0.9, */*;q=0.8")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .connect_timeout(self.settings.connect_timeout())
            .read_timeout(self.settings.read_timeout())
            .send()
            .map_err(|e| Failure::Retryable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {status}");
            return Err(if is_retryable_status(status.as_u16()) {
                Failure::Retryable(reason)
            } else {
                Failure::Fatal(reason)
            });
        }

        response
            .bytes()
            .map_err(|e| Failure::Retryable(e.to_string()))
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(NetworkSettings::default())
    }
}

impl Fetch for HttpClient {
    fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let attempts = self.settings.retries + 1;
        let mut attempt = 1;
        loop {
            debug!("GET {url} (attempt {attempt}/{attempts})");
            match self.attempt(url) {
                Ok(bytes) => return Ok(bytes),
                Err(Failure::Fatal(reason)) => return Err(Error::network(url, reason)),
                Err(Failure::Retryable(reason)) if attempt < attempts => {
                    warn!("Request to {url} failed ({reason}), retrying");
                    thread::sleep(self.settings.backoff() * attempt);
                    attempt += 1;
                }
                Err(Failure::Retryable(reason)) => return Err(Error::network(url, reason)),
            }
        }
    }
}

fn is_retryable_status(code: u16) -> bool {
    code == 429 || (500..600).contains(&code)
}

/// True for `http://` and `https://` inputs.
pub fn is_remote(input: &str) -> bool {
    let lower = input.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
