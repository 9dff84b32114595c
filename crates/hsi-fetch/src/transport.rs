//! Byte transports used by the fetcher.

use std::io::{self, Write};
use std::time::Duration;

use hsi_core::HttpConfig;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::debug;

/// Failure of a single transfer attempt.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// Copies the resource at `url` into `sink`, returning the byte count.
pub trait Transport {
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError>;
}

/// Blocking HTTP transport backed by an owned `reqwest` client.
pub struct HttpTransport {
    client: Client,
    show_progress: bool,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| TransportError::Other(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            show_progress: config.show_progress,
        })
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
                ) {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        }
    }
}

impl Transport for HttpTransport {
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, TransportError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let pb = self.progress_bar(response.content_length());
        let mut reader = pb.wrap_read(response);
        let written = io::copy(&mut reader, sink)?;
        pb.finish_and_clear();

        debug!("Received {written} bytes from {url}");
        Ok(written)
    }
}
