// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! HTTP transfer layer
//!
//! [`Transfer`] performs a single attempt; retrying and resume-offset
//! decisions belong to the fetcher. [`HttpTransfer`] streams response
//! bodies straight to disk with `reqwest`.

use crate::error::TransferError;
use crate::progress::ProgressReporter;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// One download attempt
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// Absolute URL
    pub url: &'a str,
    /// File to write
    pub dest: &'a Path,
    /// Resume from this byte offset with a range request
    pub resume_from: Option<u64>,
    /// Bearer token, anonymous when `None`
    pub bearer: Option<&'a SecretString>,
    /// Repository-relative path, for progress events
    pub display_path: &'a str,
    /// Full size when known from a stub, for progress events
    pub expected_size: Option<u64>,
}

/// Successful end of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body written; `resumed` when appended after a `206`
    Downloaded { bytes: u64, resumed: bool },
    /// Server answered `416` to a resumed request, the file is complete
    AlreadyComplete,
}

/// Status of an anonymous access probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStatus(pub u16);

impl ProbeStatus {
    /// 2xx
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// 401 or 403
    pub fn is_unauthorized(self) -> bool {
        matches!(self.0, 401 | 403)
    }

    /// 404
    pub fn is_not_found(self) -> bool {
        self.0 == 404
    }
}

/// HTTP operations used by the engine
#[async_trait]
pub trait Transfer: Send + Sync {
    /// One GET attempt writing the body to `request.dest`
    async fn fetch(
        &self,
        request: &FetchRequest<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<FetchOutcome, TransferError>;

    /// Anonymous GET with its own timeout, returning only the status
    async fn probe(&self, url: &str, timeout: Duration) -> Result<ProbeStatus, TransferError>;
}

/// `reqwest` implementation of [`Transfer`]
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    /// Builds a client with the lfsync user agent
    pub fn new() -> Result<Self, TransferError> {
        let client = Client::builder()
            .user_agent(concat!("lfsync/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransferError::request("<client>", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(
        &self,
        request: &FetchRequest<'_>,
        progress: &dyn ProgressReporter,
    ) -> Result<FetchOutcome, TransferError> {
        let url = request.url;
        let mut builder = self.client.get(url);
        if let Some(token) = request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(offset) = request.resume_from {
            builder = builder.header(RANGE, format!("bytes={}-", offset));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransferError::request(url, e))?;
        let status = response.status();
        debug!(url, status = status.as_u16(), offset = ?request.resume_from, "Response received");

        let start = match (status, request.resume_from) {
            (StatusCode::PARTIAL_CONTENT, Some(offset)) => offset,
            (StatusCode::RANGE_NOT_SATISFIABLE, Some(_)) => {
                return Ok(FetchOutcome::AlreadyComplete);
            }
            (s, _) if s.is_success() => 0,
            (s, _) => {
                return Err(TransferError::Status {
                    url: url.to_string(),
                    status: s.as_u16(),
                });
            }
        };
        let resumed = start > 0;

        let total = response
            .content_length()
            .map(|len| len + start)
            .or(request.expected_size);
        progress.transfer_started(request.display_path, start, total);

        let mut file = if resumed {
            OpenOptions::new().append(true).open(request.dest).await?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(request.dest)
                .await?
        };

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| TransferError::request(url, e))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress.transfer_progress(chunk.len() as u64);
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok(FetchOutcome::Downloaded {
            bytes: written,
            resumed,
        })
    }

    async fn probe(&self, url: &str, timeout: Duration) -> Result<ProbeStatus, TransferError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| TransferError::request(url, e))?;
        Ok(ProbeStatus(response.status().as_u16()))
    }
}
