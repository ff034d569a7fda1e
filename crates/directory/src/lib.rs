//! Pharmacy directory client.
//!
//! The directory service is a single HTTP endpoint returning every pharmacy
//! record as a JSON array; there is no pagination, no auth, and no server-side
//! filtering. Caller identification is a linear scan over the fetched records
//! with exact string equality on the phone number: `"555-0001"` and
//! `"5550001"` are different callers, and the first match wins.

use std::time::Duration;

use async_trait::async_trait;
use pharmline_core::config::DirectoryConfig;
use pharmline_core::Pharmacy;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory client could not be constructed: {0}")]
    Build(#[source] reqwest::Error),
    #[error("directory request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("directory returned status {status}")]
    Status { status: u16 },
    #[error("directory response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Seam for caller lookup so the session can be exercised without a network.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Pharmacy>, DirectoryError>;
}

#[derive(Clone, Debug)]
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    pub fn new(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(DirectoryError::Build)?;

        Ok(Self { client, base_url: config.base_url.clone() })
    }

    /// Fetches every pharmacy record the directory knows about.
    pub async fn fetch_all(&self) -> Result<Vec<Pharmacy>, DirectoryError> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await
            .map_err(DirectoryError::Request)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status { status: status.as_u16() });
        }

        response.json::<Vec<Pharmacy>>().await.map_err(DirectoryError::Decode)
    }
}

#[async_trait]
impl DirectoryLookup for DirectoryClient {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Pharmacy>, DirectoryError> {
        let records = self.fetch_all().await?;
        let matched = match_phone(&records, phone).cloned();

        match &matched {
            Some(pharmacy) => info!(
                event_name = "directory.lookup.hit",
                pharmacy_name = %pharmacy.name,
                "caller found in directory"
            ),
            None => info!(
                event_name = "directory.lookup.miss",
                caller_phone = %phone,
                "caller not found in directory"
            ),
        }

        Ok(matched)
    }
}

/// Exact-equality scan; first match wins, no phone normalization.
pub fn match_phone<'a>(records: &'a [Pharmacy], phone: &str) -> Option<&'a Pharmacy> {
    records.iter().find(|record| record.phone == phone)
}
