//!
//! HTTP client for the explorer's paginated address endpoint.
//!
//! The client issues exactly one request per call and never retries. Pacing between
//! calls belongs to the caller.

use super::types::*;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, error};

/// Source of paginated address history.
///
/// The sync orchestrator only talks to this trait, which lets it run against the
/// real explorer or against an in-memory ledger in tests.
#[async_trait]
pub trait LedgerSource: Send + Sync {
	/// Fetch one page of history for `address`, starting at `offset`.
	async fn fetch_page(
		&self,
		address: &str,
		offset: u64,
		limit: u32,
	) -> Result<AddressPage, ExplorerError>;
}

/// Explorer REST client
#[derive(Clone)]
pub struct ExplorerClient {
	/// The underlying HTTP client, configured with a request timeout.
	http_client: Client,
	/// Base URL of the explorer, e.g. `https://blockchain.info`.
	base_url: Url,
}

impl ExplorerClient {
	/// Create a new explorer client.
	///
	/// # Arguments
	/// * `base_url` - Root URL of the explorer API.
	/// * `request_timeout` - Upper bound for every request, connect and body included.
	///
	/// # Returns
	/// A new `ExplorerClient`, or an `ExplorerError` if the URL or HTTP client is invalid.
	pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, ExplorerError> {
		let base_url = Url::parse(base_url).map_err(|e| {
			ExplorerError::InvalidRequest(format!("Invalid explorer URL {}: {}", base_url, e))
		})?;

		if base_url.cannot_be_a_base() {
			return Err(ExplorerError::InvalidRequest(format!(
				"Explorer URL {} cannot be used as a base",
				base_url
			)));
		}

		let http_client = Client::builder().timeout(request_timeout).build()?;

		Ok(Self {
			http_client,
			base_url,
		})
	}

	/// Build the page URL: `{base}/rawaddr/{address}?limit=..&offset=..&cors=true`.
	pub fn page_url(&self, address: &str, offset: u64, limit: u32) -> Result<Url, ExplorerError> {
		let mut url = self.base_url.clone();
		url.path_segments_mut()
			.map_err(|_| {
				ExplorerError::InvalidRequest("Explorer URL cannot be a base".to_string())
			})?
			.pop_if_empty()
			.push("rawaddr")
			.push(address);
		url.query_pairs_mut()
			.append_pair("limit", &limit.to_string())
			.append_pair("offset", &offset.to_string())
			.append_pair("cors", "true");
		Ok(url)
	}
}

#[async_trait]
impl LedgerSource for ExplorerClient {
	async fn fetch_page(
		&self,
		address: &str,
		offset: u64,
		limit: u32,
	) -> Result<AddressPage, ExplorerError> {
		if address.is_empty() {
			return Err(ExplorerError::InvalidRequest(
				"Address must not be empty".to_string(),
			));
		}
		if limit == 0 {
			return Err(ExplorerError::InvalidRequest(
				"Page limit must be positive".to_string(),
			));
		}

		let url = self.page_url(address, offset, limit)?;
		debug!("Fetching {} (offset {}, limit {})", address, offset, limit);

		let response = self.http_client.get(url).send().await?;

		let status = response.status();
		if !status.is_success() {
			error!("Explorer returned {} for address {}", status, address);
			return Err(ExplorerError::StatusError {
				address: address.to_string(),
				status,
			});
		}

		let body = response.bytes().await?;
		let page: AddressPage = serde_json::from_slice(&body).map_err(|e| {
			error!("Failed to parse explorer response for {}: {}", address, e);
			ExplorerError::JsonError(e)
		})?;

		debug!(
			"Received {} records for {} (explorer reports {} total)",
			page.len(),
			address,
			page.total_count
		);
		Ok(page)
	}
}
