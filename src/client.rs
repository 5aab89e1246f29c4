/// Re-export reqwest for convenience
pub use reqwest;
use reqwest::{IntoUrl, Url};

use ethers_core::types::H256;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::rpc;

static DEFAULT_URL: Lazy<Url> = Lazy::new(|| {
    "https://relay.gelato.digital/"
        .parse()
        .expect("!default relay url")
});

/// Relay client error
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Reqwest
    #[error("{0}")]
    Reqwest(#[from] reqwest::Error),
    /// Response did not parse
    #[error("{0}")]
    SerdeJson(#[from] serde_json::Error),
    /// Bad url
    #[error("{0}")]
    Url(#[from] url::ParseError),
    /// Relay answered with an error message
    #[error("Relay error: {0}")]
    Other(String),
}

/// Gelato answers either the expected body or `{ "message": ... }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiResult<T> {
    Ok(T),
    Err { message: String },
}

impl<T> ApiResult<T> {
    fn into_result(self) -> Result<T, ClientError> {
        match self {
            Self::Ok(t) => Ok(t),
            Self::Err { message } => Err(ClientError::Other(message)),
        }
    }
}

/// A Gelato Relay Client
#[derive(Debug, Clone)]
pub struct RelayClient {
    url: Url,
    client: reqwest::Client,
}

impl Default for RelayClient {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.clone(),
            client: Default::default(),
        }
    }
}

impl RelayClient {
    /// Instantiate a new client with a specific URL
    ///
    /// # Errors
    ///
    /// If the url param cannot be parsed as a URL
    pub fn new<S>(url: S) -> Result<Self, reqwest::Error>
    where
        S: IntoUrl,
    {
        Ok(Self {
            url: url.into_url()?,
            ..Default::default()
        })
    }

    /// Instantiate a new client with a specific URL and a reqwest Client
    ///
    /// # Errors
    ///
    /// If the url param cannot be parsed as a URL
    pub fn new_with_client<S>(url: S, client: reqwest::Client) -> Result<Self, url::ParseError>
    where
        S: AsRef<str>,
    {
        Ok(Self {
            url: url.as_ref().parse()?,
            client,
        })
    }

    /// The relay base URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    fn sponsored_call_erc2771_url(&self) -> Result<Url, ClientError> {
        Ok(self.url.join("relays/v2/sponsored-call-erc2771")?)
    }

    /// Submit a user-signed `SponsoredCallERC2771` request. The sponsor pays
    /// from its 1Balance, identified by `sponsor_api_key`.
    ///
    /// <https://docs.gelato.network/web3-services/relay/supported-methods/sponsoredcallerc2771>
    #[tracing::instrument(
        skip(self, sponsor_api_key),
        fields(chain_id = call.chain_id, target = ?call.target)
    )]
    pub async fn send_sponsored_call_erc2771(
        &self,
        call: &rpc::SignedSponsoredCall,
        sponsor_api_key: &str,
    ) -> Result<rpc::RelayResponse, ClientError> {
        let params = rpc::SponsoredCallRequest {
            call,
            sponsor_api_key,
        };
        let res = json_post!(
            self.client,
            self.sponsored_call_erc2771_url()?,
            &params,
            ApiResult<rpc::RelayResponse>
        )?
        .into_result()?;
        tracing::info!(task_id = ?res.task_id(), "Submitted sponsored call");
        Ok(res)
    }

    /// Check if a chain id is supported by Gelato API
    pub async fn is_chain_supported(&self, chain_id: u64) -> Result<bool, ClientError> {
        Ok(self.get_gelato_relay_chains().await?.contains(&chain_id))
    }

    fn relay_chains_url(&self) -> Result<Url, ClientError> {
        Ok(self.url.join("relays/v2")?)
    }

    /// Get a list of supported chains
    pub async fn get_gelato_relay_chains(&self) -> Result<Vec<u64>, ClientError> {
        Ok(json_get!(
            self.client,
            self.relay_chains_url()?,
            ApiResult<rpc::RelayChainsResponse>
        )?
        .into_result()?
        .relays())
    }

    fn get_task_status_url(&self, task_id: H256) -> Result<Url, ClientError> {
        Ok(self.url.join(&format!("tasks/status/{:?}", task_id))?)
    }

    /// Fetch the status of a task. `None` if the relay does not know it (yet)
    pub async fn get_task_status(
        &self,
        task_id: H256,
    ) -> Result<Option<rpc::TransactionStatus>, ClientError> {
        Ok(json_get!(
            self.client,
            self.get_task_status_url(task_id)?,
            rpc::TaskStatusResponse
        )?
        .into_status())
    }
}
