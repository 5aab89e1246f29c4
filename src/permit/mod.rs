//! Off-chain approvals: EIP-2612 `permit` and the Dai-style `permit`.

use ethers_core::types::{transaction::eip712::EIP712Domain, Address, U256};
use ethers_providers::Middleware;

use crate::contracts::{self, ContractError};
use crate::types::SignatureError;

mod dai;
pub use dai::*;

mod erc2612;
pub use erc2612::*;

/// Domain version used when none is given or advertised
pub const DEFAULT_PERMIT_VERSION: &str = "1";

/// A token to build a permit for: either its address, from which the domain
/// is derived on-chain, or a fully specified domain.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenOrDomain {
    /// Token address. Name and chain id are fetched.
    Address(Address),
    /// Explicit domain. Must carry a `verifying_contract`.
    Domain(EIP712Domain),
}

impl From<Address> for TokenOrDomain {
    fn from(token: Address) -> Self {
        Self::Address(token)
    }
}

impl From<EIP712Domain> for TokenOrDomain {
    fn from(domain: EIP712Domain) -> Self {
        Self::Domain(domain)
    }
}

impl TokenOrDomain {
    /// The token contract: the address itself, or the domain's verifying
    /// contract
    pub fn token_address(&self) -> Result<Address, PermitError> {
        match self {
            Self::Address(token) => Ok(*token),
            Self::Domain(domain) => domain
                .verifying_contract
                .ok_or(PermitError::MissingVerifyingContract),
        }
    }
}

/// Permit error
#[derive(Debug, thiserror::Error)]
pub enum PermitError {
    /// Reading from the token failed
    #[error("{0}")]
    Contract(#[from] ContractError),
    /// An explicit domain without a token address
    #[error("Permit domain has no verifying contract")]
    MissingVerifyingContract,
    /// Signer errored
    #[error("{0}")]
    SignerError(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// Signer produced an unusable signature
    #[error("{0}")]
    Signature(#[from] SignatureError),
    /// The typed data could not be converted to JSON
    #[error("{0}")]
    SerdeJson(#[from] serde_json::Error),
}

/// Resolve the signing domain of a token.
///
/// An explicit domain is returned unchanged. For an address, the token name
/// and (unless `chain_id` is given) the chain id are fetched concurrently; the
/// version defaults to `"1"`.
#[tracing::instrument(skip(client, token))]
pub async fn get_domain<M>(
    client: &M,
    token: &TokenOrDomain,
    version: Option<String>,
    chain_id: Option<U256>,
) -> Result<EIP712Domain, PermitError>
where
    M: Middleware,
    M::Error: 'static,
{
    let token = match token {
        TokenOrDomain::Domain(domain) => return Ok(domain.clone()),
        TokenOrDomain::Address(token) => *token,
    };

    let (name, chain_id) = match chain_id {
        Some(chain_id) => (contracts::token_name(client, token).await?, chain_id),
        None => futures_util::try_join!(
            contracts::token_name(client, token),
            contracts::chain_id(client)
        )?,
    };
    tracing::debug!(%token, name = name.as_str(), %chain_id, "Resolved permit domain");

    Ok(EIP712Domain {
        name: Some(name),
        version: Some(version.unwrap_or_else(|| DEFAULT_PERMIT_VERSION.to_owned())),
        chain_id: Some(chain_id),
        verifying_contract: Some(token),
        salt: None,
    })
}

async fn nonce_or_fetch<M>(
    client: &M,
    nonce: Option<U256>,
    token: Address,
    owner: Address,
) -> Result<U256, PermitError>
where
    M: Middleware,
    M::Error: 'static,
{
    match nonce {
        Some(nonce) => Ok(nonce),
        None => Ok(contracts::token_nonce(client, token, owner).await?),
    }
}
