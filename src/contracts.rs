//! Read-only contract calls the payload builders depend on.
//!
//! Calls are ABI-encoded from human-readable signatures and executed with
//! `eth_call` through whatever [`Middleware`] the caller provides.

use ethers_core::{
    abi::{self, Abi, Function, Token},
    types::{transaction::eip2718::TypedTransaction, Address, TransactionRequest, U256},
};
use ethers_providers::Middleware;
use once_cell::sync::Lazy;

static ERC20_PERMIT_ABI: Lazy<Abi> = Lazy::new(|| {
    abi::parse_abi(&[
        "function name() external view returns (string)",
        "function nonces(address) external view returns (uint256)",
        "function EIP712_VERSION() external view returns (string)",
        "function version() external view returns (string)",
    ])
    .expect("!erc20 permit abi")
});

static GELATO_RELAY_ABI: Lazy<Abi> = Lazy::new(|| {
    abi::parse_abi(&["function userNonce(address) external view returns (uint256)"])
        .expect("!gelato relay abi")
});

/// Contract call error
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The middleware failed the call
    #[error("Middleware error: {0}")]
    Middleware(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// Encoding the call or decoding its output failed
    #[error("{0}")]
    Abi(#[from] abi::Error),
    /// Output decoded, but to the wrong shape
    #[error("Unexpected output from {0}()")]
    UnexpectedOutput(&'static str),
}

async fn read<M>(
    client: &M,
    to: Address,
    abi: &Abi,
    name: &'static str,
    args: &[Token],
) -> Result<Token, ContractError>
where
    M: Middleware,
    M::Error: 'static,
{
    let function: &Function = abi.function(name)?;
    let data = function.encode_input(args)?;
    let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();

    let output = client
        .call(&tx, None)
        .await
        .map_err(|e| ContractError::Middleware(Box::new(e)))?;

    function
        .decode_output(&output)?
        .into_iter()
        .next()
        .ok_or(ContractError::UnexpectedOutput(name))
}

/// `name()` of an ERC-20 token
pub async fn token_name<M>(client: &M, token: Address) -> Result<String, ContractError>
where
    M: Middleware,
    M::Error: 'static,
{
    read(client, token, &ERC20_PERMIT_ABI, "name", &[])
        .await?
        .into_string()
        .ok_or(ContractError::UnexpectedOutput("name"))
}

/// `nonces(owner)` of an EIP-2612 or Dai token
pub async fn token_nonce<M>(
    client: &M,
    token: Address,
    owner: Address,
) -> Result<U256, ContractError>
where
    M: Middleware,
    M::Error: 'static,
{
    read(client, token, &ERC20_PERMIT_ABI, "nonces", &[Token::Address(owner)])
        .await?
        .into_uint()
        .ok_or(ContractError::UnexpectedOutput("nonces"))
}

/// The EIP-712 domain version a token advertises: `EIP712_VERSION()`, then
/// `version()`. `None` when the token exposes neither.
pub async fn eip712_version<M>(client: &M, token: Address) -> Option<String>
where
    M: Middleware,
    M::Error: 'static,
{
    for name in ["EIP712_VERSION", "version"] {
        match read(client, token, &ERC20_PERMIT_ABI, name, &[]).await {
            Ok(Token::String(version)) => return Some(version),
            Ok(_) => tracing::debug!(%token, function = name, "Non-string version output"),
            Err(error) => tracing::debug!(%token, function = name, %error, "Version lookup failed"),
        }
    }
    None
}

/// `userNonce(user)` of a Gelato ERC-2771 relay contract
pub async fn relay_user_nonce<M>(
    client: &M,
    relay: Address,
    user: Address,
) -> Result<U256, ContractError>
where
    M: Middleware,
    M::Error: 'static,
{
    read(client, relay, &GELATO_RELAY_ABI, "userNonce", &[Token::Address(user)])
        .await?
        .into_uint()
        .ok_or(ContractError::UnexpectedOutput("userNonce"))
}

/// The chain id reported by the middleware
pub async fn chain_id<M>(client: &M) -> Result<U256, ContractError>
where
    M: Middleware,
    M::Error: 'static,
{
    client
        .get_chainid()
        .await
        .map_err(|e| ContractError::Middleware(Box::new(e)))
}
