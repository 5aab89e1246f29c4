use ethers_core::{
    abi::Token,
    types::{
        transaction::eip712::{EIP712Domain, TypedData},
        Address, U256,
    },
};
use ethers_providers::Middleware;
use serde::{Deserialize, Serialize};

use super::{get_domain, nonce_or_fetch, PermitError, TokenOrDomain};
use crate::{contracts, Eip712Payload, SignedPermit, TypedMessage, MAX_INT};

/// EIP-2612 `Permit` message
///
/// <https://eips.ethereum.org/EIPS/eip-2612>
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Erc2612PermitMessage {
    /// Token holder granting the allowance
    pub owner: Address,
    /// Account allowed to spend
    pub spender: Address,
    /// Allowance
    pub value: U256,
    /// Owner's current permit nonce on the token
    pub nonce: U256,
    /// Timestamp after which the permit is invalid
    pub deadline: U256,
}

impl TypedMessage for Erc2612PermitMessage {
    const PRIMARY_TYPE: &'static str = "Permit";

    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("owner", "address"),
        ("spender", "address"),
        ("value", "uint256"),
        ("nonce", "uint256"),
        ("deadline", "uint256"),
    ];

    fn encode_values(&self) -> Vec<Token> {
        vec![
            Token::Address(self.owner),
            Token::Address(self.spender),
            Token::Uint(self.value),
            Token::Uint(self.nonce),
            Token::Uint(self.deadline),
        ]
    }
}

/// An EIP-2612 permit ready to be signed
pub type Erc20PermitToSign = Eip712Payload<Erc2612PermitMessage>;

/// Optional inputs of an EIP-2612 permit. Unset values are defaulted or
/// fetched from the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermitOptions {
    /// Allowance. Defaults to `MAX_INT`
    pub value: Option<U256>,
    /// Deadline. Defaults to `MAX_INT`
    pub deadline: Option<U256>,
    /// Nonce. Fetched with `nonces(owner)` if unset
    pub nonce: Option<U256>,
    /// Domain version. Fetched from the token if unset, falling back to `"1"`
    pub version: Option<String>,
    /// Domain chain id. Fetched from the middleware if unset
    pub chain_id: Option<U256>,
}

impl PermitOptions {
    /// Set `value`
    pub fn value(mut self, val: impl Into<U256>) -> Self {
        self.value = Some(val.into());
        self
    }

    /// Set `deadline`
    pub fn deadline(mut self, val: impl Into<U256>) -> Self {
        self.deadline = Some(val.into());
        self
    }

    /// Set `nonce`
    pub fn nonce(mut self, val: impl Into<U256>) -> Self {
        self.nonce = Some(val.into());
        self
    }

    /// Set `version`
    pub fn version(mut self, val: impl Into<String>) -> Self {
        self.version = Some(val.into());
        self
    }

    /// Set `chain_id`
    pub fn chain_id(mut self, val: impl Into<U256>) -> Self {
        self.chain_id = Some(val.into());
        self
    }
}

/// Full `eth_signTypedData_v4` document for an EIP-2612 permit
pub fn create_typed_erc2612_data(
    message: &Erc2612PermitMessage,
    domain: &EIP712Domain,
) -> Result<TypedData, serde_json::Error> {
    Eip712Payload::new(domain.clone(), message.clone()).to_typed_data()
}

/// Build the EIP-2612 permit `owner` signs to let `spender` move `value` of
/// `token`.
#[tracing::instrument(skip(client, token, options), fields(token_address))]
pub async fn get_erc2612_permit_type_data<M>(
    client: &M,
    token: impl Into<TokenOrDomain>,
    owner: Address,
    spender: Address,
    options: PermitOptions,
) -> Result<Erc20PermitToSign, PermitError>
where
    M: Middleware,
    M::Error: 'static,
{
    let token = token.into();
    let token_address = token.token_address()?;
    tracing::Span::current().record("token_address", tracing::field::display(token_address));

    let nonce = nonce_or_fetch(client, options.nonce, token_address, owner).await?;

    let version = match (options.version, &token) {
        (Some(version), _) => Some(version),
        (None, TokenOrDomain::Address(token)) => contracts::eip712_version(client, *token).await,
        (None, TokenOrDomain::Domain(_)) => None,
    };

    let domain = get_domain(client, &token, version, options.chain_id).await?;

    let message = Erc2612PermitMessage {
        owner,
        spender,
        value: options.value.unwrap_or(MAX_INT),
        nonce,
        deadline: options.deadline.unwrap_or(MAX_INT),
    };

    Ok(Eip712Payload::new(domain, message))
}

/// Build and sign an EIP-2612 permit. The signer is the owner.
pub async fn sign_erc2612_permit<M, S>(
    client: &M,
    signer: &S,
    token: impl Into<TokenOrDomain>,
    spender: Address,
    options: PermitOptions,
) -> Result<SignedPermit<Erc2612PermitMessage>, PermitError>
where
    M: Middleware,
    M::Error: 'static,
    S: ethers_signers::Signer,
    S::Error: 'static,
{
    let payload =
        get_erc2612_permit_type_data(client, token, signer.address(), spender, options).await?;

    let signature = signer
        .sign_typed_data(&payload)
        .await
        .map_err(|e| PermitError::SignerError(Box::new(e)))?;

    Ok(SignedPermit {
        message: payload.value,
        signature: signature.try_into()?,
    })
}
