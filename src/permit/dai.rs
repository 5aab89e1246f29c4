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
use crate::{Eip712Payload, SignedPermit, TypedMessage, MAX_INT};

/// Dai-style `Permit` message. Approves either nothing or an unlimited
/// allowance, depending on `allowed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaiPermitMessage {
    /// Token holder
    pub holder: Address,
    /// Account allowed to spend
    pub spender: Address,
    /// Holder's current permit nonce on the token
    pub nonce: U256,
    /// Timestamp after which the permit is invalid. 0 means no expiry
    pub expiry: U256,
    /// Grant (`true`) or revoke (`false`) an unlimited allowance
    pub allowed: bool,
}

impl TypedMessage for DaiPermitMessage {
    const PRIMARY_TYPE: &'static str = "Permit";

    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("holder", "address"),
        ("spender", "address"),
        ("nonce", "uint256"),
        ("expiry", "uint256"),
        ("allowed", "bool"),
    ];

    fn encode_values(&self) -> Vec<Token> {
        vec![
            Token::Address(self.holder),
            Token::Address(self.spender),
            Token::Uint(self.nonce),
            Token::Uint(self.expiry),
            Token::Bool(self.allowed),
        ]
    }
}

/// Optional inputs of a Dai permit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaiPermitOptions {
    /// Expiry. Defaults to `MAX_INT`
    pub expiry: Option<U256>,
    /// Nonce. Fetched with `nonces(holder)` if unset
    pub nonce: Option<U256>,
    /// Domain version. Defaults to `"1"`
    pub version: Option<String>,
    /// Domain chain id. Fetched from the middleware if unset
    pub chain_id: Option<U256>,
    /// Grant or revoke. Defaults to `true`
    pub allowed: bool,
}

impl Default for DaiPermitOptions {
    fn default() -> Self {
        Self {
            expiry: None,
            nonce: None,
            version: None,
            chain_id: None,
            allowed: true,
        }
    }
}

impl DaiPermitOptions {
    /// Set `expiry`
    pub fn expiry(mut self, val: impl Into<U256>) -> Self {
        self.expiry = Some(val.into());
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

    /// Set `allowed`
    pub fn allowed(mut self, val: bool) -> Self {
        self.allowed = val;
        self
    }
}

/// Full `eth_signTypedData_v4` document for a Dai permit
pub fn create_typed_dai_data(
    message: &DaiPermitMessage,
    domain: &EIP712Domain,
) -> Result<TypedData, serde_json::Error> {
    Eip712Payload::new(domain.clone(), message.clone()).to_typed_data()
}

/// Build the Dai permit `holder` signs for `spender`
#[tracing::instrument(skip(client, token, options))]
pub async fn get_dai_permit_type_data<M>(
    client: &M,
    token: impl Into<TokenOrDomain>,
    holder: Address,
    spender: Address,
    options: DaiPermitOptions,
) -> Result<Eip712Payload<DaiPermitMessage>, PermitError>
where
    M: Middleware,
    M::Error: 'static,
{
    let token = token.into();
    let nonce = nonce_or_fetch(client, options.nonce, token.token_address()?, holder).await?;
    let domain = get_domain(client, &token, options.version, options.chain_id).await?;

    let message = DaiPermitMessage {
        holder,
        spender,
        nonce,
        expiry: options.expiry.unwrap_or(MAX_INT),
        allowed: options.allowed,
    };

    Ok(Eip712Payload::new(domain, message))
}

/// Build and sign a Dai permit. The signer is the holder.
pub async fn sign_dai_permit<M, S>(
    client: &M,
    signer: &S,
    token: impl Into<TokenOrDomain>,
    spender: Address,
    options: DaiPermitOptions,
) -> Result<SignedPermit<DaiPermitMessage>, PermitError>
where
    M: Middleware,
    M::Error: 'static,
    S: ethers_signers::Signer,
    S::Error: 'static,
{
    let payload =
        get_dai_permit_type_data(client, token, signer.address(), spender, options).await?;

    let signature = signer
        .sign_typed_data(&payload)
        .await
        .map_err(|e| PermitError::SignerError(Box::new(e)))?;

    Ok(SignedPermit {
        message: payload.value,
        signature: signature.try_into()?,
    })
}
