//! Gelato `SponsoredCallERC2771` meta-transactions.
//!
//! The user signs a [`SponsoredCallErc2771`] under the
//! `GelatoRelay1BalanceERC2771` domain; Gelato relays the call to `target`
//! with the user appended to the calldata (ERC-2771) and charges the
//! sponsor's 1Balance.

use ethers_core::{
    abi::{HumanReadableParser, Token},
    types::{transaction::eip712::EIP712Domain, Address, Bytes, U256},
    utils::keccak256,
};
use ethers_providers::Middleware;
use serde::{Deserialize, Serialize};

use crate::{
    contracts::{self, ContractError},
    rpc::SignedSponsoredCall,
    utils::GELATO_RELAY_1BALANCE_ERC2771,
    Eip712Payload, TypedMessage,
};

/// EIP-712 domain name of the relay contract
pub const GELATO_RELAY_DOMAIN_NAME: &str = "GelatoRelay1BalanceERC2771";

/// EIP-712 domain version of the relay contract
pub const GELATO_RELAY_DOMAIN_VERSION: &str = "1";

/// Signing domain of `GelatoRelay1BalanceERC2771` on `chain_id`
pub fn gelato_eip712_domain(chain_id: u64) -> EIP712Domain {
    gelato_eip712_domain_with_relay(chain_id, *GELATO_RELAY_1BALANCE_ERC2771)
}

/// Signing domain of a relay deployed at a non-default address
pub fn gelato_eip712_domain_with_relay(chain_id: u64, relay: Address) -> EIP712Domain {
    EIP712Domain {
        name: Some(GELATO_RELAY_DOMAIN_NAME.to_owned()),
        version: Some(GELATO_RELAY_DOMAIN_VERSION.to_owned()),
        chain_id: Some(chain_id.into()),
        verifying_contract: Some(relay),
        salt: None,
    }
}

/// A `SponsoredCallERC2771` request, as signed by the user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredCallErc2771 {
    /// Chain the call executes on
    pub chain_id: u64,
    /// Contract to call
    pub target: Address,
    /// Calldata for `target`
    pub data: Bytes,
    /// EOA on whose behalf the call is made
    pub user: Address,
    /// User's relay nonce
    pub user_nonce: U256,
    /// Timestamp after which the relay rejects the call. 0 means no deadline
    pub user_deadline: U256,
}

impl TypedMessage for SponsoredCallErc2771 {
    const PRIMARY_TYPE: &'static str = "SponsoredCallERC2771";

    const FIELDS: &'static [(&'static str, &'static str)] = &[
        ("chainId", "uint256"),
        ("target", "address"),
        ("data", "bytes"),
        ("user", "address"),
        ("userNonce", "uint256"),
        ("userDeadline", "uint256"),
    ];

    fn encode_values(&self) -> Vec<Token> {
        vec![
            Token::Uint(self.chain_id.into()),
            Token::Address(self.target),
            Token::FixedBytes(keccak256(&self.data).to_vec()),
            Token::Address(self.user),
            Token::Uint(self.user_nonce),
            Token::Uint(self.user_deadline),
        ]
    }
}

/// MetaTx error
#[derive(Debug, thiserror::Error)]
pub enum MetaTxError {
    /// Calldata could not be built
    #[error("could not create data: {0}")]
    Encoding(String),
    /// Reading the relay nonce failed
    #[error("{0}")]
    Contract(#[from] ContractError),
    /// Wrong Signer
    #[error(
        "Wrong signer. Expected {expected:?}. Attempted to sign with key belonging to: {actual:?}"
    )]
    WrongSigner {
        /// User in the request
        expected: Address,
        /// Address belonging to the signer
        actual: Address,
    },
    /// Signer errored
    #[error("{0}")]
    SignerError(Box<dyn std::error::Error + Send + Sync + 'static>),
}

/// A call described by its human-readable ABI signature and arguments
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Name of the function to call
    pub function_name: String,
    /// Human-readable signature, e.g. `function transfer(address,uint256)`
    pub signature: String,
    /// Arguments, in order
    pub parameters: Vec<Token>,
}

impl FunctionCall {
    /// ABI-encode the call
    pub fn encode(&self) -> Result<Bytes, MetaTxError> {
        let signature = self.signature.trim();
        let function = if signature.starts_with("function ") {
            HumanReadableParser::parse_function(signature)
        } else {
            HumanReadableParser::parse_function(&format!("function {signature}"))
        }
        .map_err(|e| MetaTxError::Encoding(e.to_string()))?;

        if function.name != self.function_name {
            return Err(MetaTxError::Encoding(format!(
                "signature declares {}, expected {}",
                function.name, self.function_name
            )));
        }

        function
            .encode_input(&self.parameters)
            .map(Into::into)
            .map_err(|e| MetaTxError::Encoding(e.to_string()))
    }
}

/// Calldata of a meta-transaction: pre-encoded, or built from a signature
#[derive(Debug, Clone, PartialEq)]
pub enum MetaTxCall {
    /// Already encoded calldata
    Encoded(Bytes),
    /// Call to encode
    Function(FunctionCall),
}

impl From<Bytes> for MetaTxCall {
    fn from(data: Bytes) -> Self {
        Self::Encoded(data)
    }
}

impl From<FunctionCall> for MetaTxCall {
    fn from(call: FunctionCall) -> Self {
        Self::Function(call)
    }
}

impl MetaTxCall {
    /// The calldata
    pub fn calldata(&self) -> Result<Bytes, MetaTxError> {
        match self {
            Self::Encoded(data) => Ok(data.clone()),
            Self::Function(call) => call.encode(),
        }
    }
}

/// Build the request `user` signs to have `call` relayed to `target`. The
/// user's nonce is read from `GelatoRelay1BalanceERC2771`.
pub async fn get_gelato_request_struct<M>(
    client: &M,
    chain_id: u64,
    target: Address,
    user: Address,
    call: &MetaTxCall,
    deadline: U256,
) -> Result<SponsoredCallErc2771, MetaTxError>
where
    M: Middleware,
    M::Error: 'static,
{
    let relay = *GELATO_RELAY_1BALANCE_ERC2771;
    get_gelato_request_struct_with_relay(client, relay, chain_id, target, user, call, deadline)
        .await
}

/// [`get_gelato_request_struct`] against a relay deployed at `relay`
#[tracing::instrument(skip(client, call))]
pub async fn get_gelato_request_struct_with_relay<M>(
    client: &M,
    relay: Address,
    chain_id: u64,
    target: Address,
    user: Address,
    call: &MetaTxCall,
    deadline: U256,
) -> Result<SponsoredCallErc2771, MetaTxError>
where
    M: Middleware,
    M::Error: 'static,
{
    let data = call.calldata()?;
    let user_nonce = contracts::relay_user_nonce(client, relay, user).await?;
    tracing::debug!(%user_nonce, "Fetched relay user nonce");

    Ok(SponsoredCallErc2771 {
        chain_id,
        target,
        data,
        user,
        user_nonce,
        user_deadline: deadline,
    })
}

/// Build the full typed-data payload for a sponsored call
pub async fn get_gasless_tx_to_sign<M>(
    client: &M,
    chain_id: u64,
    target: Address,
    user: Address,
    call: &MetaTxCall,
    deadline: U256,
) -> Result<Eip712Payload<SponsoredCallErc2771>, MetaTxError>
where
    M: Middleware,
    M::Error: 'static,
{
    let relay = *GELATO_RELAY_1BALANCE_ERC2771;
    get_gasless_tx_to_sign_with_relay(client, relay, chain_id, target, user, call, deadline).await
}

/// [`get_gasless_tx_to_sign`] for a relay deployed at `relay`. Both the
/// nonce and the signing domain come from that deployment.
pub async fn get_gasless_tx_to_sign_with_relay<M>(
    client: &M,
    relay: Address,
    chain_id: u64,
    target: Address,
    user: Address,
    call: &MetaTxCall,
    deadline: U256,
) -> Result<Eip712Payload<SponsoredCallErc2771>, MetaTxError>
where
    M: Middleware,
    M::Error: 'static,
{
    let value =
        get_gelato_request_struct_with_relay(client, relay, chain_id, target, user, call, deadline)
            .await?;
    Ok(Eip712Payload::new(gelato_eip712_domain_with_relay(chain_id, relay), value))
}

impl Eip712Payload<SponsoredCallErc2771> {
    /// Sign the request with the user's signer
    pub async fn sign<S>(&self, signer: &S) -> Result<SignedSponsoredCall, MetaTxError>
    where
        S: ethers_signers::Signer,
        S::Error: 'static,
    {
        let signer_addr = signer.address();
        if signer_addr != self.value.user {
            return Err(MetaTxError::WrongSigner {
                expected: self.value.user,
                actual: signer_addr,
            });
        }

        let signature = signer
            .sign_typed_data(self)
            .await
            .map_err(|e| MetaTxError::SignerError(Box::new(e)))?;
        Ok(SignedSponsoredCall::new(self.value.clone(), signature))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ethers::{
        abi,
        providers::Provider,
        signers::{LocalWallet, Signer},
        utils::id,
    };
    use ethers_core::types::{transaction::eip712::Eip712, H256};

    fn transfer_call() -> FunctionCall {
        FunctionCall {
            function_name: "transfer".to_owned(),
            signature: "function transfer(address to, uint256 value) external returns (bool)"
                .to_owned(),
            parameters: vec![
                Token::Address(
                    "0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399"
                        .parse()
                        .unwrap(),
                ),
                Token::Uint(100.into()),
            ],
        }
    }

    #[test]
    fn it_builds_the_domain() {
        let domain = gelato_eip712_domain(137);
        assert_eq!(domain.name.as_deref(), Some("GelatoRelay1BalanceERC2771"));
        assert_eq!(domain.version.as_deref(), Some("1"));
        assert_eq!(domain.chain_id, Some(137.into()));
        assert_eq!(
            domain.verifying_contract,
            Some(
                "0xd8253782c45a12053594b9deB72d8e8aB2Fca54c"
                    .parse()
                    .unwrap()
            )
        );
    }

    #[test]
    fn it_encodes_the_type() {
        assert_eq!(
            SponsoredCallErc2771::encode_type(),
            "SponsoredCallERC2771(uint256 chainId,address target,bytes data,address user,uint256 userNonce,uint256 userDeadline)"
        );
    }

    #[test]
    fn it_encodes_function_calls() {
        let data = transfer_call().encode().unwrap();
        assert_eq!(data[..4], id("transfer(address,uint256)"));
        assert_eq!(data.len(), 4 + 32 * 2);
    }

    #[test]
    fn bad_calls_do_not_encode() {
        let mut call = transfer_call();
        call.parameters.pop();
        assert!(matches!(call.encode(), Err(MetaTxError::Encoding(_))));

        let mut call = transfer_call();
        call.function_name = "approve".to_owned();
        assert!(matches!(call.encode(), Err(MetaTxError::Encoding(_))));

        let mut call = transfer_call();
        call.signature = "not a function".to_owned();
        assert!(matches!(call.encode(), Err(MetaTxError::Encoding(_))));
    }

    #[tokio::test]
    async fn it_builds_and_signs_requests() {
        let (provider, mock) = Provider::mocked();
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(3.into())])))
            .unwrap();
        let user: LocalWallet = "ff".repeat(32).parse().unwrap();
        let target = Address::from_low_u64_be(0xbeef);

        let payload = get_gasless_tx_to_sign(
            &provider,
            137,
            target,
            user.address(),
            &transfer_call().into(),
            100.into(),
        )
        .await
        .unwrap();

        assert_eq!(payload.primary_type(), "SponsoredCallERC2771");
        assert_eq!(payload.value.user_nonce, 3.into());
        assert_eq!(payload.value.user_deadline, 100.into());
        assert_eq!(payload.value.data, transfer_call().encode().unwrap());

        // the typed-data document hashes to the same digest
        assert_eq!(
            payload.to_typed_data().unwrap().encode_eip712().unwrap(),
            payload.encode_eip712().unwrap()
        );

        let signed = payload.sign(&user).await.unwrap();
        let digest = H256::from(payload.encode_eip712().unwrap());
        assert_eq!(signed.user_signature.recover(digest).unwrap(), user.address());
    }

    #[tokio::test]
    async fn only_the_user_signs() {
        let user: LocalWallet = "ff".repeat(32).parse().unwrap();
        let other: LocalWallet = "11".repeat(32).parse().unwrap();
        let payload = Eip712Payload::new(
            gelato_eip712_domain(137),
            SponsoredCallErc2771 {
                chain_id: 137,
                target: Address::from_low_u64_be(0xbeef),
                data: Bytes::default(),
                user: user.address(),
                user_nonce: 0.into(),
                user_deadline: 0.into(),
            },
        );

        assert!(matches!(
            payload.sign(&other).await,
            Err(MetaTxError::WrongSigner { .. })
        ));
    }

    #[tokio::test]
    async fn custom_relays_sign_under_their_own_domain() {
        let (provider, mock) = Provider::mocked();
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(11.into())])))
            .unwrap();
        let relay = Address::from_low_u64_be(0x1234);
        let user: LocalWallet = "ff".repeat(32).parse().unwrap();

        let payload = get_gasless_tx_to_sign_with_relay(
            &provider,
            relay,
            80001,
            Address::from_low_u64_be(0xbeef),
            user.address(),
            &transfer_call().into(),
            U256::zero(),
        )
        .await
        .unwrap();

        assert_eq!(payload.domain, gelato_eip712_domain_with_relay(80001, relay));
        assert_eq!(payload.domain.verifying_contract, Some(relay));
        assert_eq!(payload.value.user_nonce, 11.into());
        assert_ne!(payload.domain, gelato_eip712_domain(80001));
    }
}
