//! Payment intents: a payment service describes a token payment, the buyer
//! signs an EIP-2612 permit for it, and the permit signature is folded into a
//! sponsored call to the payment contract.

use ethers_core::{
    abi::Token,
    types::{Address, U256},
};
use ethers_providers::Middleware;
use serde::{Deserialize, Serialize};

use crate::{
    get_erc2612_permit_type_data, get_gasless_tx_to_sign, utils::chain_id_from_name,
    Eip712Payload, Erc20PermitToSign, FunctionCall, MetaTxCall, MetaTxError, PermitError,
    PermitOptions, SignatureError, SplitSignature, SponsoredCallErc2771,
};

/// Intent error
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    /// `totalPrice` is missing or zero
    #[error("No Amount set")]
    MissingAmount,
    /// `paymentTokenAddress` is missing
    #[error("No payment token set")]
    MissingPaymentToken,
    /// Chain name with no known id
    #[error("Unknown chain: {0}")]
    UnknownChain(String),
    /// Building the permit failed
    #[error("{0}")]
    Permit(#[from] PermitError),
    /// Building the meta-transaction failed
    #[error("{0}")]
    MetaTx(#[from] MetaTxError),
    /// The permit signature is malformed
    #[error("{0}")]
    Signature(#[from] SignatureError),
}

/// A chain, by id or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainRef {
    /// Numeric chain id
    Id(u64),
    /// Chain name, e.g. `polygon`. Numeric strings are read as ids.
    Name(String),
}

impl From<u64> for ChainRef {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl ChainRef {
    /// Resolve the chain id
    pub fn chain_id(&self) -> Result<u64, IntentError> {
        match self {
            Self::Id(id) => Ok(*id),
            Self::Name(name) => chain_id_from_name(name)
                .or_else(|| name.trim().parse().ok())
                .ok_or_else(|| IntentError::UnknownChain(name.clone())),
        }
    }
}

/// A payout to one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer(
    pub Address,
    #[serde(with = "crate::ser::lenient_u256")] pub U256,
);

impl Transfer {
    fn token(&self) -> Token {
        Token::Tuple(vec![Token::Address(self.0), Token::Uint(self.1)])
    }
}

/// Payment parameters. Every field is optional; the ones present are passed
/// to the payment contract in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentParameters {
    /// Token the buyer pays with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_token_address: Option<Address>,
    /// Buyer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<Address>,
    /// Payouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfers: Option<Vec<Transfer>>,
    /// Amount the buyer approves
    #[serde(
        default,
        with = "crate::ser::lenient_u256_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_price: Option<U256>,
    /// Permit and meta-transaction deadline
    #[serde(
        default,
        with = "crate::ser::lenient_u256_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub deadline: Option<U256>,
}

impl IntentParameters {
    /// The present parameters as call arguments:
    /// `paymentTokenAddress, fromAddress, transfers, totalPrice, deadline`
    pub fn distribution_tokens(&self) -> Vec<Token> {
        let mut tokens = vec![];
        if let Some(token) = self.payment_token_address {
            tokens.push(Token::Address(token));
        }
        if let Some(from) = self.from_address {
            tokens.push(Token::Address(from));
        }
        if let Some(transfers) = &self.transfers {
            tokens.push(Token::Array(transfers.iter().map(Transfer::token).collect()));
        }
        if let Some(total_price) = self.total_price {
            tokens.push(Token::Uint(total_price));
        }
        if let Some(deadline) = self.deadline {
            tokens.push(Token::Uint(deadline));
        }
        tokens
    }
}

/// A payment intent, as returned by the payment service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    /// Chain the payment happens on
    pub chain: ChainRef,
    /// Payment contract. Spender of the permit and target of the call
    pub contract_address: Address,
    /// Payment function
    pub function_name: String,
    /// Human-readable signature of the payment function
    pub function_signature: String,
    /// Payment parameters
    pub parameters: IntentParameters,
}

impl PaymentIntent {
    /// The chain id of the intent
    pub fn chain_id(&self) -> Result<u64, IntentError> {
        self.chain.chain_id()
    }

    /// Token and permit options for the buyer's permit
    pub fn permit_options(&self) -> Result<(Address, PermitOptions), IntentError> {
        let amount = self
            .parameters
            .total_price
            .filter(|amount| !amount.is_zero())
            .ok_or(IntentError::MissingAmount)?;
        let token = self
            .parameters
            .payment_token_address
            .ok_or(IntentError::MissingPaymentToken)?;

        let mut options = PermitOptions::default()
            .value(amount)
            .chain_id(self.chain_id()?);
        options.deadline = self.parameters.deadline;

        Ok((token, options))
    }

    /// The payment call, with the permit signature appended
    pub fn payment_call(&self, permit_signature: &SplitSignature) -> FunctionCall {
        let mut parameters = self.parameters.distribution_tokens();
        parameters.extend(permit_signature.tokens());

        FunctionCall {
            function_name: self.function_name.clone(),
            signature: self.function_signature.clone(),
            parameters,
        }
    }
}

/// Build the permit the buyer signs to let the payment contract pull
/// `totalPrice` of the payment token.
#[tracing::instrument(skip(client, intent), fields(chain = ?intent.chain))]
pub async fn get_sign_erc20_permit<M>(
    client: &M,
    buyer: Address,
    intent: &PaymentIntent,
) -> Result<Erc20PermitToSign, IntentError>
where
    M: Middleware,
    M::Error: 'static,
{
    let (token, options) = intent.permit_options()?;
    let spender = intent.contract_address;
    Ok(get_erc2612_permit_type_data(client, token, buyer, spender, options).await?)
}

/// Build the sponsored call `user` signs to execute the payment, given the
/// buyer's permit signature.
#[tracing::instrument(skip(client, permit_signature, intent), fields(chain = ?intent.chain))]
pub async fn build_payment_transaction<M>(
    client: &M,
    user: Address,
    permit_signature: &str,
    intent: &PaymentIntent,
) -> Result<Eip712Payload<SponsoredCallErc2771>, IntentError>
where
    M: Middleware,
    M::Error: 'static,
{
    let chain_id = intent.chain_id()?;
    let permit_signature: SplitSignature = permit_signature.parse()?;
    let call = MetaTxCall::Function(intent.payment_call(&permit_signature));
    let deadline = intent.parameters.deadline.unwrap_or_default();

    Ok(get_gasless_tx_to_sign(
        client,
        chain_id,
        intent.contract_address,
        user,
        &call,
        deadline,
    )
    .await?)
}

#[cfg(test)]
mod test {
    use super::*;
    use ethers::{
        abi::{self, HumanReadableParser},
        providers::Provider,
        types::Bytes,
    };

    const PERMIT_SIG: &str = "0xdd82062cb06d9d81fa0d71d7e5ebdf4f67506d9b270826dcd1ccc1dd83fe5aa17849d6bfeaba01f291d5bfbfba4b358f665b0914c512258edda41e47898793c21b";

    fn intent() -> PaymentIntent {
        serde_json::from_str(
            r#"{
                "chain": 137,
                "parameters": {
                    "paymentTokenAddress": "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
                    "fromAddress": "0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399",
                    "totalPrice": "100",
                    "transfers": [["0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399", "100"]],
                    "deadline": 100
                },
                "contractAddress": "0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399",
                "functionName": "distributeTokensWithPermit",
                "functionSignature": "function distributeTokensWithPermit(address,address,(address,uint256)[],uint256,uint256,uint8,bytes32,bytes32)"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn it_resolves_chains() {
        assert_eq!(ChainRef::Id(137).chain_id().unwrap(), 137);
        assert_eq!(ChainRef::Name("polygon".to_owned()).chain_id().unwrap(), 137);
        assert_eq!(ChainRef::Name("10".to_owned()).chain_id().unwrap(), 10);
        assert!(matches!(
            ChainRef::Name("atlantis".to_owned()).chain_id(),
            Err(IntentError::UnknownChain(_))
        ));

        let named: ChainRef = serde_json::from_str(r#""polygon""#).unwrap();
        assert_eq!(named.chain_id().unwrap(), 137);
    }

    #[test]
    fn parameters_keep_their_order() {
        let mut params = intent().parameters;
        let tokens = params.distribution_tokens();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[3], Token::Uint(100.into()));

        params.from_address = None;
        params.transfers = None;
        let tokens = params.distribution_tokens();
        assert_eq!(
            tokens,
            vec![
                Token::Address(params.payment_token_address.unwrap()),
                Token::Uint(100.into()),
                Token::Uint(100.into()),
            ]
        );
    }

    #[test]
    fn permit_needs_an_amount() {
        let mut intent = intent();
        let (token, options) = intent.permit_options().unwrap();
        assert_eq!(token, intent.parameters.payment_token_address.unwrap());
        assert_eq!(options.value, Some(100.into()));
        assert_eq!(options.deadline, Some(100.into()));
        assert_eq!(options.chain_id, Some(137.into()));

        intent.parameters.total_price = Some(U256::zero());
        let err = intent.permit_options().unwrap_err();
        assert_eq!(err.to_string(), "No Amount set");

        intent.parameters.total_price = None;
        assert!(matches!(
            intent.permit_options(),
            Err(IntentError::MissingAmount)
        ));
    }

    #[tokio::test]
    async fn missing_amount_reads_nothing() {
        let (provider, _mock) = Provider::mocked();
        let mut intent = intent();
        intent.parameters.total_price = None;

        let res = get_sign_erc20_permit(&provider, Address::zero(), &intent).await;
        assert!(matches!(res, Err(IntentError::MissingAmount)));
    }

    #[tokio::test]
    async fn it_builds_payment_transactions() {
        let (provider, mock) = Provider::mocked();
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(1.into())])))
            .unwrap();
        let intent = intent();
        let user = Address::from_low_u64_be(0xb0b);

        let payload = build_payment_transaction(&provider, user, PERMIT_SIG, &intent)
            .await
            .unwrap();

        assert_eq!(payload.domain.chain_id, Some(137.into()));
        assert_eq!(payload.value.target, intent.contract_address);
        assert_eq!(payload.value.user, user);
        assert_eq!(payload.value.user_nonce, 1.into());
        assert_eq!(payload.value.user_deadline, 100.into());

        let function = HumanReadableParser::parse_function(&intent.function_signature).unwrap();
        assert_eq!(payload.value.data[..4], function.short_signature());
        let args = function.decode_input(&payload.value.data[4..]).unwrap();
        assert_eq!(args.len(), 8);
        assert_eq!(args[5], Token::Uint(27.into()));
        assert_eq!(
            args[6],
            Token::FixedBytes(
                hex::decode("dd82062cb06d9d81fa0d71d7e5ebdf4f67506d9b270826dcd1ccc1dd83fe5aa1")
                    .unwrap()
            )
        );
    }

    #[tokio::test]
    async fn bad_signatures_are_rejected() {
        let (provider, _mock) = Provider::mocked();
        let res = build_payment_transaction(&provider, Address::zero(), "0x1234", &intent()).await;
        assert!(matches!(res, Err(IntentError::Signature(_))));
    }
}
