use ethers::{
    abi::{self, Token},
    providers::Provider,
    signers::{LocalWallet, Signer},
    types::{transaction::eip712::EIP712Domain, Bytes},
};
use gasless_permit::*;

const INTENT: &str = r#"{
    "chain": "polygon",
    "parameters": {
        "paymentTokenAddress": "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
        "fromAddress": "0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399",
        "totalPrice": 100,
        "transfers": [["0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399", 100]],
        "deadline": "0x64"
    },
    "contractAddress": "0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399",
    "functionName": "distributeTokensWithPermit",
    "functionSignature": "function distributeTokensWithPermit(address,address,(address,uint256)[],uint256,uint256,uint8,bytes32,bytes32)"
}"#;

#[tokio::test]
async fn permit_then_sponsored_call() {
    let intent: PaymentIntent = serde_json::from_str(INTENT).unwrap();
    let buyer: LocalWallet = "ff".repeat(32).parse().unwrap();

    // 1. the buyer signs a permit for the payment contract
    let (token, options) = intent.permit_options().unwrap();
    let domain = EIP712Domain {
        name: Some("USD Coin".to_owned()),
        version: Some("2".to_owned()),
        chain_id: options.chain_id,
        verifying_contract: Some(token),
        salt: None,
    };
    let (provider, mock) = Provider::mocked();
    let permit = get_erc2612_permit_type_data(
        &provider,
        domain,
        buyer.address(),
        intent.contract_address,
        options.nonce(0u64),
    )
    .await
    .unwrap();
    assert_eq!(permit.value.value, 100.into());
    assert_eq!(permit.value.deadline, 100.into());
    assert_eq!(permit.value.spender, intent.contract_address);

    let permit_signature = buyer.sign_typed_data(&permit).await.unwrap();

    // 2. the signature goes into the payment call
    mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(0.into())])))
        .unwrap();
    let payload = build_payment_transaction(
        &provider,
        buyer.address(),
        &format!("0x{}", permit_signature),
        &intent,
    )
    .await
    .unwrap();
    assert_eq!(payload.domain, gelato_eip712_domain(137));

    // 3. the buyer signs the sponsored call, ready for the relay
    let signed = payload.sign(&buyer).await.unwrap();
    let json = serde_json::to_value(&signed).unwrap();
    assert_eq!(json["chainId"], "137");
    assert_eq!(json["userDeadline"], "100");
    assert_eq!(json["target"], "0xAA9F814155B6c03f29B62D881D4Ac5b13eAc3399");
}

#[tokio::test]
async fn intents_without_amount_fail() {
    let mut intent: PaymentIntent = serde_json::from_str(INTENT).unwrap();
    intent.parameters.total_price = None;
    let (provider, _mock) = Provider::mocked();

    let err = get_sign_erc20_permit(&provider, Default::default(), &intent)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No Amount set");
}
