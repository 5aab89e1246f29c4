use std::collections::HashMap;

use ethers_core::types::Address;
use once_cell::sync::Lazy;

/// Address of the `GelatoRelay1BalanceERC2771` contract
pub static GELATO_RELAY_1BALANCE_ERC2771: Lazy<Address> = Lazy::new(|| {
    "0xd8253782c45a12053594b9deB72d8e8aB2Fca54c"
        .parse()
        .expect("!gelato relay")
});

/// Chain names accepted in payment intents
pub static CHAIN_NAME_TO_ID: Lazy<HashMap<&'static str, u64>> = Lazy::new(|| {
    HashMap::from([
        ("ethereum", 1),
        ("mainnet", 1),
        ("goerli", 5),
        ("sepolia", 11155111),
        ("optimism", 10),
        ("bsc", 56),
        ("gnosis", 100),
        ("polygon", 137),
        ("mumbai", 80001),
        ("base", 8453),
        ("arbitrum", 42161),
        ("avalanche", 43114),
    ])
});

/// Get the chain id for a chain name. Case-insensitive.
pub fn chain_id_from_name(name: &str) -> Option<u64> {
    CHAIN_NAME_TO_ID
        .get(name.to_ascii_lowercase().as_str())
        .copied()
}
