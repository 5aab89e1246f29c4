use ethers_core::types::{Address, Bytes, Signature, H256, U256};
use serde::{Deserialize, Serialize};

use crate::{ser::RsvSignature, SponsoredCallErc2771};

/// Signed Gelato relay `SponsoredCallERC2771` request
///
/// <https://docs.gelato.network/web3-services/relay/supported-methods/sponsoredcallerc2771>
///
/// The user signs the request, the sponsor pays from its 1Balance. The relay
/// contract verifies the user's signature and nonce before forwarding the
/// call with the user appended to the calldata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignedSponsoredCall {
    /// Chain id
    #[serde(with = "crate::ser::decimal_u64_ser")]
    pub chain_id: u64,
    /// Contract to call
    #[serde(serialize_with = "crate::ser::serialize_checksum_addr")]
    pub target: Address,
    /// Calldata
    pub data: Bytes,
    /// User EOA
    #[serde(serialize_with = "crate::ser::serialize_checksum_addr")]
    pub user: Address,
    /// User's relay nonce
    #[serde(with = "crate::ser::decimal_u256_ser")]
    pub user_nonce: U256,
    /// Deadline. 0 for none
    #[serde(with = "crate::ser::decimal_u256_ser")]
    pub user_deadline: U256,
    /// EIP-712 signature over the request
    pub user_signature: RsvSignature,
}

impl SignedSponsoredCall {
    /// Pair a request with the user's signature
    pub fn new(call: SponsoredCallErc2771, user_signature: Signature) -> Self {
        Self {
            chain_id: call.chain_id,
            target: call.target,
            data: call.data,
            user: call.user,
            user_nonce: call.user_nonce,
            user_deadline: call.user_deadline,
            user_signature: user_signature.into(),
        }
    }

    /// The request that was signed
    pub fn call(&self) -> SponsoredCallErc2771 {
        SponsoredCallErc2771 {
            chain_id: self.chain_id,
            target: self.target,
            data: self.data.clone(),
            user: self.user,
            user_nonce: self.user_nonce,
            user_deadline: self.user_deadline,
        }
    }
}

/// Body of `POST /relays/v2/sponsored-call-erc2771`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SponsoredCallRequest<'a> {
    #[serde(flatten)]
    pub(crate) call: &'a SignedSponsoredCall,
    pub(crate) sponsor_api_key: &'a str,
}

/// Response to relay request, contains an ID for the task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    /// The task ID
    task_id: H256,
}

impl RelayResponse {
    /// The task ID
    pub fn task_id(&self) -> H256 {
        self.task_id
    }
}
