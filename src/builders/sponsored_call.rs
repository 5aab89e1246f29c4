use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, Bytes, NameOrAddress, TransactionRequest,
    U256,
};
use ethers_providers::Middleware;

use crate::{
    contracts, gelato_eip712_domain_with_relay, rpc::SignedSponsoredCall,
    utils::GELATO_RELAY_1BALANCE_ERC2771, Eip712Payload, SponsoredCallErc2771,
};

/// Builder for a [`SponsoredCallErc2771`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SponsoredCallBuilder {
    /// Chain id. Defaults to 1 (ethereum).
    pub chain_id: Option<u64>,
    /// Address of dApp's smart contract to call. Required
    pub target: Option<Address>,
    /// Payload for `target`. Defaults to empty bytes: `0x`
    pub data: Option<Bytes>,
    /// EOA of dapp's user. Required
    pub user: Option<Address>,
    /// User's nonce on the relay contract. Required. May be fetched with
    /// `fill_user_nonce`
    pub user_nonce: Option<U256>,
    /// Deadline for executing this request. Defaults to 0: no deadline
    pub user_deadline: Option<U256>,
    /// Relay contract, the domain's verifying contract. Defaults to
    /// `GelatoRelay1BalanceERC2771`
    pub relay: Option<Address>,
}

impl From<&TransactionRequest> for SponsoredCallBuilder {
    fn from(tx: &TransactionRequest) -> Self {
        let mut builder = SponsoredCallBuilder::default();

        if let Some(NameOrAddress::Address(target)) = tx.to {
            builder = builder.target(target);
        }
        if let Some(data) = &tx.data {
            builder = builder.data(data.clone());
        }
        if let Some(from) = tx.from {
            builder = builder.user_address(from);
        }
        if let Some(chain_id) = tx.chain_id {
            builder = builder.chain_id(chain_id.as_u64());
        }

        builder
    }
}

impl From<&TypedTransaction> for SponsoredCallBuilder {
    fn from(tx: &TypedTransaction) -> Self {
        let mut builder = SponsoredCallBuilder::default();

        if let Some(NameOrAddress::Address(target)) = tx.to() {
            builder = builder.target(*target);
        }
        if let Some(data) = tx.data() {
            builder = builder.data(data.clone());
        }
        if let Some(from) = tx.from() {
            builder = builder.user_address(*from);
        }
        if let Some(chain_id) = tx.chain_id() {
            builder = builder.chain_id(chain_id.as_u64());
        }

        builder
    }
}

impl SponsoredCallBuilder {
    /// Get a list of keys that must be set before `build` will succeed
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.target.is_none() {
            missing.push("target");
        }
        if self.user.is_none() {
            missing.push("user");
        }
        if self.user_nonce.is_none() {
            missing.push("user_nonce");
        }
        missing
    }

    /// Set `chain_id`. Defaults to 1 (ethereum)
    pub fn chain_id(mut self, val: u64) -> Self {
        self.chain_id = Some(val);
        self
    }

    /// Set `target`. Required.
    pub fn target(mut self, val: Address) -> Self {
        self.target = Some(val);
        self
    }

    /// Set `data`. Defaults to empty bytes: `0x`
    pub fn data(mut self, val: Bytes) -> Self {
        self.data = Some(val);
        self
    }

    /// Set `user`. Required. May be set automatically by `with_user`
    pub fn user_address(mut self, val: Address) -> Self {
        self.user = Some(val);
        self
    }

    /// Set `user_nonce`. Required
    pub fn user_nonce(mut self, val: impl Into<U256>) -> Self {
        self.user_nonce = Some(val.into());
        self
    }

    /// Set `user_deadline`. If set to 0, no deadline is enforced
    pub fn user_deadline(mut self, val: impl Into<U256>) -> Self {
        self.user_deadline = Some(val.into());
        self
    }

    /// Set `relay`. Defaults to `GelatoRelay1BalanceERC2771`
    pub fn relay(mut self, val: Address) -> Self {
        self.relay = Some(val);
        self
    }

    /// Read the user's nonce from the relay contract. Requires `user`
    pub async fn fill_user_nonce<M>(mut self, client: &M) -> eyre::Result<Self>
    where
        M: Middleware,
        M::Error: 'static,
    {
        let user = self
            .user
            .ok_or_else(|| eyre::eyre!("Missing required values in fill: user"))?;
        let relay = self.relay.unwrap_or(*GELATO_RELAY_1BALANCE_ERC2771);
        self.user_nonce = Some(contracts::relay_user_nonce(client, relay, user).await?);
        Ok(self)
    }

    /// Set a signer that will sign the request. Note that this will override
    /// the existing user with the address of that of the signer
    pub fn with_user<S>(mut self, user: &S) -> SponsoredCallBuilderWithUser<S>
    where
        S: ethers_signers::Signer,
        S::Error: 'static,
    {
        self.user = Some(user.address());
        self.chain_id = Some(self.chain_id.unwrap_or_else(|| user.chain_id()));
        SponsoredCallBuilderWithUser {
            builder: self,
            user,
        }
    }

    /// Build this request into the typed data the user signs
    pub fn build(self) -> eyre::Result<Eip712Payload<SponsoredCallErc2771>> {
        let (Some(target), Some(user), Some(user_nonce)) =
            (self.target, self.user, self.user_nonce)
        else {
            eyre::bail!(
                "Missing required values in build: {}",
                self.missing_keys().join(", ")
            );
        };

        let chain_id = self.chain_id.unwrap_or(1);
        let relay = self.relay.unwrap_or(*GELATO_RELAY_1BALANCE_ERC2771);

        Ok(Eip712Payload::new(
            gelato_eip712_domain_with_relay(chain_id, relay),
            SponsoredCallErc2771 {
                chain_id,
                target,
                data: self.data.unwrap_or_default(),
                user,
                user_nonce,
                user_deadline: self.user_deadline.unwrap_or_default(),
            },
        ))
    }
}

/// Builder for a [`SignedSponsoredCall`]
pub struct SponsoredCallBuilderWithUser<'a, S> {
    builder: SponsoredCallBuilder,
    user: &'a S,
}

impl<'a, S> std::fmt::Debug for SponsoredCallBuilderWithUser<'a, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SponsoredCallBuilderWithUser")
            .field("builder", &self.builder)
            .finish()
    }
}

impl<'a, S> SponsoredCallBuilderWithUser<'a, S>
where
    S: ethers_signers::Signer,
    S::Error: 'static,
{
    /// Set `chain_id`. Defaults to the signer's chain id
    pub fn chain_id(mut self, val: u64) -> Self {
        self.builder.chain_id = Some(val);
        self
    }

    /// Set `target`. Required.
    pub fn target(mut self, val: Address) -> Self {
        self.builder.target = Some(val);
        self
    }

    /// Set `data`. Defaults to empty bytes: `0x`
    pub fn data(mut self, val: Bytes) -> Self {
        self.builder.data = Some(val);
        self
    }

    /// Set `user_nonce`. Required
    pub fn user_nonce(mut self, val: impl Into<U256>) -> Self {
        self.builder.user_nonce = Some(val.into());
        self
    }

    /// Set `user_deadline`. If set to 0, no deadline is enforced
    pub fn user_deadline(mut self, val: impl Into<U256>) -> Self {
        self.builder.user_deadline = Some(val.into());
        self
    }

    /// Set `relay`. Defaults to `GelatoRelay1BalanceERC2771`
    pub fn relay(mut self, val: Address) -> Self {
        self.builder.relay = Some(val);
        self
    }

    /// Set `user_address`, unsetting the existing user signer
    pub fn user_address(mut self, address: Address) -> SponsoredCallBuilder {
        self.builder.user = Some(address);
        self.builder
    }

    /// Read the user's nonce from the relay contract
    pub async fn fill_user_nonce<M>(mut self, client: &M) -> eyre::Result<Self>
    where
        M: Middleware,
        M::Error: 'static,
    {
        self.builder = self.builder.fill_user_nonce(client).await?;
        Ok(self)
    }

    /// Build and sign this request
    pub async fn build(self) -> eyre::Result<SignedSponsoredCall> {
        Ok(self.builder.build()?.sign(self.user).await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ethers::{
        abi::{self, Token},
        providers::Provider,
        signers::{LocalWallet, Signer},
    };
    use ethers_core::types::{transaction::eip712::Eip712, H256};

    #[test]
    fn it_reports_missing_keys() {
        let builder = SponsoredCallBuilder::default().target(Address::from_low_u64_be(1));
        assert_eq!(builder.missing_keys(), vec!["user", "user_nonce"]);

        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("user, user_nonce"));
    }

    #[test]
    fn it_builds_with_defaults() {
        let target = Address::from_low_u64_be(1);
        let user = Address::from_low_u64_be(2);
        let tx = TransactionRequest::new().to(target).from(user).data(vec![1, 2, 3]);

        let payload = SponsoredCallBuilder::from(&tx).user_nonce(0u64).build().unwrap();

        assert_eq!(payload.domain.chain_id, Some(1.into()));
        assert_eq!(
            payload.domain.verifying_contract,
            Some(*GELATO_RELAY_1BALANCE_ERC2771)
        );
        assert_eq!(payload.value.target, target);
        assert_eq!(payload.value.user, user);
        assert_eq!(payload.value.data, Bytes::from(vec![1, 2, 3]));
        assert_eq!(payload.value.user_deadline, U256::zero());
    }

    #[tokio::test]
    async fn it_fills_the_user_nonce() {
        let (provider, mock) = Provider::mocked();
        mock.push::<Bytes, _>(Bytes::from(abi::encode(&[Token::Uint(9.into())])))
            .unwrap();

        let builder = SponsoredCallBuilder::default()
            .user_address(Address::from_low_u64_be(2))
            .fill_user_nonce(&provider)
            .await
            .unwrap();
        assert_eq!(builder.user_nonce, Some(9.into()));

        let err = SponsoredCallBuilder::default()
            .fill_user_nonce(&provider)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("user"));
    }

    #[tokio::test]
    async fn it_signs_with_the_user() {
        let user = "ff"
            .repeat(32)
            .parse::<LocalWallet>()
            .unwrap()
            .with_chain_id(137u64);

        let signed = SponsoredCallBuilder::default()
            .target(Address::from_low_u64_be(1))
            .with_user(&user)
            .user_nonce(4u64)
            .user_deadline(1_700_000_000u64)
            .build()
            .await
            .unwrap();

        assert_eq!(signed.chain_id, 137);
        assert_eq!(signed.user, user.address());

        let payload = Eip712Payload::new(crate::gelato_eip712_domain(137), signed.call());
        let digest = H256::from(payload.encode_eip712().unwrap());
        assert_eq!(signed.user_signature.recover(digest).unwrap(), user.address());
    }
}
