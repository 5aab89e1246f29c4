use std::{collections::BTreeMap, convert::Infallible, str::FromStr};

use ethers_core::{
    abi::{self, Token},
    types::{
        transaction::eip712::{EIP712Domain, Eip712, Eip712DomainType, TypedData, Types},
        Signature, H256, U256,
    },
    utils::keccak256,
};
use serde::{Deserialize, Serialize};

/// `2^256 - 1`. Default permit value, permit deadline and Dai expiry
pub const MAX_INT: U256 = U256::MAX;

/// Name of the domain entry in a `types` map
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";

/// A struct that is signed as the primary type of an EIP-712 payload.
///
/// Implementors list their members in declaration order; the type string, the
/// type hash and the `types` map are all derived from that list.
pub trait TypedMessage: Serialize + Send + Sync {
    /// Name of the primary type, e.g. `Permit`
    const PRIMARY_TYPE: &'static str;

    /// Members as `(name, solidity type)` pairs
    const FIELDS: &'static [(&'static str, &'static str)];

    /// Member values, ABI-ready. Dynamic members (`bytes`, `string`) must
    /// already be replaced by their keccak256 hash.
    fn encode_values(&self) -> Vec<Token>;

    /// `Name(type1 name1,type2 name2,...)`
    fn encode_type() -> String {
        let members = Self::FIELDS
            .iter()
            .map(|(name, ty)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{}({})", Self::PRIMARY_TYPE, members)
    }

    /// Members as EIP-712 type entries
    fn fields() -> Vec<Eip712DomainType> {
        Self::FIELDS
            .iter()
            .map(|(name, ty)| Eip712DomainType {
                name: (*name).to_owned(),
                r#type: (*ty).to_owned(),
            })
            .collect()
    }

    /// A `types` map containing only the primary type
    fn types() -> Types {
        BTreeMap::from([(Self::PRIMARY_TYPE.to_owned(), Self::fields())])
    }
}

/// Ordered `EIP712Domain` members for the fields set on `domain`
pub fn domain_type_fields(domain: &EIP712Domain) -> Vec<Eip712DomainType> {
    let members = [
        ("name", "string", domain.name.is_some()),
        ("version", "string", domain.version.is_some()),
        ("chainId", "uint256", domain.chain_id.is_some()),
        ("verifyingContract", "address", domain.verifying_contract.is_some()),
        ("salt", "bytes32", domain.salt.is_some()),
    ];

    members
        .into_iter()
        .filter(|(_, _, present)| *present)
        .map(|(name, ty, _)| Eip712DomainType {
            name: name.to_owned(),
            r#type: ty.to_owned(),
        })
        .collect()
}

/// Domain, types and value of an EIP-712 payload. This is the shape wallets
/// expect for `signTypedData(domain, types, value)`: `types` holds the
/// primary type only, without `EIP712Domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Eip712Payload<T> {
    /// Signing domain
    pub domain: EIP712Domain,
    /// Type definitions
    pub types: Types,
    /// The message
    pub value: T,
}

impl<T> Eip712Payload<T>
where
    T: TypedMessage,
{
    /// Wrap `value` in `domain`
    pub fn new(domain: EIP712Domain, value: T) -> Self {
        Self {
            domain,
            types: T::types(),
            value,
        }
    }

    /// The primary type name
    pub fn primary_type(&self) -> &'static str {
        T::PRIMARY_TYPE
    }

    /// Convert to a full `eth_signTypedData_v4` document, including the
    /// `EIP712Domain` type and `primaryType`.
    pub fn to_typed_data(&self) -> Result<TypedData, serde_json::Error> {
        let message = serde_json::from_value(serde_json::to_value(&self.value)?)?;

        let mut types = self.types.clone();
        types.insert(
            EIP712_DOMAIN_TYPE.to_owned(),
            domain_type_fields(&self.domain),
        );

        Ok(TypedData {
            domain: self.domain.clone(),
            types,
            primary_type: T::PRIMARY_TYPE.to_owned(),
            message,
        })
    }
}

impl<T> Eip712 for Eip712Payload<T>
where
    T: TypedMessage,
{
    type Error = Infallible;

    fn domain(&self) -> Result<EIP712Domain, Self::Error> {
        Ok(self.domain.clone())
    }

    fn type_hash() -> Result<[u8; 32], Self::Error> {
        Ok(keccak256(T::encode_type()))
    }

    fn struct_hash(&self) -> Result<[u8; 32], Self::Error> {
        let mut tokens = vec![Token::FixedBytes(Self::type_hash()?.to_vec())];
        tokens.extend(self.value.encode_values());
        Ok(keccak256(abi::encode(&tokens)))
    }
}

/// Signature parsing error
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Not hex
    #[error("Signature is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    /// Neither 65 (r, s, v) nor 64 (compact) bytes
    #[error("Invalid signature length: {0} bytes")]
    InvalidLength(usize),
    /// Recovery id outside 0, 1, 27, 28
    #[error("Invalid signature recovery id: {0}")]
    InvalidV(u64),
}

/// A signature split into the `v`, `r`, `s` values solidity `permit`
/// functions take. `v` is always 27 or 28.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitSignature {
    /// Recovery id, 27 or 28
    pub v: u8,
    /// r
    pub r: H256,
    /// s
    pub s: H256,
}

impl SplitSignature {
    fn new(v: u64, r: H256, s: H256) -> Result<Self, SignatureError> {
        let v = match v {
            0 | 1 => v + 27,
            27 | 28 => v,
            _ => return Err(SignatureError::InvalidV(v)),
        };
        Ok(Self { v: v as u8, r, s })
    }

    /// `[uint8 v, bytes32 r, bytes32 s]` tokens, in permit argument order
    pub fn tokens(&self) -> [Token; 3] {
        [
            Token::Uint(self.v.into()),
            Token::FixedBytes(self.r.as_bytes().to_vec()),
            Token::FixedBytes(self.s.as_bytes().to_vec()),
        ]
    }
}

impl TryFrom<Signature> for SplitSignature {
    type Error = SignatureError;

    fn try_from(sig: Signature) -> Result<Self, Self::Error> {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        sig.r.to_big_endian(&mut r);
        sig.s.to_big_endian(&mut s);
        Self::new(sig.v, r.into(), s.into())
    }
}

impl FromStr for SplitSignature {
    type Err = SignatureError;

    /// Parse a 0x-prefixed (or bare) hex signature. Accepts 65-byte `r || s ||
    /// v` and 64-byte EIP-2098 compact `r || yParityAndS` encodings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
        match bytes.len() {
            65 => Self::new(
                bytes[64] as u64,
                H256::from_slice(&bytes[..32]),
                H256::from_slice(&bytes[32..64]),
            ),
            64 => {
                let mut s = [0u8; 32];
                s.copy_from_slice(&bytes[32..]);
                let y_parity = (s[0] >> 7) as u64;
                s[0] &= 0x7f;
                Self::new(y_parity, H256::from_slice(&bytes[..32]), s.into())
            }
            len => Err(SignatureError::InvalidLength(len)),
        }
    }
}

/// A signed permit: the message fields flattened together with `v`, `r`, `s`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignedPermit<T> {
    /// The permit message
    #[serde(flatten)]
    pub message: T,
    /// The owner's signature
    #[serde(flatten)]
    pub signature: SplitSignature,
}
