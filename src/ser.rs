use ethers_core::types::{Signature, H160};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Wrapper around a signature that ensures it serializes/deserializes
/// as a 0x-prepended hex representation of RSV
pub struct RsvSignature(Signature);

impl std::fmt::Display for RsvSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.0)
    }
}

impl std::ops::Deref for RsvSignature {
    type Target = Signature;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Signature> for RsvSignature {
    fn from(s: Signature) -> Self {
        Self(s)
    }
}

impl From<RsvSignature> for Signature {
    fn from(s: RsvSignature) -> Self {
        s.0
    }
}

impl Serialize for RsvSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RsvSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        s.parse()
            .map(RsvSignature)
            .map_err(serde::de::Error::custom)
    }
}

pub(crate) fn serialize_checksum_addr<S>(val: &H160, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ethers_core::utils::to_checksum(val, None))
}

/// `u64` as a decimal string. Accepts strings or JSON numbers on the way in.
pub(crate) mod decimal_u64_ser {
    use serde::{Deserializer, Serializer};

    pub(crate) fn serialize<S>(val: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&val.to_string())
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let val = super::lenient_u256::deserialize(deserializer)?;
        if val.bits() > 64 {
            return Err(serde::de::Error::custom("value does not fit in u64"));
        }
        Ok(val.low_u64())
    }
}

/// `U256` as a decimal string. Accepts any form `lenient_u256` does.
pub(crate) mod decimal_u256_ser {
    use ethers_core::types::U256;
    use serde::{Deserializer, Serializer};

    pub(crate) fn serialize<S>(val: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&val.to_string())
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        super::lenient_u256::deserialize(deserializer)
    }
}

/// `U256` from a JSON number, a decimal string or a 0x-prefixed hex string.
/// Serializes as 0x-prefixed hex.
pub(crate) mod lenient_u256 {
    use ethers_core::types::U256;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Numeric {
        Num(u64),
        Str(String),
    }

    pub(crate) fn parse(s: &str) -> Result<U256, String> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => U256::from_str_radix(hex, 16).map_err(|e| e.to_string()),
            None => U256::from_dec_str(s).map_err(|e| e.to_string()),
        }
    }

    pub(crate) fn serialize<S>(val: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        val.serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Numeric::deserialize(deserializer)? {
            Numeric::Num(n) => Ok(n.into()),
            Numeric::Str(s) => parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Optional variant of `lenient_u256`. Use with `#[serde(default)]`.
pub(crate) mod lenient_u256_opt {
    use ethers_core::types::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    struct Wrapper(#[serde(with = "super::lenient_u256")] U256);

    pub(crate) fn serialize<S>(val: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match val {
            Some(val) => super::lenient_u256::serialize(val, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<U256>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
    }
}
