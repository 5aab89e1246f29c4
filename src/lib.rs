//! EIP-712 payloads for gasless ERC-20 payments: EIP-2612 / Dai permits and
//! Gelato `SponsoredCallERC2771` meta-transactions.
//!
//! The crate builds the typed data, reads the handful of on-chain values the
//! payloads need (nonces, token names, versions) through an ethers
//! [`Middleware`](ethers_providers::Middleware), and leaves signing to any
//! [`ethers_signers::Signer`]. Signed sponsored calls are submitted and
//! tracked with [`RelayClient`] and [`RelayTask`].

#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![forbid(unsafe_code)]

#[macro_use]
pub(crate) mod macros;

/// Typed-data payloads and signatures
pub mod types;
pub use types::*;

/// lib utils
pub mod utils;

/// Serialization helpers
pub(crate) mod ser;
pub use ser::RsvSignature;

/// Read-only contract calls
pub mod contracts;

/// EIP-2612 and Dai permits
pub mod permit;
pub use permit::*;

/// Gelato sponsored calls
pub mod gelato;
pub use gelato::*;

/// Payment intents
pub mod intent;
pub use intent::*;

/// Request builders
pub mod builders;
pub use builders::*;

/// RPC request and response definitions
pub mod rpc;

/// Relay client
pub mod client;
pub use client::*;

/// Relay task tracking
pub mod task;
pub use task::*;

#[cfg(test)]
pub(crate) mod test_utils;
