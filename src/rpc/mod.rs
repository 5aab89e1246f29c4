//! Relay API request and response definitions

pub(crate) mod chains;
pub(crate) use chains::*;

pub(crate) mod sponsored_call;
pub use sponsored_call::*;

pub(crate) mod status;
pub use status::*;
