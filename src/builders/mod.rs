mod sponsored_call;
pub use sponsored_call::*;
