// Thin re-export module: implementation is in `blockchain/core.rs` to allow
// progressive decomposition of ledger responsibilities (chain management,
// validation, replay queries, shared access).

pub mod core;
pub use core::*;
