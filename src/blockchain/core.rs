// core.rs splits responsibilities into submodules for easier maintenance.
pub mod chain;
pub mod query;
pub mod shared;
pub mod validation;

pub use chain::*;
pub use shared::*;
pub use validation::*;
