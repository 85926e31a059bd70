//! Supply math.

mod supply;

pub use supply::{circulating_supply, SupplyResult};
