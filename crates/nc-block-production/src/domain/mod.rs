//! Block-production domain logic.

pub mod gas_limit;
pub mod ordering;
pub mod schedule;

pub use gas_limit::calc_gas_limit;
pub use ordering::TransactionsByPriceAndNonce;
pub use schedule::{end_time, next_slot};
