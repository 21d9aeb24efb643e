//! Persistence for trade orders, payments and refunds.
//!
//! Every function takes any [`sea_orm::ConnectionTrait`] so callers decide whether it runs on the
//! pool or inside their transaction. Status changes go through `transition`, a compare-and-swap on
//! the status column that reports whether the row was actually moved.

pub mod orders;
pub mod payments;
pub mod refunds;
