//! DefiBank Exchange - Constant-product AMM
//!
//! One pool per unordered token pair, canonical ordering by token id. Pool
//! mutators are crate-private: every swap, mint and burn goes through the
//! `ExchangeRouter`, which quotes, enforces slippage/deadline, takes the
//! router fee and reports volume into the credit engine.

pub mod error;
pub mod pool;
pub mod router;

pub use error::ExchangeError;
pub use pool::{LiquidityPool, PoolKey, PoolSnapshot, MINIMUM_LIQUIDITY};
pub use router::ExchangeRouter;
