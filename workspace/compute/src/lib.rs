//! Pure domain computation shared by the HTTP layer and the SMS pipeline:
//! bill statistics, idempotency keys and the reading of AI parser output.
//!
//! Nothing in here talks to the database; callers load the rows and hand
//! them over.

pub mod error;
pub mod idempotency;
pub mod parsing;
pub mod statistics;

pub use error::{ComputeError, Result};
pub use idempotency::{IdempotencyGuard, idempotency_key};
pub use parsing::{ParsedTransaction, clean_ai_response, parse_ai_response, parse_transaction_time};
pub use statistics::{CategoryStats, StatsSummary, category_breakdown, summarize};
