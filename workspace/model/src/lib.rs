pub mod entities;

use chrono::NaiveDateTime;

// Re-export tracing for use in this crate
pub use tracing;

/// Wall-clock time used for every `created_at` / `updated_at` column.
///
/// Timestamps are stored as server-local naive date-times, which is also how
/// bank SMS messages report the moment of a transaction.
pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
