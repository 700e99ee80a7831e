//! Turning bank SMS forwarded by the iOS shortcut into transactions.

pub mod parser;
pub mod processing;

pub use parser::{DeepSeekParser, ParserError, TransactionParser};
pub use processing::{ProcessOutcome, SmsMessage, SmsProcessor};
