//! SeaORM entities backing the bill tracker.
//!
//! Money is stored as `Decimal(16, 2)` and every timestamp is server-local
//! `NaiveDateTime`, see [`crate::now`].

pub mod account;
pub mod category;
pub mod raw_sms_log;
pub mod transaction;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::account::Entity as Account;
    pub use super::category::Entity as Category;
    pub use super::raw_sms_log::Entity as RawSmsLog;
    pub use super::transaction::Entity as Transaction;
    pub use super::user::Entity as User;
}
