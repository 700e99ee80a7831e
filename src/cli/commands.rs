pub mod create_user;
pub mod hash_password;
pub mod initdb;
pub mod migrate_and_serve;
pub mod serve;

pub use create_user::create_user;
pub use hash_password::hash_password;
pub use initdb::init_database;
pub use migrate_and_serve::migrate_and_serve;
pub use serve::serve;
