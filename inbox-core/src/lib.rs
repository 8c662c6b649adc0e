pub mod config;
pub mod context;
pub mod db;
pub mod notifications;
pub mod queue;
pub mod redis;
pub mod schema;
pub mod signature;
pub mod status;
pub mod types;

pub use config::Config;
pub use context::InboxContext;
pub use db::DbPool;
pub use redis::RedisPool;
pub use signature::{verify_webhook_signature, SignatureError};
pub use status::{can_transition, ItemStatus};
