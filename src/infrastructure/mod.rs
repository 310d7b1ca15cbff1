//! 基础设施层：持有外部资源（存储、同步通道），只暴露能力

pub mod backoff;
pub mod channel;
pub mod memory_store;
pub mod rest_store;
pub mod store;

pub use backoff::{reconnect_delay, BackoffConfig};
pub use channel::{ChannelMessage, Subscription, SyncHub};
pub use memory_store::MemoryStore;
pub use rest_store::RestStore;
pub use store::{Actor, Role, SessionStore};
