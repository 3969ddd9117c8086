// ==========================================
// 服装工厂 ERP - 实时层
// ==========================================
// 职责: 实时库接口、outbox 回放、事件通道与重连
// ==========================================

pub mod channel;
pub mod error;
pub mod relay;
pub mod store;

pub use channel::{connect_with_retry, EventTransport, LocalEventHub, ReconnectPolicy};
pub use error::{RealtimeError, RealtimeResult};
pub use relay::{OutboxRelay, ReplaySummary, DEFAULT_BATCH_SIZE};
pub use store::{MemoryRealtimeStore, RealtimeChange, RealtimeStore};
