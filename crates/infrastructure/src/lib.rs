//! 基础设施层
//!
//! PostgreSQL 仓储、Redis 在线状态与跨实例广播、Kafka 邮件投递。

pub mod broadcast;
pub mod kafka;
pub mod presence;
pub mod redis_broadcast;
pub mod repository;

pub use broadcast::LocalEventBroadcaster;
pub use kafka::KafkaMailDispatcher;
pub use presence::RedisPresenceTracker;
pub use redis_broadcast::RedisEventBroadcaster;
pub use repository::{
    create_pg_pool, PgApplicationRepository, PgConversationRepository, PgMessageRepository,
    PgUserRepository,
};
