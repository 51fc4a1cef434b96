//! Redis 在线状态实现
//!
//! 每个在线用户一个带 TTL 的键，心跳续期，过期即视为离线。
//! 所有操作复用同一个自动重连的连接，断连期间的错误
//! 由调用方按"在线"兜底处理。

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use application::{PresenceError, PresenceTracker};
use domain::UserId;

pub struct RedisPresenceTracker {
    manager: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisPresenceTracker {
    /// 建立连接管理器；初始连接失败时报错
    pub async fn connect(
        client: &redis::Client,
        ttl_seconds: u64,
    ) -> Result<Self, PresenceError> {
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|err| PresenceError::unavailable(err.to_string()))?;

        Ok(Self {
            manager,
            ttl_seconds,
        })
    }

    fn key(user: UserId) -> String {
        format!("presence:{user}")
    }

    async fn set_with_ttl(&self, user: UserId) -> Result<(), PresenceError> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::key(user), "1", self.ttl_seconds)
            .await
            .map_err(|err| PresenceError::unavailable(err.to_string()))
    }
}

#[async_trait]
impl PresenceTracker for RedisPresenceTracker {
    async fn mark_online(&self, user: UserId) -> Result<(), PresenceError> {
        self.set_with_ttl(user).await
    }

    /// 心跳与上线等价，均为重置 TTL
    async fn heartbeat(&self, user: UserId) -> Result<(), PresenceError> {
        self.set_with_ttl(user).await
    }

    async fn is_online(&self, user: UserId) -> Result<bool, PresenceError> {
        let mut conn = self.manager.clone();
        conn.exists(Self::key(user))
            .await
            .map_err(|err| PresenceError::unavailable(err.to_string()))
    }

    async fn mark_offline(&self, user: UserId) -> Result<(), PresenceError> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(Self::key(user))
            .await
            .map_err(|err| PresenceError::unavailable(err.to_string()))
    }
}
