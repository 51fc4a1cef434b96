//! 在线状态端口
//!
//! 基于 TTL 的键值记录：连接建立时写入，心跳续期，
//! TTL 过期或连接断开即视为离线。

use async_trait::async_trait;
use thiserror::Error;

use domain::UserId;

#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("在线状态存储不可用: {message}")]
    Unavailable { message: String },
}

impl PresenceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// 在线状态跟踪器
#[async_trait]
pub trait PresenceTracker: Send + Sync {
    /// 连接建立时记录在线，并设置 TTL
    async fn mark_online(&self, user: UserId) -> Result<(), PresenceError>;

    /// 心跳续期
    async fn heartbeat(&self, user: UserId) -> Result<(), PresenceError>;

    async fn is_online(&self, user: UserId) -> Result<bool, PresenceError>;

    /// 连接断开时主动清除
    async fn mark_offline(&self, user: UserId) -> Result<(), PresenceError>;
}

/// 内存实现的在线状态跟踪器（用于测试，不模拟 TTL 过期）
pub mod memory {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct MemoryPresenceTracker {
        online: RwLock<HashSet<UserId>>,
    }

    impl MemoryPresenceTracker {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl PresenceTracker for MemoryPresenceTracker {
        async fn mark_online(&self, user: UserId) -> Result<(), PresenceError> {
            self.online.write().await.insert(user);
            Ok(())
        }

        async fn heartbeat(&self, user: UserId) -> Result<(), PresenceError> {
            self.online.write().await.insert(user);
            Ok(())
        }

        async fn is_online(&self, user: UserId) -> Result<bool, PresenceError> {
            Ok(self.online.read().await.contains(&user))
        }

        async fn mark_offline(&self, user: UserId) -> Result<(), PresenceError> {
            self.online.write().await.remove(&user);
            Ok(())
        }
    }
}
