//! 事件广播端口
//!
//! 发送侧只负责向广播器发布事件，连接侧通过订阅流接收；
//! 单实例用进程内实现，多实例通过 Redis Pub/Sub 承载。

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::events::ChatEvent;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("广播通道已关闭")]
    ChannelClosed,
    #[error("发布失败: {message}")]
    Publish { message: String },
}

impl BroadcastError {
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }
}

/// 事件广播器
#[async_trait]
pub trait EventBroadcaster: Send + Sync {
    async fn broadcast(&self, event: ChatEvent) -> Result<(), BroadcastError>;

    async fn subscribe(&self) -> Result<EventStream, BroadcastError>;
}

/// 广播事件的订阅流
///
/// 消费过慢丢失的事件（Lagged）会被跳过，流不会因此中断。
pub struct EventStream {
    receiver: broadcast::Receiver<ChatEvent>,
}

impl EventStream {
    pub fn new(receiver: broadcast::Receiver<ChatEvent>) -> Self {
        Self { receiver }
    }

    /// 接收下一个事件；通道关闭时返回 `None`
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "事件订阅滞后，部分事件被跳过");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
