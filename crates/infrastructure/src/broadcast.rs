//! 进程内事件广播
//!
//! 单实例部署或 Redis 不可用时的广播实现，
//! 基于 tokio broadcast 通道。

use async_trait::async_trait;
use tokio::sync::broadcast;

use application::{BroadcastError, ChatEvent, EventBroadcaster, EventStream};

pub struct LocalEventBroadcaster {
    sender: broadcast::Sender<ChatEvent>,
}

impl LocalEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

#[async_trait]
impl EventBroadcaster for LocalEventBroadcaster {
    async fn broadcast(&self, event: ChatEvent) -> Result<(), BroadcastError> {
        // 无订阅者时发送必然失败，直接视为成功
        if self.sender.receiver_count() == 0 {
            return Ok(());
        }
        self.sender
            .send(event)
            .map(|_| ())
            .map_err(|_| BroadcastError::ChannelClosed)
    }

    async fn subscribe(&self) -> Result<EventStream, BroadcastError> {
        Ok(EventStream::new(self.sender.subscribe()))
    }
}
