//! Redis 跨实例事件广播
//!
//! 事件以 JSON 发布到单一频道；每个实例的后台任务订阅该频道，
//! 把收到的事件喂进本地扇出通道。本实例的事件同样经 Redis 回流，
//! 保证单实例与多实例行为一致。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use tokio::sync::broadcast;

use application::{BroadcastError, ChatEvent, EventBroadcaster, EventStream};

pub struct RedisEventBroadcaster {
    publisher: ConnectionManager,
    channel: String,
    fanout: broadcast::Sender<ChatEvent>,
}

impl RedisEventBroadcaster {
    /// 创建广播器并启动后台订阅任务
    ///
    /// 发布端是一个自动重连的共享连接；初始连接失败时立即报错，
    /// 让调用方能够降级到进程内广播。
    pub async fn connect(
        client: Arc<redis::Client>,
        channel: impl Into<String>,
        capacity: usize,
    ) -> Result<Self, BroadcastError> {
        let channel = channel.into();

        let publisher = client
            .get_connection_manager()
            .await
            .map_err(|err| BroadcastError::publish(err.to_string()))?;

        let (fanout, _) = broadcast::channel(capacity);
        tokio::spawn(run_subscriber(
            client.clone(),
            channel.clone(),
            fanout.clone(),
        ));

        Ok(Self {
            publisher,
            channel,
            fanout,
        })
    }
}

#[async_trait]
impl EventBroadcaster for RedisEventBroadcaster {
    async fn broadcast(&self, event: ChatEvent) -> Result<(), BroadcastError> {
        let payload =
            serde_json::to_string(&event).map_err(|err| BroadcastError::publish(err.to_string()))?;

        let mut conn = self.publisher.clone();

        redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|err| BroadcastError::publish(err.to_string()))
    }

    async fn subscribe(&self) -> Result<EventStream, BroadcastError> {
        Ok(EventStream::new(self.fanout.subscribe()))
    }
}

/// 订阅循环，连接断开后间隔重连
async fn run_subscriber(
    client: Arc<redis::Client>,
    channel: String,
    fanout: broadcast::Sender<ChatEvent>,
) {
    loop {
        match subscribe_once(&client, &channel, &fanout).await {
            Ok(()) => {
                tracing::warn!(channel = %channel, "Redis 订阅流结束，准备重连");
            }
            Err(err) => {
                tracing::warn!(channel = %channel, error = %err, "Redis 订阅失败，准备重连");
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

async fn subscribe_once(
    client: &redis::Client,
    channel: &str,
    fanout: &broadcast::Sender<ChatEvent>,
) -> Result<(), redis::RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(channel).await?;
    tracing::info!(channel = %channel, "已订阅 Redis 广播频道");

    let mut stream = pubsub.on_message();
    while let Some(message) = stream.next().await {
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "广播载荷读取失败，丢弃");
                continue;
            }
        };

        match serde_json::from_str::<ChatEvent>(&payload) {
            Ok(event) => {
                // 本实例没有连接时没有接收者，发送失败属正常
                let _ = fanout.send(event);
            }
            Err(err) => {
                tracing::warn!(error = %err, "广播事件反序列化失败，丢弃");
            }
        }
    }

    Ok(())
}
