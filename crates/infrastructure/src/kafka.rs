//! Kafka 离线邮件投递
//!
//! 邮件负载发布到邮件主题，由平台的邮件服务消费。
//! 以会话 ID 作为分区键，同一会话的提醒保持有序。

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;

use application::{DispatchError, NotificationDispatcher, OfflineNotification};
use config::KafkaConfig;

/// 邮件主题的消息负载
#[derive(Debug, Serialize)]
struct MailPayload<'a> {
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

pub struct KafkaMailDispatcher {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
    retry_count: u32,
}

impl KafkaMailDispatcher {
    pub fn new(config: &KafkaConfig) -> Result<Self, DispatchError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.brokers.join(","))
            .set("message.timeout.ms", config.send_timeout_ms.to_string())
            .create()
            .map_err(|err| DispatchError::delivery(format!("创建 Kafka 生产者失败: {err}")))?;

        tracing::info!(
            brokers = %config.brokers.join(","),
            topic = %config.mail_topic,
            "Kafka 邮件生产者已创建"
        );

        Ok(Self {
            producer,
            topic: config.mail_topic.clone(),
            send_timeout: Duration::from_millis(u64::from(config.send_timeout_ms)),
            retry_count: config.retry_count,
        })
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for KafkaMailDispatcher {
    async fn dispatch(&self, notification: OfflineNotification) -> Result<(), DispatchError> {
        let payload = serde_json::to_string(&MailPayload {
            to: &notification.to,
            subject: &notification.subject,
            html: &notification.html,
        })
        .map_err(|err| DispatchError::delivery(format!("序列化邮件负载失败: {err}")))?;

        let key = notification.conversation_id.to_string();

        let mut attempt = 0u32;
        loop {
            let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

            match self
                .producer
                .send(record, Timeout::After(self.send_timeout))
                .await
            {
                Ok(_) => {
                    tracing::debug!(topic = %self.topic, key = %key, "离线邮件已发布");
                    return Ok(());
                }
                Err((err, _)) if attempt < self.retry_count => {
                    attempt += 1;
                    let backoff = Duration::from_millis(100 * 2u64.pow(attempt - 1));
                    tracing::warn!(
                        topic = %self.topic,
                        attempt,
                        error = %err,
                        "离线邮件发布失败，{}ms 后重试",
                        backoff.as_millis()
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err((err, _)) => {
                    return Err(DispatchError::delivery(format!(
                        "发布到主题 {} 失败: {err}",
                        self.topic
                    )));
                }
            }
        }
    }
}
