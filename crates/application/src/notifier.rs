//! 离线通知端口
//!
//! 接收方离线时，发送一封渲染好的提醒邮件到邮件队列。
//! 投递是尽力而为的：失败只记录日志，不影响消息发送。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use domain::{ConversationId, User};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("通知投递失败: {message}")]
    Delivery { message: String },
}

impl DispatchError {
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery {
            message: message.into(),
        }
    }
}

/// 渲染好的离线提醒邮件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineNotification {
    pub to: String,
    pub subject: String,
    pub html: String,
    /// 用作消息队列的分区键，保证同一会话的通知有序
    pub conversation_id: ConversationId,
}

impl OfflineNotification {
    /// 渲染"收到新消息"提醒
    pub fn new_message(
        recipient: &User,
        sender_name: &str,
        job_title: &str,
        preview: &str,
        link: &str,
        conversation_id: ConversationId,
    ) -> Self {
        let subject = format!("New message from {} - HireHeaven", sender_name);
        let html = format!(
            "<h2>You have a new message</h2>\
             <p>Hi {recipient_name},</p>\
             <p><strong>{sender_name}</strong> sent you a message about the position \
             <strong>{job_title}</strong>:</p>\
             <blockquote>{preview}</blockquote>\
             <p><a href=\"{link}\">Reply in HireHeaven</a></p>",
            recipient_name = recipient.name,
        );
        Self {
            to: recipient.email.clone(),
            subject,
            html,
            conversation_id,
        }
    }
}

/// 离线通知分发器
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: OfflineNotification) -> Result<(), DispatchError>;
}

/// 空实现：邮件队列不可用时的降级方案，只记录日志
#[derive(Debug, Default)]
pub struct NoopNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopNotificationDispatcher {
    async fn dispatch(&self, notification: OfflineNotification) -> Result<(), DispatchError> {
        tracing::warn!(
            to = %notification.to,
            conversation_id = %notification.conversation_id,
            "邮件队列未启用，丢弃离线通知"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{UserId, UserRole};
    use uuid::Uuid;

    #[test]
    fn rendered_notification_carries_sender_and_link() {
        let recipient = User {
            id: UserId::from(Uuid::new_v4()),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            role: UserRole::Applicant,
        };
        let conversation_id = ConversationId::from(Uuid::new_v4());
        let notification = OfflineNotification::new_message(
            &recipient,
            "Bob",
            "Backend Engineer",
            "hello there",
            "http://localhost:3000/chat/abc",
            conversation_id,
        );

        assert_eq!(notification.to, "alice@example.com");
        assert_eq!(notification.subject, "New message from Bob - HireHeaven");
        assert!(notification.html.contains("Hi Alice"));
        assert!(notification.html.contains("Backend Engineer"));
        assert!(notification.html.contains("<blockquote>hello there</blockquote>"));
        assert!(notification.html.contains("http://localhost:3000/chat/abc"));
    }
}
