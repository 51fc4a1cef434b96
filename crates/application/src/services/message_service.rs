//! 消息服务
//!
//! 消息发送管线：验证 → 鉴权 → 持久化 → 房间广播 → 个人频道提醒
//! → 在线检查 → 离线邮件。持久化失败前不产生任何广播；
//! 持久化成功后，后续环节失败只记录日志，发送方仍视为成功。

use std::sync::Arc;

use uuid::Uuid;

use domain::{
    ApplicationRepository, Conversation, ConversationId, ConversationRepository, DomainError,
    Message, MessageContent, MessageId, MessageKind, MessageRepository, UserId, UserRepository,
};

use crate::broadcaster::EventBroadcaster;
use crate::clock::Clock;
use crate::dto::{MessageDto, NewMessageNotice};
use crate::error::ApplicationError;
use crate::events::{ChatEvent, ServerEvent};
use crate::notifier::{NotificationDispatcher, OfflineNotification};
use crate::presence::PresenceTracker;
use crate::services::{bounded, AuthenticatedUser};

/// 邮件预览的截断长度（字符）
const MAIL_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub conversation_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
}

pub struct MessageServiceDependencies {
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub user_repository: Arc<dyn UserRepository>,
    pub application_repository: Arc<dyn ApplicationRepository>,
    pub presence: Arc<dyn PresenceTracker>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
    /// 前端地址，用于拼接邮件中的会话深链
    pub frontend_url: String,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn send_message(
        &self,
        sender: &AuthenticatedUser,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let content = MessageContent::new(request.content)?;
        let conversation_id = ConversationId::from(request.conversation_id);

        let conversation = bounded(self.deps.conversation_repository.find_by_id(conversation_id))
            .await?
            .ok_or_else(|| DomainError::not_found("conversation", conversation_id))?;
        conversation.ensure_party(sender.id)?;

        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            conversation_id,
            sender.id,
            content,
            request.kind,
            self.deps.clock.now(),
        );

        // 持久化是广播的前置条件
        let stored = bounded(self.deps.message_repository.create(message)).await?;
        let dto = MessageDto::from_message(&stored, sender.name.clone());

        // 房间广播，包含发送者自己的其他连接
        if let Err(err) = self
            .deps
            .broadcaster
            .broadcast(ChatEvent::to_conversation(
                conversation_id,
                ServerEvent::NewMessage(dto.clone()),
            ))
            .await
        {
            tracing::warn!(
                conversation_id = %conversation_id,
                message_id = %stored.id,
                error = %err,
                "消息已持久化，但房间广播失败"
            );
        }

        let recipient_id = conversation
            .other_party(sender.id)
            .ok_or_else(|| DomainError::forbidden("send message"))?;

        // 个人频道提醒，无论对方是否加入房间
        if let Err(err) = self
            .deps
            .broadcaster
            .broadcast(ChatEvent::to_user(
                recipient_id,
                ServerEvent::NewMessageNotification(NewMessageNotice {
                    conversation_id: conversation_id.into(),
                    sender_name: sender.name.clone(),
                    message: dto.clone(),
                }),
            ))
            .await
        {
            tracing::warn!(
                recipient = %recipient_id,
                error = %err,
                "个人频道提醒广播失败"
            );
        }

        // 在线检查失败时按在线处理，宁可少发也不重复打扰
        match self.deps.presence.is_online(recipient_id).await {
            Ok(true) => {}
            Ok(false) => {
                self.dispatch_offline_mail(&conversation, sender, recipient_id, &stored)
                    .await;
            }
            Err(err) => {
                tracing::warn!(
                    recipient = %recipient_id,
                    error = %err,
                    "在线状态检查失败，按在线处理，跳过离线邮件"
                );
            }
        }

        Ok(dto)
    }

    /// 渲染并投递离线提醒邮件，整个环节尽力而为
    async fn dispatch_offline_mail(
        &self,
        conversation: &Conversation,
        sender: &AuthenticatedUser,
        recipient_id: UserId,
        message: &Message,
    ) {
        let recipient = match bounded(self.deps.user_repository.find_by_id(recipient_id)).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(recipient = %recipient_id, "收件人不存在，跳过离线邮件");
                return;
            }
            Err(err) => {
                tracing::warn!(recipient = %recipient_id, error = %err, "收件人查询失败，跳过离线邮件");
                return;
            }
        };

        let job_title = match bounded(
            self.deps
                .application_repository
                .find_job_title(conversation.job_id),
        )
        .await
        {
            Ok(Some(title)) => title,
            Ok(None) => "the position".to_string(),
            Err(err) => {
                tracing::warn!(job_id = %conversation.job_id, error = %err, "职位查询失败，使用占位标题");
                "the position".to_string()
            }
        };

        let link = format!(
            "{}/chat/{}",
            self.deps.frontend_url.trim_end_matches('/'),
            conversation.id
        );
        let notification = OfflineNotification::new_message(
            &recipient,
            &sender.name,
            &job_title,
            &message.content.preview(MAIL_PREVIEW_CHARS),
            &link,
            conversation.id,
        );

        match self.deps.dispatcher.dispatch(notification).await {
            Ok(()) => {
                tracing::debug!(
                    recipient = %recipient_id,
                    conversation_id = %conversation.id,
                    "离线邮件已入队"
                );
            }
            Err(err) => {
                tracing::warn!(
                    recipient = %recipient_id,
                    conversation_id = %conversation.id,
                    error = %err,
                    "离线邮件投递失败"
                );
            }
        }
    }
}
