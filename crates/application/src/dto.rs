//! 对外数据传输对象
//!
//! 所有 JSON 字段统一使用 camelCase。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::{Conversation, ConversationMessage, ConversationSummary, Message, MessageKind, Timestamp};

/// 消息视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub content: String,
    pub message_type: MessageKind,
    pub is_read: bool,
    pub created_at: Timestamp,
}

impl MessageDto {
    pub fn from_message(message: &Message, sender_name: impl Into<String>) -> Self {
        Self {
            id: message.id.into(),
            conversation_id: message.conversation_id.into(),
            sender_id: message.sender_id.into(),
            sender_name: sender_name.into(),
            content: message.content.as_str().to_owned(),
            message_type: message.kind,
            is_read: message.is_read,
            created_at: message.created_at,
        }
    }
}

impl From<ConversationMessage> for MessageDto {
    fn from(value: ConversationMessage) -> Self {
        Self::from_message(&value.message, value.sender_name)
    }
}

/// 会话列表项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDto {
    pub id: Uuid,
    pub application_id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub applicant_id: Uuid,
    pub applicant_name: String,
    pub recruiter_id: Uuid,
    pub recruiter_name: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<Timestamp>,
    pub unread_count: i64,
    pub created_at: Timestamp,
}

impl From<ConversationSummary> for ConversationDto {
    fn from(summary: ConversationSummary) -> Self {
        let conversation = summary.conversation;
        Self {
            id: conversation.id.into(),
            application_id: conversation.application_id.into(),
            job_id: conversation.job_id.into(),
            job_title: summary.job_title,
            applicant_id: conversation.applicant_id.into(),
            applicant_name: summary.applicant_name,
            recruiter_id: conversation.recruiter_id.into(),
            recruiter_name: summary.recruiter_name,
            last_message: summary.last_message,
            last_message_at: conversation.last_message_at,
            unread_count: summary.unread_count,
            created_at: conversation.created_at,
        }
    }
}

/// 创建会话接口的返回视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedConversationDto {
    pub id: Uuid,
    pub application_id: Uuid,
    pub job_id: Uuid,
    pub applicant_id: Uuid,
    pub recruiter_id: Uuid,
    pub created_at: Timestamp,
    pub last_message_at: Option<Timestamp>,
}

impl From<Conversation> for CreatedConversationDto {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id.into(),
            application_id: conversation.application_id.into(),
            job_id: conversation.job_id.into(),
            applicant_id: conversation.applicant_id.into(),
            recruiter_id: conversation.recruiter_id.into(),
            created_at: conversation.created_at,
            last_message_at: conversation.last_message_at,
        }
    }
}

/// 历史消息分页
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHistoryPage {
    pub messages: Vec<MessageDto>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub has_more: bool,
}

/// 未读总数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountDto {
    pub unread_count: i64,
}

/// 正在输入通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    /// 展示名，客户端直接用于输入指示的文案
    pub user_name: String,
}

/// 已读回执通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadNotice {
    pub conversation_id: Uuid,
    pub read_by: Uuid,
}

/// 上线/离线通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceNotice {
    pub user_id: Uuid,
}

/// 个人频道的新消息提醒
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageNotice {
    pub conversation_id: Uuid,
    pub sender_name: String,
    pub message: MessageDto,
}

/// 作用于单个连接的错误帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotice {
    pub message: String,
}
