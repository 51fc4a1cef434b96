//! 消息实体
//!
//! 消息只追加写入；`is_read` 由对方批量标记，发送者自己的消息不会被自己标记。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{ConversationId, MessageContent, MessageId, Timestamp, UserId};

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    File,
    Image,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::File => "file",
            MessageKind::Image => "image",
        }
    }
}

impl FromStr for MessageKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageKind::Text),
            "file" => Ok(MessageKind::File),
            "image" => Ok(MessageKind::Image),
            other => Err(DomainError::validation(
                "message_type",
                format!("unknown message type: {other}"),
            )),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub kind: MessageKind,
    pub is_read: bool,
    pub created_at: Timestamp,
}

impl Message {
    /// 创建一条新消息，初始为未读
    pub fn new(
        id: MessageId,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: MessageContent,
        kind: MessageKind,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender_id,
            content,
            kind,
            is_read: false,
            created_at: now,
        }
    }
}

/// 消息与发送者名称的聚合，用于历史与广播载荷
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub message: Message,
    pub sender_name: String,
}
