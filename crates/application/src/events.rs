//! 广播事件模型
//!
//! 服务端推送帧统一为 `{"event": "...", "data": {...}}`，
//! 事件名与客户端约定保持 kebab-case。

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::{ConversationId, UserId};

use crate::dto::{
    ErrorNotice, MessageDto, NewMessageNotice, PresenceNotice, ReadNotice, TypingNotice,
};

/// 连接唯一标识
///
/// 全局唯一（UUIDv4），跨实例广播时用于排除发起连接。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 服务端推送事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewMessage(MessageDto),
    NewMessageNotification(NewMessageNotice),
    UserTyping(TypingNotice),
    UserStopTyping(TypingNotice),
    MessagesRead(ReadNotice),
    UserOnline(PresenceNotice),
    UserOffline(PresenceNotice),
    Error(ErrorNotice),
}

/// 事件的投递范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventScope {
    /// 会话房间内的所有连接
    Conversation(ConversationId),
    /// 某用户的全部连接（个人频道）
    User(UserId),
    /// 本服务的全部连接
    Global,
}

/// 一次广播：范围 + 可选排除连接 + 推送载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub scope: EventScope,
    pub except: Option<ConnectionId>,
    pub payload: ServerEvent,
}

impl ChatEvent {
    pub fn to_conversation(conversation: ConversationId, payload: ServerEvent) -> Self {
        Self {
            scope: EventScope::Conversation(conversation),
            except: None,
            payload,
        }
    }

    pub fn to_user(user: UserId, payload: ServerEvent) -> Self {
        Self {
            scope: EventScope::User(user),
            except: None,
            payload,
        }
    }

    pub fn global(payload: ServerEvent) -> Self {
        Self {
            scope: EventScope::Global,
            except: None,
            payload,
        }
    }

    pub fn except(mut self, connection: ConnectionId) -> Self {
        self.except = Some(connection);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_events_use_kebab_case_names() {
        let typing = ServerEvent::UserTyping(TypingNotice {
            conversation_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            user_name: "Alice".to_string(),
        });
        let value = serde_json::to_value(&typing).unwrap();
        assert_eq!(value["event"], "user-typing");
        assert_eq!(value["data"]["userName"], "Alice");
        assert!(value["data"]["userId"].is_string());

        let read = ServerEvent::MessagesRead(ReadNotice {
            conversation_id: Uuid::new_v4(),
            read_by: Uuid::new_v4(),
        });
        let value = serde_json::to_value(&read).unwrap();
        assert_eq!(value["event"], "messages-read");
        assert!(value["data"]["readBy"].is_string());

        let offline = ServerEvent::UserOffline(PresenceNotice {
            user_id: Uuid::new_v4(),
        });
        let value = serde_json::to_value(&offline).unwrap();
        assert_eq!(value["event"], "user-offline");
    }

    #[test]
    fn error_frame_shape() {
        let event = ServerEvent::Error(ErrorNotice {
            message: "not a participant".to_string(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "error", "data": {"message": "not a participant"}})
        );
    }

    #[test]
    fn chat_event_round_trips_for_transport() {
        let event = ChatEvent::to_conversation(
            ConversationId::from(Uuid::new_v4()),
            ServerEvent::UserTyping(TypingNotice {
                conversation_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                user_name: "Alice".to_string(),
            }),
        )
        .except(ConnectionId::generate());

        let json = serde_json::to_string(&event).unwrap();
        let back: ChatEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
