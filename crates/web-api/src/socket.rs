//! WebSocket 连接处理
//!
//! 客户端帧与服务端帧统一为 `{"event": "...", "data": {...}}`。
//! 连接升级前已完成认证，这里只做会话级鉴权与事件路由。

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use uuid::Uuid;

use application::{
    AuthenticatedUser, ChatEvent, ConnectionId, ErrorNotice, PresenceNotice, ReadNotice,
    SendMessageRequest, ServerEvent, TypingNotice,
};
use domain::{ConversationId, MessageKind};

use crate::state::AppState;

/// 客户端帧
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinConversation { conversation_id: Uuid },
    #[serde(rename_all = "camelCase")]
    LeaveConversation { conversation_id: Uuid },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        conversation_id: Uuid,
        content: String,
        #[serde(default)]
        message_type: MessageKind,
    },
    #[serde(rename_all = "camelCase")]
    Typing { conversation_id: Uuid },
    #[serde(rename_all = "camelCase")]
    StopTyping { conversation_id: Uuid },
    #[serde(rename_all = "camelCase")]
    MarkRead { conversation_id: Uuid },
    Heartbeat,
}

/// 启动广播中继任务
///
/// 订阅集群广播流，把事件派发到本实例的连接。
/// 订阅中断后间隔重连。
pub fn spawn_event_relay(state: AppState) {
    tokio::spawn(async move {
        loop {
            match state.broadcaster.subscribe().await {
                Ok(mut stream) => {
                    while let Some(event) = stream.recv().await {
                        state.registry.dispatch(&event).await;
                    }
                    tracing::warn!("广播流结束，准备重新订阅");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "广播订阅失败，准备重试");
                }
            }
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
    });
}

/// 单个 WebSocket 连接的完整生命周期
pub async fn handle_socket(socket: WebSocket, user: AuthenticatedUser, state: AppState) {
    let connection_id = ConnectionId::generate();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = unbounded_channel::<String>();

    state.registry.connect(connection_id, user.id, tx.clone()).await;

    if let Err(err) = state.presence.mark_online(user.id).await {
        tracing::warn!(user_id = %user.id, error = %err, "上线状态写入失败");
    }

    broadcast_presence(
        &state,
        ServerEvent::UserOnline(PresenceNotice {
            user_id: user.id.into(),
        }),
        connection_id,
    )
    .await;

    tracing::info!(user_id = %user.id, connection_id = %connection_id, "WebSocket 连接建立");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_user = user.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = ws_receiver.next().await {
            match message {
                WsMessage::Text(text) => {
                    handle_frame(&recv_state, &recv_user, connection_id, &tx, text.as_str()).await;
                }
                WsMessage::Close(_) => break,
                _ => {}
            }
        }
    });

    // 任一方向结束即关闭连接
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.disconnect(connection_id).await;

    // 最后一个连接断开才算真正离线
    if !state.registry.has_connections(user.id).await {
        if let Err(err) = state.presence.mark_offline(user.id).await {
            tracing::warn!(user_id = %user.id, error = %err, "离线状态写入失败");
        }

        broadcast_presence(
            &state,
            ServerEvent::UserOffline(PresenceNotice {
                user_id: user.id.into(),
            }),
            connection_id,
        )
        .await;
    }

    tracing::info!(user_id = %user.id, connection_id = %connection_id, "WebSocket 连接关闭");
}

async fn handle_frame(
    state: &AppState,
    user: &AuthenticatedUser,
    connection_id: ConnectionId,
    tx: &UnboundedSender<String>,
    raw: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(raw) {
        Ok(event) => event,
        Err(err) => {
            tracing::debug!(user_id = %user.id, error = %err, "客户端帧解析失败");
            send_error(tx, "invalid frame");
            return;
        }
    };

    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            let conversation_id = ConversationId::from(conversation_id);
            match state
                .conversation_service
                .ensure_party(user.id, conversation_id)
                .await
            {
                Ok(_) => {
                    state.registry.join_room(connection_id, conversation_id).await;
                    tracing::debug!(
                        user_id = %user.id,
                        conversation_id = %conversation_id,
                        "已加入会话房间"
                    );
                }
                Err(err) => {
                    tracing::debug!(user_id = %user.id, error = %err, "加入会话被拒绝");
                    send_error(tx, "not a participant of this conversation");
                }
            }
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            state
                .registry
                .leave_room(connection_id, ConversationId::from(conversation_id))
                .await;
        }
        ClientEvent::SendMessage {
            conversation_id,
            content,
            message_type,
        } => {
            let request = SendMessageRequest {
                conversation_id,
                content,
                kind: message_type,
            };
            if let Err(err) = state.message_service.send_message(user, request).await {
                tracing::debug!(user_id = %user.id, error = %err, "消息发送失败");
                send_error(tx, &err.to_string());
            }

            // 发消息视为活跃，顺带续期在线状态
            refresh_presence(state, user.id);
        }
        ClientEvent::Typing { conversation_id } => {
            relay_typing(state, user, connection_id, conversation_id, true).await;
        }
        ClientEvent::StopTyping { conversation_id } => {
            relay_typing(state, user, connection_id, conversation_id, false).await;
        }
        ClientEvent::MarkRead { conversation_id } => {
            let conversation_id = ConversationId::from(conversation_id);
            match state
                .conversation_service
                .mark_read(user.id, conversation_id)
                .await
            {
                Ok(_) => {
                    let event = ChatEvent::to_conversation(
                        conversation_id,
                        ServerEvent::MessagesRead(ReadNotice {
                            conversation_id: conversation_id.into(),
                            read_by: user.id.into(),
                        }),
                    )
                    .except(connection_id);
                    if let Err(err) = state.broadcaster.broadcast(event).await {
                        tracing::warn!(error = %err, "已读回执广播失败");
                    }
                }
                Err(err) => {
                    tracing::debug!(user_id = %user.id, error = %err, "标记已读失败");
                    send_error(tx, &err.to_string());
                }
            }
        }
        ClientEvent::Heartbeat => {
            refresh_presence(state, user.id);
        }
    }
}

/// 正在输入指示是瞬态事件，只发给已加入房间的其他连接，不落库
async fn relay_typing(
    state: &AppState,
    user: &AuthenticatedUser,
    connection_id: ConnectionId,
    conversation_id: Uuid,
    typing: bool,
) {
    let conversation = ConversationId::from(conversation_id);
    if !state.registry.in_room(connection_id, conversation).await {
        return;
    }

    let notice = TypingNotice {
        conversation_id,
        user_id: user.id.into(),
        user_name: user.name.clone(),
    };
    let payload = if typing {
        ServerEvent::UserTyping(notice)
    } else {
        ServerEvent::UserStopTyping(notice)
    };

    let event = ChatEvent::to_conversation(conversation, payload).except(connection_id);
    if let Err(err) = state.broadcaster.broadcast(event).await {
        tracing::debug!(error = %err, "输入指示广播失败");
    }
}

fn refresh_presence(state: &AppState, user: domain::UserId) {
    let presence = Arc::clone(&state.presence);
    tokio::spawn(async move {
        if let Err(err) = presence.heartbeat(user).await {
            tracing::warn!(user_id = %user, error = %err, "心跳续期失败");
        }
    });
}

async fn broadcast_presence(state: &AppState, payload: ServerEvent, origin: ConnectionId) {
    let event = ChatEvent::global(payload).except(origin);
    if let Err(err) = state.broadcaster.broadcast(event).await {
        tracing::warn!(error = %err, "在线状态广播失败");
    }
}

fn send_error(tx: &UnboundedSender<String>, message: &str) {
    let frame = ServerEvent::Error(ErrorNotice {
        message: message.to_string(),
    });
    match serde_json::to_string(&frame) {
        Ok(frame) => {
            let _ = tx.send(frame);
        }
        Err(err) => {
            tracing::warn!(error = %err, "错误帧序列化失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frames_parse_from_wire_format() {
        let id = Uuid::new_v4();

        let frame = format!(r#"{{"event":"join-conversation","data":{{"conversationId":"{id}"}}}}"#);
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(&frame).unwrap(),
            ClientEvent::JoinConversation { conversation_id } if conversation_id == id
        ));

        let frame = format!(
            r#"{{"event":"send-message","data":{{"conversationId":"{id}","content":"hi"}}}}"#
        );
        match serde_json::from_str::<ClientEvent>(&frame).unwrap() {
            ClientEvent::SendMessage {
                conversation_id,
                content,
                message_type,
            } => {
                assert_eq!(conversation_id, id);
                assert_eq!(content, "hi");
                assert_eq!(message_type, MessageKind::Text);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let frame = format!(r#"{{"event":"stop-typing","data":{{"conversationId":"{id}"}}}}"#);
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(&frame).unwrap(),
            ClientEvent::StopTyping { .. }
        ));

        let frame = r#"{"event":"heartbeat"}"#;
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(frame).unwrap(),
            ClientEvent::Heartbeat
        ));
    }

    #[test]
    fn explicit_message_type_is_honored() {
        let id = Uuid::new_v4();
        let frame = format!(
            r#"{{"event":"send-message","data":{{"conversationId":"{id}","content":"f","messageType":"file"}}}}"#
        );
        assert!(matches!(
            serde_json::from_str::<ClientEvent>(&frame).unwrap(),
            ClientEvent::SendMessage {
                message_type: MessageKind::File,
                ..
            }
        ));
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<ClientEvent>(r#"{"event":"shutdown"}"#).is_err());
    }
}
