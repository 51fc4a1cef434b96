//! 房间与个人频道注册表
//!
//! 维护三张表：连接、会话房间、用户个人频道。
//! 一个用户可以有多个连接（多标签页），每个连接可加入多个房间。
//! 锁的获取顺序固定为 connections → rooms → users。

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;

use application::{ChatEvent, ConnectionId, EventScope};
use domain::{ConversationId, UserId};

type FrameSender = UnboundedSender<String>;

struct ConnectionHandle {
    user_id: UserId,
    sender: FrameSender,
    joined: HashSet<ConversationId>,
}

#[derive(Default)]
pub struct RoomRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    rooms: RwLock<HashMap<ConversationId, HashMap<ConnectionId, FrameSender>>>,
    users: RwLock<HashMap<UserId, HashMap<ConnectionId, FrameSender>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册连接并接入用户的个人频道
    pub async fn connect(&self, connection: ConnectionId, user: UserId, sender: FrameSender) {
        self.connections.write().await.insert(
            connection,
            ConnectionHandle {
                user_id: user,
                sender: sender.clone(),
                joined: HashSet::new(),
            },
        );
        self.users
            .write()
            .await
            .entry(user)
            .or_default()
            .insert(connection, sender);
    }

    /// 连接加入会话房间
    pub async fn join_room(&self, connection: ConnectionId, conversation: ConversationId) {
        let mut connections = self.connections.write().await;
        let Some(handle) = connections.get_mut(&connection) else {
            return;
        };
        handle.joined.insert(conversation);
        let sender = handle.sender.clone();
        drop(connections);

        self.rooms
            .write()
            .await
            .entry(conversation)
            .or_default()
            .insert(connection, sender);
    }

    /// 连接离开会话房间
    pub async fn leave_room(&self, connection: ConnectionId, conversation: ConversationId) {
        let mut connections = self.connections.write().await;
        if let Some(handle) = connections.get_mut(&connection) {
            handle.joined.remove(&conversation);
        }
        drop(connections);

        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&conversation) {
            members.remove(&connection);
            if members.is_empty() {
                rooms.remove(&conversation);
            }
        }
    }

    /// 注销连接，清理其所有房间与个人频道，返回所属用户
    pub async fn disconnect(&self, connection: ConnectionId) -> Option<UserId> {
        let handle = self.connections.write().await.remove(&connection)?;

        let mut rooms = self.rooms.write().await;
        for conversation in &handle.joined {
            if let Some(members) = rooms.get_mut(conversation) {
                members.remove(&connection);
                if members.is_empty() {
                    rooms.remove(conversation);
                }
            }
        }
        drop(rooms);

        let mut users = self.users.write().await;
        if let Some(channels) = users.get_mut(&handle.user_id) {
            channels.remove(&connection);
            if channels.is_empty() {
                users.remove(&handle.user_id);
            }
        }

        Some(handle.user_id)
    }

    /// 用户当前是否还有存活连接
    pub async fn has_connections(&self, user: UserId) -> bool {
        self.users.read().await.contains_key(&user)
    }

    /// 连接是否已加入某会话房间
    pub async fn in_room(&self, connection: ConnectionId, conversation: ConversationId) -> bool {
        self.connections
            .read()
            .await
            .get(&connection)
            .is_some_and(|handle| handle.joined.contains(&conversation))
    }

    /// 把事件投递到其范围内的所有本地连接
    ///
    /// 载荷只序列化一次；发送失败说明连接已关闭，静默跳过，
    /// 等其接收任务退出时统一清理。
    pub async fn dispatch(&self, event: &ChatEvent) {
        let frame = match serde_json::to_string(&event.payload) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "推送帧序列化失败，丢弃");
                return;
            }
        };

        match event.scope {
            EventScope::Conversation(conversation) => {
                let rooms = self.rooms.read().await;
                if let Some(members) = rooms.get(&conversation) {
                    for (connection, sender) in members {
                        if Some(*connection) == event.except {
                            continue;
                        }
                        let _ = sender.send(frame.clone());
                    }
                }
            }
            EventScope::User(user) => {
                let users = self.users.read().await;
                if let Some(channels) = users.get(&user) {
                    for (connection, sender) in channels {
                        if Some(*connection) == event.except {
                            continue;
                        }
                        let _ = sender.send(frame.clone());
                    }
                }
            }
            EventScope::Global => {
                let connections = self.connections.read().await;
                for (connection, handle) in connections.iter() {
                    if Some(*connection) == event.except {
                        continue;
                    }
                    let _ = handle.sender.send(frame.clone());
                }
            }
        }
    }
}
