//! 应用层
//!
//! 会话用例的编排：身份解析、会话与消息服务，以及
//! 在线状态、事件广播、离线通知等能力端口。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod events;
pub mod notifier;
pub mod presence;
pub mod services;

pub use broadcaster::{BroadcastError, EventBroadcaster, EventStream};
pub use clock::{Clock, SystemClock};
pub use dto::{
    ConversationDto, CreatedConversationDto, ErrorNotice, MessageDto, MessageHistoryPage,
    NewMessageNotice, PresenceNotice, ReadNotice, TypingNotice, UnreadCountDto,
};
pub use error::ApplicationError;
pub use events::{ChatEvent, ConnectionId, EventScope, ServerEvent};
pub use notifier::{DispatchError, NoopNotificationDispatcher, NotificationDispatcher, OfflineNotification};
pub use presence::{PresenceError, PresenceTracker};
pub use services::{
    AuthenticatedUser, ConversationService, ConversationServiceDependencies, IdentityService,
    MessageService, MessageServiceDependencies, SendMessageRequest,
};
