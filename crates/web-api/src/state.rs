//! 共享应用状态

use std::sync::Arc;

use application::{
    ConversationService, EventBroadcaster, IdentityService, MessageService, PresenceTracker,
};

use crate::auth::JwtService;
use crate::registry::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub identity_service: Arc<IdentityService>,
    pub conversation_service: Arc<ConversationService>,
    pub message_service: Arc<MessageService>,
    pub presence: Arc<dyn PresenceTracker>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub registry: Arc<RoomRegistry>,
    pub jwt_service: JwtService,
}
