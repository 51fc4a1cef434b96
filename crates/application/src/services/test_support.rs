//! 服务测试共用的内存夹具

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use domain::{
    ApplicationId, ApplicationRepository, Conversation, ConversationId, ConversationMessage,
    ConversationRepository, ConversationSummary, JobApplication, JobId, Message,
    MessageRepository, RepositoryError, Timestamp, User, UserId, UserRepository, UserRole,
};

use crate::broadcaster::{BroadcastError, EventBroadcaster, EventStream};
use crate::clock::Clock;
use crate::events::ChatEvent;
use crate::presence::{PresenceError, PresenceTracker};
use crate::services::AuthenticatedUser;

pub fn user(name: &str, role: UserRole) -> User {
    User {
        id: UserId::from(Uuid::new_v4()),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
    }
}

pub fn authenticated(user: &User) -> AuthenticatedUser {
    AuthenticatedUser {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

pub fn application_between(applicant: &User, recruiter: &User) -> JobApplication {
    JobApplication {
        id: ApplicationId::from(Uuid::new_v4()),
        job_id: JobId::from(Uuid::new_v4()),
        applicant_id: applicant.id,
        recruiter_id: recruiter.id,
        job_title: "Backend Engineer".to_string(),
    }
}

pub fn conversation_between(applicant: &User, recruiter: &User) -> Conversation {
    Conversation::open(
        ConversationId::from(Uuid::new_v4()),
        &application_between(applicant, recruiter),
        Utc::now(),
    )
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    conversations: Mutex<Vec<Conversation>>,
    summaries: Mutex<Vec<ConversationSummary>>,
}

impl InMemoryConversationRepository {
    pub fn with(conversations: Vec<Conversation>) -> Self {
        Self {
            conversations: Mutex::new(conversations),
            summaries: Mutex::new(Vec::new()),
        }
    }

    pub fn push_summary(&self, summary: ConversationSummary) {
        self.summaries.lock().unwrap().push(summary);
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn create(&self, conversation: Conversation) -> Result<Conversation, RepositoryError> {
        let mut conversations = self.conversations.lock().unwrap();
        if let Some(existing) = conversations
            .iter()
            .find(|c| c.application_id == conversation.application_id)
        {
            return Ok(existing.clone());
        }
        conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_by_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.application_id == id)
            .cloned())
    }

    async fn list_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        Ok(self
            .summaries
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.conversation.is_party(user))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    messages: Mutex<Vec<Message>>,
    sender_names: Mutex<HashMap<UserId, String>>,
    fail_create: AtomicBool,
}

impl InMemoryMessageRepository {
    pub fn register_sender(&self, user: &User) {
        self.sender_names
            .lock()
            .unwrap()
            .insert(user.id, user.name.clone());
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::storage("simulated write failure"));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn list_page(
        &self,
        conversation: ConversationId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let names = self.sender_names.lock().unwrap().clone();
        let mut rows: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(Uuid::from(a.id).cmp(&Uuid::from(b.id)))
        });
        Ok(rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|message| {
                let sender_name = names
                    .get(&message.sender_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                ConversationMessage {
                    message,
                    sender_name,
                }
            })
            .collect())
    }

    async fn count(&self, conversation: ConversationId) -> Result<i64, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation)
            .count() as i64)
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
    ) -> Result<u64, RepositoryError> {
        let mut updated = 0;
        for message in self.messages.lock().unwrap().iter_mut() {
            if message.conversation_id == conversation
                && message.sender_id != reader
                && !message.is_read
            {
                message.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn unread_total(&self, user: UserId) -> Result<i64, RepositoryError> {
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.sender_id != user && !m.is_read)
            .count() as i64)
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: Mutex<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryApplicationRepository {
    applications: Mutex<HashMap<ApplicationId, JobApplication>>,
}

impl InMemoryApplicationRepository {
    pub fn insert(&self, application: JobApplication) {
        self.applications
            .lock()
            .unwrap()
            .insert(application.id, application);
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn find_by_id(
        &self,
        id: ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        Ok(self.applications.lock().unwrap().get(&id).cloned())
    }

    async fn find_job_title(&self, id: JobId) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .applications
            .lock()
            .unwrap()
            .values()
            .find(|a| a.job_id == id)
            .map(|a| a.job_title.clone()))
    }
}

/// 记录所有广播事件的广播器
#[derive(Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingBroadcaster {
    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, event: ChatEvent) -> Result<(), BroadcastError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn subscribe(&self) -> Result<EventStream, BroadcastError> {
        let (_, receiver) = tokio::sync::broadcast::channel(1);
        Ok(EventStream::new(receiver))
    }
}

/// 始终失败的在线状态跟踪器，模拟存储故障
#[derive(Default)]
pub struct FailingPresenceTracker;

#[async_trait]
impl PresenceTracker for FailingPresenceTracker {
    async fn mark_online(&self, _user: UserId) -> Result<(), PresenceError> {
        Err(PresenceError::unavailable("connection refused"))
    }

    async fn heartbeat(&self, _user: UserId) -> Result<(), PresenceError> {
        Err(PresenceError::unavailable("connection refused"))
    }

    async fn is_online(&self, _user: UserId) -> Result<bool, PresenceError> {
        Err(PresenceError::unavailable("connection refused"))
    }

    async fn mark_offline(&self, _user: UserId) -> Result<(), PresenceError> {
        Err(PresenceError::unavailable("connection refused"))
    }
}

/// 固定时间的时钟
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
