use std::sync::Arc;

use domain::{ConversationRepository, DomainError, MessageKind, UserRole};
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::error::ApplicationError;
use crate::events::{EventScope, ServerEvent};
use crate::notifier::{DispatchError, NotificationDispatcher, OfflineNotification};
use crate::presence::memory::MemoryPresenceTracker;
use crate::presence::PresenceTracker;
use crate::services::test_support::{
    authenticated, conversation_between, user, FailingPresenceTracker,
    InMemoryApplicationRepository, InMemoryConversationRepository, InMemoryMessageRepository,
    InMemoryUserRepository, RecordingBroadcaster,
};
use crate::services::{MessageService, MessageServiceDependencies, SendMessageRequest};

mockall::mock! {
    pub Dispatcher {}

    #[async_trait::async_trait]
    impl NotificationDispatcher for Dispatcher {
        async fn dispatch(&self, notification: OfflineNotification) -> Result<(), DispatchError>;
    }
}

struct Fixture {
    conversations: Arc<InMemoryConversationRepository>,
    messages: Arc<InMemoryMessageRepository>,
    users: Arc<InMemoryUserRepository>,
    applications: Arc<InMemoryApplicationRepository>,
    broadcaster: Arc<RecordingBroadcaster>,
    presence: Arc<dyn PresenceTracker>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            conversations: Arc::new(InMemoryConversationRepository::default()),
            messages: Arc::new(InMemoryMessageRepository::default()),
            users: Arc::new(InMemoryUserRepository::default()),
            applications: Arc::new(InMemoryApplicationRepository::default()),
            broadcaster: Arc::new(RecordingBroadcaster::default()),
            presence: Arc::new(MemoryPresenceTracker::new()),
        }
    }

    fn service(&self, dispatcher: MockDispatcher) -> MessageService {
        MessageService::new(MessageServiceDependencies {
            conversation_repository: self.conversations.clone(),
            message_repository: self.messages.clone(),
            user_repository: self.users.clone(),
            application_repository: self.applications.clone(),
            presence: self.presence.clone(),
            dispatcher: Arc::new(dispatcher),
            broadcaster: self.broadcaster.clone(),
            clock: Arc::new(SystemClock),
            frontend_url: "http://localhost:3000".to_string(),
        })
    }
}

fn request(conversation_id: Uuid, content: &str) -> SendMessageRequest {
    SendMessageRequest {
        conversation_id,
        content: content.to_string(),
        kind: MessageKind::Text,
    }
}

#[tokio::test]
async fn send_message_persists_then_broadcasts_room_and_personal_channel() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let conversation = conversation_between(&applicant, &recruiter);

    let fixture = Fixture::new();
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();
    fixture.presence.mark_online(recruiter.id).await.unwrap();

    let mut dispatcher = MockDispatcher::new();
    dispatcher.expect_dispatch().times(0);
    let service = fixture.service(dispatcher);

    let dto = service
        .send_message(
            &authenticated(&applicant),
            request(conversation.id.into(), "hello Bob"),
        )
        .await
        .unwrap();

    assert_eq!(dto.content, "hello Bob");
    assert_eq!(dto.sender_name, "Alice");
    assert!(!dto.is_read);
    assert_eq!(fixture.messages.stored().len(), 1);

    let events = fixture.broadcaster.events();
    assert_eq!(events.len(), 2);

    // 先房间广播，后个人频道提醒
    assert_eq!(
        events[0].scope,
        EventScope::Conversation(conversation.id)
    );
    assert!(events[0].except.is_none());
    assert!(matches!(events[0].payload, ServerEvent::NewMessage(_)));

    assert_eq!(events[1].scope, EventScope::User(recruiter.id));
    match &events[1].payload {
        ServerEvent::NewMessageNotification(notice) => {
            assert_eq!(notice.sender_name, "Alice");
            assert_eq!(notice.conversation_id, Uuid::from(conversation.id));
        }
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[tokio::test]
async fn blank_content_is_rejected_before_any_side_effect() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let conversation = conversation_between(&applicant, &recruiter);

    let fixture = Fixture::new();
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();

    let mut dispatcher = MockDispatcher::new();
    dispatcher.expect_dispatch().times(0);
    let service = fixture.service(dispatcher);

    let err = service
        .send_message(
            &authenticated(&applicant),
            request(conversation.id.into(), "   \n  "),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Validation { .. })
    ));
    assert!(fixture.messages.stored().is_empty());
    assert!(fixture.broadcaster.events().is_empty());
}

#[tokio::test]
async fn outsider_cannot_send_into_conversation() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let outsider = user("Mallory", UserRole::Applicant);
    let conversation = conversation_between(&applicant, &recruiter);

    let fixture = Fixture::new();
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();

    let mut dispatcher = MockDispatcher::new();
    dispatcher.expect_dispatch().times(0);
    let service = fixture.service(dispatcher);

    let err = service
        .send_message(
            &authenticated(&outsider),
            request(conversation.id.into(), "let me in"),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::Forbidden { .. })
    ));
    assert!(fixture.messages.stored().is_empty());
    assert!(fixture.broadcaster.events().is_empty());
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let applicant = user("Alice", UserRole::Applicant);

    let fixture = Fixture::new();
    let mut dispatcher = MockDispatcher::new();
    dispatcher.expect_dispatch().times(0);
    let service = fixture.service(dispatcher);

    let err = service
        .send_message(&authenticated(&applicant), request(Uuid::new_v4(), "hello"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::NotFound { .. })
    ));
}

#[tokio::test]
async fn offline_recipient_gets_exactly_one_mail() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let conversation = conversation_between(&applicant, &recruiter);

    let fixture = Fixture::new();
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();
    fixture.users.insert(recruiter.clone());
    // 接收方未上线

    let recruiter_email = recruiter.email.clone();
    let mut dispatcher = MockDispatcher::new();
    dispatcher
        .expect_dispatch()
        .withf(move |notification| {
            notification.to == recruiter_email
                && notification.subject == "New message from Alice - HireHeaven"
                && notification.html.contains("/chat/")
        })
        .times(1)
        .returning(|_| Ok(()));
    let service = fixture.service(dispatcher);

    service
        .send_message(
            &authenticated(&applicant),
            request(conversation.id.into(), "are you there?"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn online_recipient_gets_no_mail() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let conversation = conversation_between(&applicant, &recruiter);

    let fixture = Fixture::new();
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();
    fixture.users.insert(recruiter.clone());
    fixture.presence.mark_online(recruiter.id).await.unwrap();

    let mut dispatcher = MockDispatcher::new();
    dispatcher.expect_dispatch().times(0);
    let service = fixture.service(dispatcher);

    service
        .send_message(
            &authenticated(&applicant),
            request(conversation.id.into(), "ping"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn presence_failure_assumes_online_and_skips_mail() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let conversation = conversation_between(&applicant, &recruiter);

    let mut fixture = Fixture::new();
    fixture.presence = Arc::new(FailingPresenceTracker);
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();
    fixture.users.insert(recruiter.clone());

    let mut dispatcher = MockDispatcher::new();
    dispatcher.expect_dispatch().times(0);
    let service = fixture.service(dispatcher);

    // 在线检查失败不影响发送
    let dto = service
        .send_message(
            &authenticated(&applicant),
            request(conversation.id.into(), "still works"),
        )
        .await
        .unwrap();
    assert_eq!(dto.content, "still works");
    assert_eq!(fixture.broadcaster.events().len(), 2);
}

#[tokio::test]
async fn dispatch_failure_is_swallowed() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let conversation = conversation_between(&applicant, &recruiter);

    let fixture = Fixture::new();
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();
    fixture.users.insert(recruiter.clone());

    let mut dispatcher = MockDispatcher::new();
    dispatcher
        .expect_dispatch()
        .times(1)
        .returning(|_| Err(DispatchError::delivery("broker down")));
    let service = fixture.service(dispatcher);

    let result = service
        .send_message(
            &authenticated(&applicant),
            request(conversation.id.into(), "hello"),
        )
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn persist_failure_yields_error_and_no_broadcast() {
    let applicant = user("Alice", UserRole::Applicant);
    let recruiter = user("Bob", UserRole::Recruiter);
    let conversation = conversation_between(&applicant, &recruiter);

    let fixture = Fixture::new();
    fixture
        .conversations
        .create(conversation.clone())
        .await
        .unwrap();
    fixture.messages.fail_next_create();

    let mut dispatcher = MockDispatcher::new();
    dispatcher.expect_dispatch().times(0);
    let service = fixture.service(dispatcher);

    let err = service
        .send_message(
            &authenticated(&applicant),
            request(conversation.id.into(), "will not land"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApplicationError::Repository(_)));
    assert!(fixture.broadcaster.events().is_empty());
    assert!(fixture.messages.stored().is_empty());
}
