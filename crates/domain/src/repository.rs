//! 存储端口定义
//!
//! 由基础设施层提供 PostgreSQL 实现。`users` / `jobs` / `applications`
//! 表属于外部服务，这里只读。

use async_trait::async_trait;

use crate::conversation::{Conversation, ConversationSummary};
use crate::errors::RepositoryError;
use crate::job_application::JobApplication;
use crate::message::{ConversationMessage, Message};
use crate::user::User;
use crate::value_objects::{ApplicationId, ConversationId, JobId, UserId};

/// 用户存储（只读）
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
}

/// 职位申请存储（只读）
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: ApplicationId)
        -> Result<Option<JobApplication>, RepositoryError>;

    async fn find_job_title(&self, id: JobId) -> Result<Option<String>, RepositoryError>;
}

/// 会话存储
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// 创建会话。按 `application_id` 幂等：并发创建时返回已存在的会话。
    async fn create(&self, conversation: Conversation) -> Result<Conversation, RepositoryError>;

    async fn find_by_id(&self, id: ConversationId)
        -> Result<Option<Conversation>, RepositoryError>;

    async fn find_by_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Conversation>, RepositoryError>;

    /// 用户参与的全部会话概要，按最近消息时间倒序（无消息的排在最后）
    async fn list_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError>;
}

/// 消息存储
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// 持久化消息，并在同一事务内更新会话的 `last_message_at`
    async fn create(&self, message: Message) -> Result<Message, RepositoryError>;

    /// 按 (created_at, id) 升序分页读取
    async fn list_page(
        &self,
        conversation: ConversationId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<ConversationMessage>, RepositoryError>;

    async fn count(&self, conversation: ConversationId) -> Result<i64, RepositoryError>;

    /// 将会话内非 `reader` 发送的消息全部标记为已读，返回受影响行数
    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
    ) -> Result<u64, RepositoryError>;

    /// 用户在所有会话中的未读总数
    async fn unread_total(&self, user: UserId) -> Result<i64, RepositoryError>;
}
