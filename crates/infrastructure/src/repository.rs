//! PostgreSQL 仓储实现
//!
//! 会话与消息表由本服务的迁移创建；用户、职位与申请表
//! 属于平台共享库，这里只读。

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use domain::{
    ApplicationId, ApplicationRepository, Conversation, ConversationId, ConversationMessage,
    ConversationRepository, ConversationSummary, JobApplication, JobId, Message, MessageContent,
    MessageId, MessageKind, MessageRepository, RepositoryError, User, UserId, UserRepository,
    UserRole,
};

/// 创建数据库连接池
pub async fn create_pg_pool(url: &str, max_connections: u32) -> Result<PgPool, RepositoryError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .map_err(map_sqlx_err)
}

/// sqlx 错误到仓储错误的统一映射
pub fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound,
        sqlx::Error::PoolTimedOut => RepositoryError::Timeout,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict,
        other => RepositoryError::storage(other.to_string()),
    }
}

/// 数据库会话行
#[derive(Debug, Clone, FromRow)]
struct ConversationRecord {
    id: Uuid,
    application_id: Uuid,
    applicant_id: Uuid,
    recruiter_id: Uuid,
    job_id: Uuid,
    created_at: DateTime<Utc>,
    last_message_at: Option<DateTime<Utc>>,
}

impl From<ConversationRecord> for Conversation {
    fn from(record: ConversationRecord) -> Self {
        Conversation {
            id: ConversationId::from(record.id),
            application_id: ApplicationId::from(record.application_id),
            applicant_id: UserId::from(record.applicant_id),
            recruiter_id: UserId::from(record.recruiter_id),
            job_id: JobId::from(record.job_id),
            created_at: record.created_at,
            last_message_at: record.last_message_at,
        }
    }
}

/// 会话列表行，带职位标题、双方姓名、最近消息与未读数
#[derive(Debug, Clone, FromRow)]
struct ConversationSummaryRecord {
    id: Uuid,
    application_id: Uuid,
    applicant_id: Uuid,
    recruiter_id: Uuid,
    job_id: Uuid,
    created_at: DateTime<Utc>,
    last_message_at: Option<DateTime<Utc>>,
    job_title: String,
    applicant_name: String,
    recruiter_name: String,
    last_message: Option<String>,
    unread_count: i64,
}

impl From<ConversationSummaryRecord> for ConversationSummary {
    fn from(record: ConversationSummaryRecord) -> Self {
        ConversationSummary {
            conversation: Conversation {
                id: ConversationId::from(record.id),
                application_id: ApplicationId::from(record.application_id),
                applicant_id: UserId::from(record.applicant_id),
                recruiter_id: UserId::from(record.recruiter_id),
                job_id: JobId::from(record.job_id),
                created_at: record.created_at,
                last_message_at: record.last_message_at,
            },
            job_title: record.job_title,
            applicant_name: record.applicant_name,
            recruiter_name: record.recruiter_name,
            last_message: record.last_message,
            unread_count: record.unread_count,
        }
    }
}

/// 数据库消息行
#[derive(Debug, Clone, FromRow)]
struct MessageRecord {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let kind = MessageKind::from_str(&record.message_type)
            .map_err(|_| RepositoryError::storage(format!("未知消息类型: {}", record.message_type)))?;
        let content = MessageContent::new(record.content)
            .map_err(|err| RepositoryError::storage(format!("消息内容非法: {err}")))?;
        Ok(Message {
            id: MessageId::from(record.id),
            conversation_id: ConversationId::from(record.conversation_id),
            sender_id: UserId::from(record.sender_id),
            content,
            kind,
            is_read: record.is_read,
            created_at: record.created_at,
        })
    }
}

/// 消息行 + 发送者姓名
#[derive(Debug, Clone, FromRow)]
struct MessageWithSenderRecord {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: String,
    is_read: bool,
    created_at: DateTime<Utc>,
    sender_name: String,
}

impl TryFrom<MessageWithSenderRecord> for ConversationMessage {
    type Error = RepositoryError;

    fn try_from(record: MessageWithSenderRecord) -> Result<Self, Self::Error> {
        let sender_name = record.sender_name.clone();
        let message = Message::try_from(MessageRecord {
            id: record.id,
            conversation_id: record.conversation_id,
            sender_id: record.sender_id,
            content: record.content,
            message_type: record.message_type,
            is_read: record.is_read,
            created_at: record.created_at,
        })?;
        Ok(ConversationMessage {
            message,
            sender_name,
        })
    }
}

/// 数据库用户行
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let role = UserRole::from_str(&record.role)
            .map_err(|_| RepositoryError::storage(format!("未知用户角色: {}", record.role)))?;
        Ok(User {
            id: UserId::from(record.id),
            name: record.name,
            email: record.email,
            role,
        })
    }
}

/// 职位申请行，招聘方与职位标题来自 jobs 表
#[derive(Debug, Clone, FromRow)]
struct ApplicationRecord {
    id: Uuid,
    job_id: Uuid,
    applicant_id: Uuid,
    recruiter_id: Uuid,
    job_title: String,
}

impl From<ApplicationRecord> for JobApplication {
    fn from(record: ApplicationRecord) -> Self {
        JobApplication {
            id: ApplicationId::from(record.id),
            job_id: JobId::from(record.job_id),
            applicant_id: UserId::from(record.applicant_id),
            recruiter_id: UserId::from(record.recruiter_id),
            job_title: record.job_title,
        }
    }
}

pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn create(&self, conversation: Conversation) -> Result<Conversation, RepositoryError> {
        // 按 application_id 幂等，并发插入时落败方读回已有行
        let inserted = sqlx::query_as::<_, ConversationRecord>(
            r#"
            INSERT INTO conversations (id, application_id, applicant_id, recruiter_id, job_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (application_id) DO NOTHING
            RETURNING id, application_id, applicant_id, recruiter_id, job_id, created_at, last_message_at
            "#,
        )
        .bind(Uuid::from(conversation.id))
        .bind(Uuid::from(conversation.application_id))
        .bind(Uuid::from(conversation.applicant_id))
        .bind(Uuid::from(conversation.recruiter_id))
        .bind(Uuid::from(conversation.job_id))
        .bind(conversation.created_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        if let Some(record) = inserted {
            return Ok(record.into());
        }

        self.find_by_application(conversation.application_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_id(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            r#"
            SELECT id, application_id, applicant_id, recruiter_id, job_id, created_at, last_message_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Into::into))
    }

    async fn find_by_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<Conversation>, RepositoryError> {
        let record = sqlx::query_as::<_, ConversationRecord>(
            r#"
            SELECT id, application_id, applicant_id, recruiter_id, job_id, created_at, last_message_at
            FROM conversations
            WHERE application_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Into::into))
    }

    async fn list_for_user(
        &self,
        user: UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let records = sqlx::query_as::<_, ConversationSummaryRecord>(
            r#"
            SELECT
                c.id, c.application_id, c.applicant_id, c.recruiter_id, c.job_id,
                c.created_at, c.last_message_at,
                j.title AS job_title,
                ua.name AS applicant_name,
                ur.name AS recruiter_name,
                lm.content AS last_message,
                COALESCE(un.unread_count, 0) AS unread_count
            FROM conversations c
            JOIN jobs j ON j.id = c.job_id
            JOIN users ua ON ua.id = c.applicant_id
            JOIN users ur ON ur.id = c.recruiter_id
            LEFT JOIN LATERAL (
                SELECT m.content
                FROM messages m
                WHERE m.conversation_id = c.id
                ORDER BY m.created_at DESC, m.id DESC
                LIMIT 1
            ) lm ON TRUE
            LEFT JOIN LATERAL (
                SELECT COUNT(*) AS unread_count
                FROM messages m
                WHERE m.conversation_id = c.id
                  AND m.sender_id <> $1
                  AND NOT m.is_read
            ) un ON TRUE
            WHERE c.applicant_id = $1 OR c.recruiter_id = $1
            ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
            "#,
        )
        .bind(Uuid::from(user))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Into::into).collect())
    }
}

pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn create(&self, message: Message) -> Result<Message, RepositoryError> {
        // 消息插入与 last_message_at 更新在同一事务
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content, message_type, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, conversation_id, sender_id, content, message_type, is_read, created_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.conversation_id))
        .bind(Uuid::from(message.sender_id))
        .bind(message.content.as_str())
        .bind(message.kind.as_str())
        .bind(message.is_read)
        .bind(message.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        sqlx::query("UPDATE conversations SET last_message_at = $1 WHERE id = $2")
            .bind(message.created_at)
            .bind(Uuid::from(message.conversation_id))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        tx.commit().await.map_err(map_sqlx_err)?;

        record.try_into()
    }

    async fn list_page(
        &self,
        conversation: ConversationId,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageWithSenderRecord>(
            r#"
            SELECT
                m.id, m.conversation_id, m.sender_id, m.content, m.message_type,
                m.is_read, m.created_at,
                u.name AS sender_name
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(Uuid::from(conversation))
        .bind(i64::from(limit))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, conversation: ConversationId) -> Result<i64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(Uuid::from(conversation))
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(count)
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE conversation_id = $1
              AND sender_id <> $2
              AND NOT is_read
            "#,
        )
        .bind(Uuid::from(conversation))
        .bind(Uuid::from(reader))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected())
    }

    async fn unread_total(&self, user: UserId) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE (c.applicant_id = $1 OR c.recruiter_id = $1)
              AND m.sender_id <> $1
              AND NOT m.is_read
            "#,
        )
        .bind(Uuid::from(user))
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(count)
    }
}

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, role FROM users WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(TryInto::try_into).transpose()
    }
}

pub struct PgApplicationRepository {
    pool: PgPool,
}

impl PgApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationRepository for PgApplicationRepository {
    async fn find_by_id(
        &self,
        id: ApplicationId,
    ) -> Result<Option<JobApplication>, RepositoryError> {
        let record = sqlx::query_as::<_, ApplicationRecord>(
            r#"
            SELECT
                a.id, a.job_id, a.applicant_id,
                j.recruiter_id,
                j.title AS job_title
            FROM applications a
            JOIN jobs j ON j.id = a.job_id
            WHERE a.id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Into::into))
    }

    async fn find_job_title(&self, id: JobId) -> Result<Option<String>, RepositoryError> {
        let title: Option<(String,)> = sqlx::query_as("SELECT title FROM jobs WHERE id = $1")
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(title.map(|(title,)| title))
    }
}
