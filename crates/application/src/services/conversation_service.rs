//! 会话服务
//!
//! 会话的惰性创建、列表、历史分页、已读标记与未读计数。
//! 每个操作都基于调用者身份重新做参与方校验。

use std::sync::Arc;

use uuid::Uuid;

use domain::{
    ApplicationId, ApplicationRepository, Conversation, ConversationId, ConversationRepository,
    DomainError, MessageRepository, UserId,
};

use crate::clock::Clock;
use crate::dto::{ConversationDto, MessageHistoryPage};
use crate::error::ApplicationError;
use crate::services::bounded;

/// 历史分页的默认与上限
const DEFAULT_PAGE_LIMIT: u32 = 50;
const MAX_PAGE_LIMIT: u32 = 100;

pub struct ConversationServiceDependencies {
    pub conversation_repository: Arc<dyn ConversationRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub application_repository: Arc<dyn ApplicationRepository>,
    pub clock: Arc<dyn Clock>,
}

pub struct ConversationService {
    deps: ConversationServiceDependencies,
}

impl ConversationService {
    pub fn new(deps: ConversationServiceDependencies) -> Self {
        Self { deps }
    }

    /// 按职位申请幂等地创建会话
    ///
    /// 已存在则直接返回；申请不存在报 NotFound，
    /// 调用者不是申请人也不是职位招聘者报 Forbidden。
    pub async fn create_or_get(
        &self,
        requester: UserId,
        application_id: ApplicationId,
    ) -> Result<Conversation, ApplicationError> {
        if let Some(existing) = bounded(
            self.deps
                .conversation_repository
                .find_by_application(application_id),
        )
        .await?
        {
            existing.ensure_party(requester)?;
            return Ok(existing);
        }

        let application = bounded(self.deps.application_repository.find_by_id(application_id))
            .await?
            .ok_or_else(|| DomainError::not_found("application", application_id))?;

        if !application.involves(requester) {
            return Err(DomainError::forbidden("create conversation").into());
        }

        let conversation = Conversation::open(
            ConversationId::from(Uuid::new_v4()),
            &application,
            self.deps.clock.now(),
        );

        // 存储层按 application_id 幂等，并发时返回已有会话
        let stored = bounded(self.deps.conversation_repository.create(conversation)).await?;

        tracing::info!(
            conversation_id = %stored.id,
            application_id = %application_id,
            "会话已建立"
        );

        Ok(stored)
    }

    /// 调用者参与的所有会话，按最近消息时间倒序
    pub async fn list_conversations(
        &self,
        requester: UserId,
    ) -> Result<Vec<ConversationDto>, ApplicationError> {
        let summaries =
            bounded(self.deps.conversation_repository.list_for_user(requester)).await?;

        Ok(summaries.into_iter().map(ConversationDto::from).collect())
    }

    /// 校验调用者是会话参与方并返回会话
    pub async fn ensure_party(
        &self,
        requester: UserId,
        conversation_id: ConversationId,
    ) -> Result<Conversation, ApplicationError> {
        let conversation = bounded(self.deps.conversation_repository.find_by_id(conversation_id))
            .await?
            .ok_or_else(|| DomainError::not_found("conversation", conversation_id))?;

        conversation.ensure_party(requester)?;
        Ok(conversation)
    }

    /// 历史消息分页，旧到新
    pub async fn get_messages(
        &self,
        requester: UserId,
        conversation_id: ConversationId,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<MessageHistoryPage, ApplicationError> {
        self.ensure_party(requester, conversation_id).await?;

        let page = page.unwrap_or(1).max(1);
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        // 页码可以取到 u32 上限，偏移量必须在更宽的类型里算
        let offset = u64::from(page - 1) * u64::from(limit);

        let rows = bounded(
            self.deps
                .message_repository
                .list_page(conversation_id, limit, offset),
        )
        .await?;
        let total = bounded(self.deps.message_repository.count(conversation_id)).await?;

        let has_more = i64::from(page) * i64::from(limit) < total;

        Ok(MessageHistoryPage {
            messages: rows.into_iter().map(Into::into).collect(),
            page,
            limit,
            total,
            has_more,
        })
    }

    /// 将会话内对方发来的消息全部标记为已读，返回受影响行数
    pub async fn mark_read(
        &self,
        requester: UserId,
        conversation_id: ConversationId,
    ) -> Result<u64, ApplicationError> {
        self.ensure_party(requester, conversation_id).await?;

        let updated = bounded(
            self.deps
                .message_repository
                .mark_read(conversation_id, requester),
        )
        .await?;

        tracing::debug!(
            conversation_id = %conversation_id,
            reader = %requester,
            updated,
            "消息已标记为已读"
        );

        Ok(updated)
    }

    /// 调用者在所有会话中的未读总数
    pub async fn unread_count(&self, requester: UserId) -> Result<i64, ApplicationError> {
        bounded(self.deps.message_repository.unread_total(requester)).await
    }
}
