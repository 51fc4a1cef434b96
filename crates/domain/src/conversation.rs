//! 会话实体
//!
//! 每个职位申请至多一个会话，参与方固定为申请人与职位所属招聘者。

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, DomainResult};
use crate::job_application::JobApplication;
use crate::value_objects::{ApplicationId, ConversationId, JobId, Timestamp, UserId};

/// 会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub recruiter_id: UserId,
    pub job_id: JobId,
    pub created_at: Timestamp,
    /// 最近一条消息的时间，没有消息时为空
    pub last_message_at: Option<Timestamp>,
}

impl Conversation {
    /// 基于职位申请开启会话
    pub fn open(id: ConversationId, application: &JobApplication, now: Timestamp) -> Self {
        Self {
            id,
            application_id: application.id,
            applicant_id: application.applicant_id,
            recruiter_id: application.recruiter_id,
            job_id: application.job_id,
            created_at: now,
            last_message_at: None,
        }
    }

    /// 检查用户是否是会话参与方
    pub fn is_party(&self, user: UserId) -> bool {
        self.applicant_id == user || self.recruiter_id == user
    }

    /// 要求用户是会话参与方，否则返回权限错误
    pub fn ensure_party(&self, user: UserId) -> DomainResult<()> {
        if self.is_party(user) {
            Ok(())
        } else {
            Err(DomainError::forbidden("access conversation"))
        }
    }

    /// 返回会话中的另一方
    pub fn other_party(&self, user: UserId) -> Option<UserId> {
        if self.applicant_id == user {
            Some(self.recruiter_id)
        } else if self.recruiter_id == user {
            Some(self.applicant_id)
        } else {
            None
        }
    }
}

/// 会话概要：列表接口返回的聚合视图
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub job_title: String,
    pub applicant_name: String,
    pub recruiter_name: String,
    /// 最近一条消息的正文，用于列表预览
    pub last_message: Option<String>,
    /// 对方发来且未读的消息数
    pub unread_count: i64,
}
