//! 职位申请
//!
//! 申请记录由招聘主服务管理，会话层只读取建立会话所需的关联方。

use serde::{Deserialize, Serialize};

use crate::value_objects::{ApplicationId, JobId, UserId};

/// 职位申请记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub applicant_id: UserId,
    /// 职位所属的招聘者
    pub recruiter_id: UserId,
    pub job_title: String,
}

impl JobApplication {
    /// 检查用户是否是申请的参与方（求职者或招聘者）
    pub fn involves(&self, user: UserId) -> bool {
        self.applicant_id == user || self.recruiter_id == user
    }
}
