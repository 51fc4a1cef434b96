//! 领域模型错误定义
//!
//! 统一的错误分类：认证、授权、资源缺失、输入验证。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// 未携带有效身份
    #[error("未认证的访问")]
    Unauthenticated,

    /// 权限不足
    #[error("权限不足: {action}")]
    Forbidden { action: String },

    /// 资源不存在
    #[error("资源不存在: {resource} {id}")]
    NotFound { resource: String, id: String },

    /// 验证失败
    #[error("验证失败: {field}: {reason}")]
    Validation { field: String, reason: String },
}

impl DomainError {
    /// 创建权限错误
    pub fn forbidden(action: impl Into<String>) -> Self {
        Self::Forbidden {
            action: action.into(),
        }
    }

    /// 创建资源不存在错误
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 存储层错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 记录不存在
    #[error("记录不存在")]
    NotFound,

    /// 唯一约束冲突
    #[error("记录冲突")]
    Conflict,

    /// 底层存储故障
    #[error("存储错误: {message}")]
    Storage { message: String },

    /// 存储操作超时
    #[error("存储操作超时")]
    Timeout,
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}
