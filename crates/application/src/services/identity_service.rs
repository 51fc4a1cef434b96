//! 身份解析服务
//!
//! 网关校验完 JWT 后，这里把 token 主体解析成完整的用户身份。
//! 用户不存在同样按未认证处理，不暴露账号是否存在。

use std::sync::Arc;

use uuid::Uuid;

use domain::{DomainError, User, UserId, UserRepository, UserRole};

use crate::error::ApplicationError;
use crate::services::bounded;

/// 已认证的用户身份，随连接保存
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

pub struct IdentityService {
    user_repository: Arc<dyn UserRepository>,
}

impl IdentityService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    /// 将 token 主体解析成用户身份
    pub async fn resolve(&self, user_id: Uuid) -> Result<AuthenticatedUser, ApplicationError> {
        let user = bounded(self.user_repository.find_by_id(UserId::from(user_id)))
            .await?
            .ok_or(DomainError::Unauthenticated)?;

        Ok(AuthenticatedUser::from(user))
    }
}
