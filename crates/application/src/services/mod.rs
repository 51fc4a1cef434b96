//! 应用服务

mod conversation_service;
mod identity_service;
mod message_service;

pub use conversation_service::{ConversationService, ConversationServiceDependencies};
pub use identity_service::{AuthenticatedUser, IdentityService};
pub use message_service::{MessageService, MessageServiceDependencies, SendMessageRequest};

use std::future::Future;
use std::time::Duration;

use domain::RepositoryError;

use crate::error::ApplicationError;

/// 存储调用的统一超时，超时视为服务不可用
const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// 给存储调用加上超时边界
pub(crate) async fn bounded<T>(
    future: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, ApplicationError> {
    match tokio::time::timeout(STORE_TIMEOUT, future).await {
        Ok(result) => result.map_err(ApplicationError::from),
        Err(_) => Err(ApplicationError::Repository(RepositoryError::Timeout)),
    }
}

#[cfg(test)]
mod test_support;


#[cfg(test)]
mod message_service_tests;
