//! 领域层
//!
//! 招聘会话的核心模型：会话、消息、用户与职位申请，
//! 以及各存储端口的抽象定义。

pub mod conversation;
pub mod errors;
pub mod job_application;
pub mod message;
pub mod repository;
pub mod user;
pub mod value_objects;

pub use conversation::{Conversation, ConversationSummary};
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use job_application::JobApplication;
pub use message::{ConversationMessage, Message, MessageKind};
pub use repository::{
    ApplicationRepository, ConversationRepository, MessageRepository, UserRepository,
};
pub use user::{User, UserRole};
pub use value_objects::{
    ApplicationId, ConversationId, JobId, MessageContent, MessageId, Timestamp, UserId,
};
