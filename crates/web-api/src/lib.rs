//! Web 层
//!
//! REST 路由、WebSocket 网关、JWT 认证与统一错误响应。

pub mod auth;
pub mod error;
pub mod registry;
pub mod routes;
pub mod socket;
pub mod state;

pub use auth::{Claims, JwtService};
pub use error::ApiError;
pub use registry::RoomRegistry;
pub use routes::router;
pub use socket::spawn_event_relay;
pub use state::AppState;
