//! REST 路由与 WebSocket 升级入口

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use application::{
    AuthenticatedUser, ConversationDto, CreatedConversationDto, MessageHistoryPage, UnreadCountDto,
};
use domain::{ApplicationId, ConversationId};

use crate::error::ApiError;
use crate::socket::handle_socket;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationPayload {
    application_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadResponse {
    updated: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(websocket_upgrade))
        .nest("/api/chat", chat_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn chat_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/conversations/{conversation_id}/messages", get(get_messages))
        .route("/messages/read/{conversation_id}", put(mark_read))
        .route("/unread-count", get(unread_count))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 解析 Bearer token 并确认用户存在
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedUser, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(headers)?;
    let user = state.identity_service.resolve(user_id).await?;
    Ok(user)
}

async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateConversationPayload>,
) -> Result<Json<CreatedConversationDto>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    let conversation = state
        .conversation_service
        .create_or_get(user.id, ApplicationId::from(payload.application_id))
        .await?;

    Ok(Json(conversation.into()))
}

async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    let conversations = state.conversation_service.list_conversations(user.id).await?;
    Ok(Json(conversations))
}

async fn get_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<MessageHistoryPage>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    let page = state
        .conversation_service
        .get_messages(
            user.id,
            ConversationId::from(conversation_id),
            query.page,
            query.limit,
        )
        .await?;

    Ok(Json(page))
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    let updated = state
        .conversation_service
        .mark_read(user.id, ConversationId::from(conversation_id))
        .await?;

    Ok(Json(MarkReadResponse { updated }))
}

async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCountDto>, ApiError> {
    let user = authenticate(&state, &headers).await?;

    let unread_count = state.conversation_service.unread_count(user.id).await?;
    Ok(Json(UnreadCountDto { unread_count }))
}

/// WebSocket 升级，认证在升级前完成
///
/// 浏览器 WebSocket API 无法自定义 header，token 优先从
/// 查询参数读取，回退到 Authorization header。
async fn websocket_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Result<Response, ApiError> {
    let user_id = match query.token {
        Some(token) => state.jwt_service.verify_token(&token)?.user_id,
        None => state.jwt_service.extract_user_from_headers(&headers)?,
    };

    let user = state.identity_service.resolve(user_id).await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, user, state)))
}
