//! 服务入口
//!
//! 组装存储、广播、在线状态与邮件投递，启动 Axum 服务。
//! Redis 广播和 Kafka 投递不可用时分别降级为进程内广播与空投递，
//! 保证核心聊天功能可用。

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use application::{
    ConversationService, ConversationServiceDependencies, EventBroadcaster, IdentityService,
    MessageService, MessageServiceDependencies, NoopNotificationDispatcher,
    NotificationDispatcher, SystemClock,
};
use config::AppConfig;
use infrastructure::{
    create_pg_pool, KafkaMailDispatcher, LocalEventBroadcaster, PgApplicationRepository,
    PgConversationRepository, PgMessageRepository, PgUserRepository, RedisEventBroadcaster,
    RedisPresenceTracker,
};
use web_api::{router, spawn_event_relay, AppState, JwtService, RoomRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = AppConfig::from_env_with_defaults();
    config.validate()?;

    tracing::info!(
        database = %config.database.url.split('@').next_back().unwrap_or("unknown"),
        "连接数据库"
    );

    let pg_pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
    sqlx::migrate!("../../migrations").run(&pg_pool).await?;

    let conversation_repository = Arc::new(PgConversationRepository::new(pg_pool.clone()));
    let message_repository = Arc::new(PgMessageRepository::new(pg_pool.clone()));
    let user_repository = Arc::new(PgUserRepository::new(pg_pool.clone()));
    let application_repository = Arc::new(PgApplicationRepository::new(pg_pool));

    let redis_client = Arc::new(redis::Client::open(config.redis.url.as_str())?);

    let presence = Arc::new(
        RedisPresenceTracker::connect(&redis_client, config.presence.ttl_seconds).await?,
    );

    let broadcaster: Arc<dyn EventBroadcaster> = match RedisEventBroadcaster::connect(
        redis_client,
        config.broadcast.channel.clone(),
        config.broadcast.capacity,
    )
    .await
    {
        Ok(broadcaster) => Arc::new(broadcaster),
        Err(err) => {
            tracing::warn!(error = %err, "Redis 广播不可用，降级为进程内广播");
            Arc::new(LocalEventBroadcaster::new(config.broadcast.capacity))
        }
    };

    let dispatcher: Arc<dyn NotificationDispatcher> = match KafkaMailDispatcher::new(&config.kafka)
    {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(err) => {
            tracing::warn!(error = %err, "Kafka 不可用，离线邮件将被丢弃");
            Arc::new(NoopNotificationDispatcher)
        }
    };

    let clock = Arc::new(SystemClock);

    let identity_service = Arc::new(IdentityService::new(user_repository.clone()));
    let conversation_service = Arc::new(ConversationService::new(ConversationServiceDependencies {
        conversation_repository: conversation_repository.clone(),
        message_repository: message_repository.clone(),
        application_repository: application_repository.clone(),
        clock: clock.clone(),
    }));
    let message_service = Arc::new(MessageService::new(MessageServiceDependencies {
        conversation_repository,
        message_repository,
        user_repository,
        application_repository,
        presence: presence.clone(),
        dispatcher,
        broadcaster: broadcaster.clone(),
        clock,
        frontend_url: config.server.frontend_url.clone(),
    }));

    let state = AppState {
        identity_service,
        conversation_service,
        message_service,
        presence,
        broadcaster,
        registry: Arc::new(RoomRegistry::new()),
        jwt_service: JwtService::new(config.jwt.clone()),
    };

    spawn_event_relay(state.clone());

    let app = router(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("聊天服务启动在 http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
