use std::io::Error;
use std::sync::Arc;
use std::time::Duration;

use broadcaster::{
    application::{
        dispatch::SessionRegistry,
        services::jwt::JwtServiceConfig,
        usecases::{
            authenticate_admin::AuthenticateAdminUseCase,
            cancel_broadcast::CancelBroadcastUseCase,
            get_broadcast::GetBroadcastUseCase,
            get_channel_stats::GetChannelStatsUseCase,
            register_channel::RegisterChannelUseCase,
            start_broadcast::{BroadcastDefaults, StartBroadcastUseCase},
        },
    },
    config::Config,
    domain::repositories::{ChannelRepository, RecipientStore},
    infrastructure::{
        messaging::telegram::TelegramConnector,
        repositories::{
            in_memory::{InMemoryChannelRepository, InMemoryRecipientStore},
            postgres::{self, PostgresChannelRepository, PostgresRecipientStore},
        },
    },
    presentation::http::endpoints::root::{ApiState, endpoints},
};
use poem::{Route, Server, listener::TcpListener};
use poem_openapi::OpenApiService;
use tokio::{main, time::interval};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::try_parse().map_err(Error::other)?;

    let (channels, recipients): (Arc<dyn ChannelRepository>, Arc<dyn RecipientStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = postgres::connect(url).await.map_err(Error::other)?;
                info!("using postgres storage");
                (
                    PostgresChannelRepository::new(pool.clone()),
                    PostgresRecipientStore::new(pool),
                )
            }
            None => {
                warn!("DATABASE_URL is not set, channels and recipients are kept in memory");
                (
                    Arc::new(InMemoryChannelRepository::new()),
                    Arc::new(InMemoryRecipientStore::new()),
                )
            }
        };

    let jwt_config = JwtServiceConfig {
        secret: config.jwt_secret.clone(),
        expiration: config.jwt_expiration,
    };
    let registry = Arc::new(SessionRegistry::new(
        config.registry_max_sessions,
        config.registry_max_age,
    ));
    spawn_registry_pruning(registry.clone());
    let connector = Arc::new(TelegramConnector::new(
        config.telegram_api_base.clone(),
        config.telegram_timeout,
    ));
    let defaults = BroadcastDefaults {
        base_delay: config.broadcast_base_delay,
        staging_chat: config.staging_chat_id,
        ..BroadcastDefaults::default()
    };

    let state = Arc::new(ApiState {
        auth_usecase: Arc::new(AuthenticateAdminUseCase::new(
            config.admin_api_key.clone(),
            jwt_config.clone(),
        )),
        register_channel_usecase: Arc::new(RegisterChannelUseCase::new(
            channels.clone(),
            recipients.clone(),
        )),
        channel_stats_usecase: Arc::new(GetChannelStatsUseCase::new(
            channels.clone(),
            recipients.clone(),
        )),
        start_broadcast_usecase: Arc::new(StartBroadcastUseCase::new(
            channels,
            recipients,
            connector,
            registry.clone(),
            defaults,
        )),
        cancel_broadcast_usecase: Arc::new(CancelBroadcastUseCase::new(registry.clone())),
        get_broadcast_usecase: Arc::new(GetBroadcastUseCase::new(registry)),
        jwt_config,
    });

    let server_url = format!("{}://{}:{}", config.scheme, config.host, config.port);

    info!(url = %server_url, "starting server");

    let api_service = OpenApiService::new(endpoints(state), "Broadcast API", "0.1.0")
        .server(format!("{}/api", server_url));
    let ui = api_service.swagger_ui();
    let app = Route::new().nest("/api", api_service).nest("/", ui);

    Server::new(TcpListener::bind(format!("0.0.0.0:{}", config.port)))
        .run(app)
        .await
}

fn spawn_registry_pruning(registry: Arc<SessionRegistry>) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            let evicted = registry.prune().await;
            if evicted > 0 {
                debug!(evicted, "pruned finished broadcast sessions");
            }
        }
    });
}
