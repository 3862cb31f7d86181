use actix_web::{web, App, HttpServer};
use chat_service::{
    auth::{JwtValidator, TokenValidator},
    config::{Config, StoreBackend},
    db, error, logging, routes,
    services::{MemoryMessageStore, MessageStore, PgMessageStore},
    state::AppState,
    websocket::ConnectionRegistry,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);

    let store: Arc<dyn MessageStore> = match cfg.store_backend {
        StoreBackend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| error::AppError::Config("DATABASE_URL missing".into()))?;
            let pool = db::init_pool(url)
                .await
                .map_err(|e| error::AppError::StartServer(format!("db: {e}")))?;
            Arc::new(PgMessageStore::new(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory message store, messages will not survive restart");
            Arc::new(MemoryMessageStore::new())
        }
    };

    let registry = ConnectionRegistry::new();
    let validator: Arc<dyn TokenValidator> = Arc::new(JwtValidator::new(&cfg.jwt_secret));

    let state = AppState {
        registry,
        store,
        validator,
        config: cfg.clone(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting chat-service");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::messages::get_messages)
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run: {e}")))
}
