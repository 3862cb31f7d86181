use actix_web::{web, App, HttpServer};
use edge_relay::{config::Config, error, logging, routes, state::RelayState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(Config::from_env()?);

    let state = RelayState {
        config: cfg.clone(),
        http: reqwest::Client::new(),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, origin = %cfg.origin_url, "starting edge-relay");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(routes::messages::messages_proxy)
            .service(routes::wsroute::ws_proxy)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run: {e}")))
}
