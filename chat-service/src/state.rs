use crate::{
    auth::TokenValidator, config::Config, services::MessageStore, websocket::ConnectionRegistry,
};
use std::sync::Arc;

/// Shared application state, constructed once at startup and injected into
/// every handler. The registry is owned here rather than living in a
/// global.
#[derive(Clone)]
pub struct AppState {
    pub registry: ConnectionRegistry,
    pub store: Arc<dyn MessageStore>,
    pub validator: Arc<dyn TokenValidator>,
    pub config: Arc<Config>,
}
