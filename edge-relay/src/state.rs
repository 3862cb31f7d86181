use crate::config::Config;
use std::sync::Arc;

#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<Config>,
    pub http: reqwest::Client,
}
