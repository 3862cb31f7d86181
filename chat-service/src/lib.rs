pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod rooms;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;
