pub mod message;

pub use message::{ChatMessageResponse, Message};
