pub mod message_store;

pub use message_store::{MemoryMessageStore, MessageStore, PgMessageStore};
