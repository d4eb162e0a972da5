// Chat sessions per user, persisted in a JSON store

pub mod assistant;
pub mod conversation;
pub mod store;

pub use assistant::{Assistant, EMPTY_INPUT_REPLY, process_user_input};
pub use conversation::{Conversation, FIRST_SESSION};
pub use store::{ChatMessage, Role, UserRecord, UserStore, timestamp};
