pub mod ai;
pub mod config;
pub mod error;
pub mod model;
pub mod state;
pub mod store;

// Re-export main types for convenience
pub use ai::{ChatResponse, DeepSeekClient};
pub use config::{Config, KeySource};
pub use error::{ApiError, StoreError};
pub use model::Model;
pub use state::{Conversation, Message, Role};
pub use store::{ConversationStore, LoadReport, SavedConversation};
