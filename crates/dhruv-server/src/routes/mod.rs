//! API routes.

pub mod chat;
pub mod health;
pub mod intake;
pub mod user;

pub use chat::{
    ChatModelId, ChatRequest, ClientMessage, MessagePart, chat_handler, delete_chat_handler,
    resume_handler,
};
pub use health::health_routes;
pub use intake::{IntakeResponse, intake_summary_handler};
pub use user::{UpdateDetailsRequest, update_details_handler};
