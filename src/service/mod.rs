pub mod agents;
pub mod chat;
pub mod sessions;
pub mod settings;
pub mod todos;
