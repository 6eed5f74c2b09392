//! HTTP handlers for the relay endpoints

pub mod health;
pub mod interactions;
pub mod jenkins;
pub mod slash;

// Re-export handlers
pub use health::{root, status};
pub use interactions::handle_interaction;
pub use jenkins::receive_result;
pub use slash::open_bmi_form;
