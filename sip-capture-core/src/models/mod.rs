pub mod config;
pub mod error;
pub mod sip_message;
pub mod state;
