// proxy module - campus gateway service

pub mod auth;
pub mod client_ip;
pub mod error;
pub mod forwarder;
pub mod handlers; // API endpoint handlers
pub mod middleware; // Axum middleware
pub mod server;
pub mod upstream; // iClass upstream client

pub use auth::ApiKeySet;
pub use server::AxumServer;
