pub mod auth;
pub mod health;
pub mod relay;
pub mod session;
