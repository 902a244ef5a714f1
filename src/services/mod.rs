pub mod auth;
pub mod backend;
pub mod session;
pub mod trust;
