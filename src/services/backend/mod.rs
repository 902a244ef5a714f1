pub mod client;

pub use client::{BackendClient, RelayRequest, RelayResponse, TransportError};
