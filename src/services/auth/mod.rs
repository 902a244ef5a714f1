pub mod claims;
pub mod cookies;
pub mod factory;
pub mod gate;
pub mod id_token;
pub mod oidc;
pub mod provider;

pub use claims::Claims;
pub use factory::build_auth_gate;
pub use gate::{AuthError, AuthGate, AuthRedirect, CallbackParams, LoginOptions};
pub use id_token::IdTokenError;
pub use oidc::OidcGate;
