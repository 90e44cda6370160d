pub mod auth;

pub use auth::{api_key_middleware, security_headers_middleware};
