//! Cross-cutting HTTP concerns layered around the router: authentication,
//! CSRF, rate limiting, request validation and response headers.

pub mod auth;
pub mod csrf;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use auth::AuthUser;
pub use ip::MaybeRemoteAddr;
pub use rate_limit::EndpointRateLimiter;
