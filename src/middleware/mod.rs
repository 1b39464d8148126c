/// Middleware module
///
/// Bearer-token extraction and session-validating middleware.

mod session_middleware;

pub use session_middleware::{bearer_token, SessionMiddleware};
