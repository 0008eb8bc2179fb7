pub mod auth;
pub mod response;

pub use auth::{authentication_middleware, AuthUser};
pub use response::{ApiResponse, ApiResult};
