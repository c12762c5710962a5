mod api_key;
mod cors;

pub use api_key::{ApiKeyMiddlewareFactory, ApiKeyMiddlewareService, API_KEY_HEADER};
pub use cors::{CorsMiddlewareFactory, CorsMiddlewareService};
