//! Default middleware shipped with the catalogue.
//!
//! | Name               | Type                          |
//! |--------------------|-------------------------------|
//! | `security-headers` | [`SecurityHeadersMiddleware`] |
//! | `cors`             | [`CorsMiddleware`]            |
//! | `compression`      | [`CompressionMiddleware`]     |
//! | `access-log`       | [`AccessLogMiddleware`]       |
//! | `response-time`    | [`ResponseTimeMiddleware`]    |
//! | `rate-limit`       | [`RateLimitMiddleware`]       |

pub mod access_log;
pub mod compression;
pub mod cors;
pub mod rate_limit;
pub mod response_time;
pub mod security_headers;

pub use access_log::AccessLogMiddleware;
pub use compression::{Algorithm, CompressionLevel, CompressionMiddleware};
pub use cors::CorsMiddleware;
pub use rate_limit::RateLimitMiddleware;
pub use response_time::ResponseTimeMiddleware;
pub use security_headers::SecurityHeadersMiddleware;
