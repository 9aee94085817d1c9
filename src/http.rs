//! Convenient re-exports of the http types that are part of `pactmock`'s public API,
//! e.g. in [`Request`](crate::Request).
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
pub use url::Url;
