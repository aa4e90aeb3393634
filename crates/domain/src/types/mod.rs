//! Domain types and models

pub mod diagnostics;
pub mod records;
pub mod request;
pub mod response;

pub use diagnostics::Diagnostics;
pub use records::{CacheEntry, FailureCategory, FailureRecord};
pub use request::{HttpMethod, Request, RequestKey, RequestOptions};
pub use response::{Response, ResponseSource};
