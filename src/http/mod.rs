//! Request/response adaptation layer.
//!
//! # Data Flow
//! ```text
//! Buffered request (parts, body bytes, route params)
//!     → context.rs (pooled per-request handle)
//!     → request.rs (lazy on first access)
//!         → body.rs (content-type dispatch → ParsedBody)
//!         → value.rs (key-path resolution over ParsedBody)
//!     → middleware chain + handler
//!     → response.rs (builders, pending headers, captured origin)
//!         → stream.rs (writer-fed bodies, sent unbuffered)
//!     → Send to client
//! ```

pub mod body;
pub mod context;
pub mod request;
pub mod response;
pub mod stream;
pub mod validation;
pub mod value;

pub use body::BodyParser;
pub use context::{Context, ScopeError, ScopeGuard};
pub use request::RequestView;
pub use response::{Cookie, ResponseOrigin, ResponseView, SameSite, StatusResponse};
pub use stream::{StreamWriter, StreamedBody};
pub use validation::{FormRequest, Rules, Validation, ValidationErrors, ValidationOptions, Validator};
pub use value::{ParsedBody, UploadedFile, Value};
