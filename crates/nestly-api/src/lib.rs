// nestly-api: Async Rust client for the Nest developer streaming API

pub mod auth;
pub mod client;
pub mod codec;
pub mod error;
pub mod event;
pub mod stream;
pub mod transport;

pub use auth::AccessToken;
pub use client::{DEFAULT_API_ROOT, DEFAULT_TOKEN_URL, EntityRef, MAX_REDIRECTS, NestClient};
pub use error::Error;
pub use event::{EventKind, StreamEvent};
pub use stream::EventAssembler;
pub use transport::{TlsMode, TransportConfig};
