pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod infra;
pub mod logging;
pub mod push;

pub use config::{FcmConfig, ServerConfig};
pub use error::{Result, ServerError};
pub use http::{HttpServer, HttpServerState};
pub use push::{DispatchOutcome, FcmMessage, PushDispatcher, SendRequest};
