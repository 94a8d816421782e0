pub mod dispatcher;
pub mod message;
pub mod provider;
pub mod types;

pub use dispatcher::{ClientScope, DispatchOutcome, PushDispatcher};
pub use message::{build_message, parse_data, MessageVariant};
pub use types::{ApnsConfig, Aps, FcmMessage, Notification, SendRequest};
