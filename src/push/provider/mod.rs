pub mod credential;
pub mod error;
pub mod fcm;
pub mod mock;
pub mod provider_trait;
pub mod registry;

pub use credential::ServiceAccountKey;
pub use error::BackendError;
pub use fcm::FcmBackend;
pub use mock::{MockBackend, MockBehavior};
pub use provider_trait::{MessagingBackend, ScopedClient};
pub use registry::ScopeRegistry;
