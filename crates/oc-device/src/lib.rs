//! Device-side client for the `$oc` device protocol.
//!
//! A [`Session`] authenticates with time-bound credentials, subscribes to
//! the platform's request topics and routes every inbound request through
//! user-registered handler chains. Commands and property-set requests are
//! acknowledged with the aggregate verdict of their chain; property
//! queries are answered by a single responder.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod mock;
pub mod mqtt_loop;
pub mod report;
pub mod session;

pub use config::DeviceConfig;
pub use dispatch::{Dispatched, Dispatcher};
pub use error::{DeviceError, DeviceResult};
pub use handlers::{
    CommandHandler, HandlerRegistry, MessageHandler, PropertiesQueryHandler, PropertiesSetHandler,
};
pub use mock::RecordingReporter;
pub use report::{ErrorReporter, NoopReporter};
pub use session::Session;
