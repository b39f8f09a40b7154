pub mod auth;
pub mod commands;
pub mod device;
pub mod events;
pub mod messages;
pub mod properties;
pub mod response;
pub mod topics;

pub use auth::{CredentialError, Credentials};
pub use commands::*;
pub use device::*;
pub use events::*;
pub use messages::*;
pub use properties::*;
pub use response::*;
pub use topics::{TopicKind, TopicTable};
