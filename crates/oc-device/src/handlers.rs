//! User-registered handler chains, one per inbound event kind.
//!
//! Message, command and property-set handlers form ordered chains that
//! grow by appending. Property queries have a single responder slot where
//! the last registration wins.
//!
//! Registration may overlap with dispatch: readers take a snapshot of the
//! chain (a cloned `Vec` of `Arc`s) and release the lock before invoking
//! anything, so a dispatch never sees a partial append and never blocks
//! another dispatch.

use std::sync::{Arc, PoisonError, RwLock};

use oc_protocol::{
    Command, DeviceMessage, PropertiesQueryRequest, PropertiesQueryResponse, PropertiesSetRequest,
};

/// Observer of one-way platform messages.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, message: &DeviceMessage);
}

/// Votes on a platform command. `false` fails the acknowledgement.
pub trait CommandHandler: Send + Sync {
    fn on_command(&self, command: &Command) -> bool;
}

/// Votes on a property-set request. `false` fails the acknowledgement.
pub trait PropertiesSetHandler: Send + Sync {
    fn on_properties_set(&self, request: &PropertiesSetRequest) -> bool;
}

/// Produces the reply body for a property query.
pub trait PropertiesQueryHandler: Send + Sync {
    fn on_properties_query(&self, request: &PropertiesQueryRequest) -> PropertiesQueryResponse;
}

impl<F> MessageHandler for F
where
    F: Fn(&DeviceMessage) + Send + Sync,
{
    fn on_message(&self, message: &DeviceMessage) {
        self(message)
    }
}

impl<F> CommandHandler for F
where
    F: Fn(&Command) -> bool + Send + Sync,
{
    fn on_command(&self, command: &Command) -> bool {
        self(command)
    }
}

impl<F> PropertiesSetHandler for F
where
    F: Fn(&PropertiesSetRequest) -> bool + Send + Sync,
{
    fn on_properties_set(&self, request: &PropertiesSetRequest) -> bool {
        self(request)
    }
}

impl<F> PropertiesQueryHandler for F
where
    F: Fn(&PropertiesQueryRequest) -> PropertiesQueryResponse + Send + Sync,
{
    fn on_properties_query(&self, request: &PropertiesQueryRequest) -> PropertiesQueryResponse {
        self(request)
    }
}

/// Handler chains owned by one session.
#[derive(Default)]
pub struct HandlerRegistry {
    message: RwLock<Vec<Arc<dyn MessageHandler>>>,
    command: RwLock<Vec<Arc<dyn CommandHandler>>>,
    properties_set: RwLock<Vec<Arc<dyn PropertiesSetHandler>>>,
    properties_query: RwLock<Option<Arc<dyn PropertiesQueryHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ──────────────────────────────────────────

    pub fn add_message_handler(&self, handler: impl MessageHandler + 'static) {
        let handler: Arc<dyn MessageHandler> = Arc::new(handler);
        append(&self.message, handler);
    }

    pub fn add_command_handler(&self, handler: impl CommandHandler + 'static) {
        let handler: Arc<dyn CommandHandler> = Arc::new(handler);
        append(&self.command, handler);
    }

    pub fn add_properties_set_handler(&self, handler: impl PropertiesSetHandler + 'static) {
        let handler: Arc<dyn PropertiesSetHandler> = Arc::new(handler);
        append(&self.properties_set, handler);
    }

    /// Install the property query responder, replacing any previous one.
    pub fn set_properties_query_handler(&self, handler: impl PropertiesQueryHandler + 'static) {
        let mut slot = self
            .properties_query
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(handler) as Arc<dyn PropertiesQueryHandler>);
    }

    // ── Snapshots for dispatch ────────────────────────────────

    pub fn message_handlers(&self) -> Vec<Arc<dyn MessageHandler>> {
        snapshot(&self.message)
    }

    pub fn command_handlers(&self) -> Vec<Arc<dyn CommandHandler>> {
        snapshot(&self.command)
    }

    pub fn properties_set_handlers(&self) -> Vec<Arc<dyn PropertiesSetHandler>> {
        snapshot(&self.properties_set)
    }

    pub fn properties_query_handler(&self) -> Option<Arc<dyn PropertiesQueryHandler>> {
        snapshot(&self.properties_query)
    }
}

fn append<T: ?Sized>(chain: &RwLock<Vec<Arc<T>>>, handler: Arc<T>) {
    chain
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(handler);
}

fn snapshot<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}
