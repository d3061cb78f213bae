//! The frozen handler registry.

use std::fmt;
use std::sync::Arc;

use tally_core::{BoxedHandler, Handler};

/// An ordered, immutable list of handlers.
///
/// Registration order is the tie-breaker when two handlers complete at the
/// same point of a dispatch. Once built, the registry cannot change; cloning
/// it is cheap.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<[BoxedHandler]>,
}

impl HandlerRegistry {
    /// Starts a new registry.
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Iterates handlers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &BoxedHandler> {
        self.handlers.iter()
    }

    /// Names of all handlers, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

impl FromIterator<BoxedHandler> for HandlerRegistry {
    fn from_iter<I: IntoIterator<Item = BoxedHandler>>(iter: I) -> Self {
        Self {
            handlers: iter.into_iter().collect(),
        }
    }
}

/// Collects handlers before the registry is frozen.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: Vec<BoxedHandler>,
}

impl HandlerRegistryBuilder {
    /// Appends a handler.
    pub fn register<H>(mut self, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Appends an already shared handler.
    pub fn register_boxed(mut self, handler: BoxedHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers.into(),
        }
    }
}
