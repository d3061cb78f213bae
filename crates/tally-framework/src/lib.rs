//! # Tally Framework
//!
//! The processing stages of a dispatch cycle and the helpers handler authors
//! use.
//!
//! - [`Enricher`]: resolves user, button and session state for a raw event
//! - [`FanOutDispatcher`]: runs reactive handlers concurrently and merges
//!   their envelopes
//! - [`HandlerRegistry`]: the frozen, ordered list of handlers
//! - [`HandlerBuilder`]: closure-based handlers
//! - [`screen`]: screen, callback and keyboard helpers
//! - [`memory`]: in-memory stores

pub mod dispatcher;
pub mod enrich;
pub mod handler;
pub mod memory;
pub mod registry;
pub mod screen;

pub use dispatcher::{DEFAULT_POOL_SIZE, DispatchOutcome, FanOutDispatcher};
pub use enrich::{Enricher, Enrichment};
pub use handler::{
    CheckFn, FnHandler, HandlerBuilder, on_action, on_command, on_inline_query, on_text,
};
pub use memory::{
    DEFAULT_BUTTON_CAPACITY, DEFAULT_BUTTON_TTL, MemoryButtonStore, MemorySessionStore,
    MemoryUserService,
};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder};
