//! # Tally Transport for Telegram
//!
//! Connects the Tally gateway to the Telegram Bot API over HTTPS long polling.
//!
//! ## Overview
//!
//! - [`TelegramApi`]: Bot API client, implements [`Outbound`](tally_core::Outbound)
//! - [`poller::spawn`]: background `getUpdates` loop feeding an
//!   [`UpdateStream`], which implements [`EventStream`](tally_core::EventStream)
//! - [`model`]: wire payloads and their translation into [`RawEvent`](tally_core::RawEvent)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tally_telegram::{TelegramApi, TelegramConfig, poller};
//! use tokio_util::sync::CancellationToken;
//!
//! let api = TelegramApi::new(TelegramConfig::with_token(token))?;
//! let shutdown = CancellationToken::new();
//! let (stream, poller) = poller::spawn(api.clone(), shutdown.child_token());
//! // hand `stream` and `api` to the listener
//! ```

pub mod api;
pub mod config;
pub mod model;
pub mod poller;

pub use api::{TelegramApi, payload};
pub use config::{DEFAULT_API_BASE, TelegramConfig};
pub use model::{ApiResponse, TgUser, Update};
pub use poller::{UpdateStream, next_backoff};
