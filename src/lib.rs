//! chatline — anonymous live chat in the terminal, with an AI assistant that
//! can summarize the conversation or suggest a reply.
//!
//! ARCHITECTURE
//! ============
//! - `session`: anonymous identity bootstrap and token refresh
//! - `store`: the hosted message collection behind a `MessageStore` trait
//! - `controller`: one live query per controller, full-snapshot views, sends
//! - `assistant`: summarize / suggest-reply over a generative model
//! - `app` + `ui`: the terminal loop and its pure renderers
//!
//! Each external service sits behind an `async_trait` seam with an
//! in-memory implementation used by the tests.

pub mod app;
pub mod assistant;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod session;
pub mod store;
pub mod ui;
