//! Core types and trait definitions for the Herald notification service.
//!
//! This crate is free of HTTP, WebSocket and database
//! dependencies. Every other crate depends on it.

// Store traits use native `async fn`; `Send` bounds are spelled out per method.
#![allow(async_fn_in_trait)]

pub mod connection;
pub mod error;
pub mod event;
pub mod protocol;
pub mod store;

pub use error::{Error, Result};
