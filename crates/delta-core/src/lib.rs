//! Core types for checking a profile document across independent relays.
//!
//! This crate is deliberately free of any async runtime or network client.
//! The relay query service is named only by the [`relay::RelayQuery`] trait;
//! everything else here is plain data and pure functions over it.

// We intentionally use native `async fn`-style futures in traits. Suppress the
// advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod declared;
pub mod document;
pub mod endpoint;
pub mod error;
pub mod outcome;
pub mod reconcile;
pub mod registry;
pub mod relay;
pub mod subject;

pub use error::{Error, Result};
