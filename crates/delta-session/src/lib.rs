//! Async session layer: fans queries out across relays and keeps the
//! reconciled view current.
//!
//! A [`Session`] owns the source registry and the per-endpoint outcome map for
//! one subject at a time. Every query runs as its own task; each result lands
//! in the shared map as soon as it settles, so a reader may observe a
//! partially-resolved fan-out at any moment.

pub mod adapter;
pub mod config;
pub mod error;
mod fanout;
mod session;
mod state;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use session::Session;
pub use state::DeclaredStatus;
