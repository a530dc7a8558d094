//! Core types and trait definitions for rollcall attendance tracking.
//!
//! This crate is free of HTTP, camera, and database dependencies. Storage and
//! identity backends implement [`store::AttendanceStore`] and
//! [`identity::IdentityProvider`]; the reconciliation engine in [`engine`]
//! is written against those traits only.

// Native `async fn` in traits; the `Send` bound is spelled out on the
// returned futures instead.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod engine;
pub mod error;
pub mod identity;
pub mod record;
pub mod session;
pub mod store;
pub mod subject;

pub use error::{BackendError, Error, Result};
