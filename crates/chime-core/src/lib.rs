//! Core types and trait definitions for the Chime notification engine.
//!
//! No HTTP or database code lives here; the store, gateway and engine crates
//! build on these types.

// Trait methods spell out `Send` futures where it matters; implementors are
// free to use `async fn`.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod frequency;
pub mod gateway;
pub mod message;
pub mod phone;
pub mod render;
pub mod store;
pub mod subscription;
pub mod template;

pub use error::{Error, Result};
