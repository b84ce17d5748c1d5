//! An abstraction layer for streaming text generation services.
//!
//! This crate establishes a small protocol between the chat pipeline and
//! the generation service it talks to, so that the pipeline can be driven
//! by a real hosted model in production and by a scripted fake in tests
//! without changing a line of the relay code.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
