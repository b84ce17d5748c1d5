//! The prompt-construction and completion-relay pipeline behind the chat
//! endpoints.
//!
//! A request flows through three steps: the body is validated into a
//! [`ChatRequest`], a [`PromptBuilder`] classifies the tone and flattens the
//! prior turns into one [`Prompt`], and a [`Relay`] streams the completion
//! back fragment by fragment.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod prompt;
mod relay;
pub mod request;
pub mod tone;
pub mod transcript;
pub mod variant;

pub use prompt::{Prompt, PromptBuilder};
pub use relay::{FragmentStream, Relay, RelayError, RelayState};
pub use request::{ChatRequest, ValidationError};
pub use tone::Tone;
pub use variant::PromptVariant;
