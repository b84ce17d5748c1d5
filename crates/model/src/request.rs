use serde::{Deserialize, Serialize};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The fully assembled prompt document.
    pub prompt: String,
    /// Sampling parameters for this request.
    pub params: GenerationParams,
}

/// Sampling parameters that control how the model generates text.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling probability mass.
    pub top_p: f32,
    /// Number of highest probability tokens to consider.
    pub top_k: u32,
    /// Upper bound of generated tokens.
    pub max_output_tokens: u32,
}
