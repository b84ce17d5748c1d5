//! The two prompt flavours served by the chat endpoints.

use parley_model::GenerationParams;

use crate::tone::Tone;

/// The name the assistant speaks as.
pub const ASSISTANT_NAME: &str = "EENAPATI";

const GREETING: &str = "Hello! I'm EENAPATI, an advanced AI assistant \
created by Srujan Eenapati. How can I assist you today?\n\n";

const TONE_PLACEHOLDER: &str = "{{TONE}}";

const TOP_P: f32 = 0.8;
const TOP_K: u32 = 40;
const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Selects the prompt template and sampling constants of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PromptVariant {
    /// Conversational plain-text answers, greeting on the first turn.
    Conversational,
    /// Sectioned plain-text answers following an example layout.
    Structured,
}

impl PromptVariant {
    /// Sampling parameters for this variant. They are constants of the
    /// endpoint and never come from the request.
    pub fn params(self) -> GenerationParams {
        let temperature = match self {
            PromptVariant::Conversational => 0.6,
            PromptVariant::Structured => 0.7,
        };
        GenerationParams {
            temperature,
            top_p: TOP_P,
            top_k: TOP_K,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }
    }

    /// The instruction line that steers the register for `tone`.
    pub fn tone_instruction(self, tone: Tone) -> &'static str {
        match (self, tone) {
            (PromptVariant::Conversational, Tone::Casual) => {
                "Respond in a simple, casual, and friendly tone, like a relaxed conversation."
            }
            (PromptVariant::Conversational, Tone::Formal) => {
                "Respond in a formal, professional, and polite tone, using clear language."
            }
            (PromptVariant::Conversational, Tone::Neutral) => {
                "Respond in a clear, professional, and approachable tone."
            }
            (PromptVariant::Structured, Tone::Casual) => {
                "Respond in a simple and casual tone, like a friendly chat. Keep it relaxed and easygoing."
            }
            (PromptVariant::Structured, Tone::Formal) => {
                "Respond in a formal and professional tone, using polite and structured language."
            }
            (PromptVariant::Structured, Tone::Neutral) => {
                "Respond in a balanced, neutral tone that is clear and professional yet approachable."
            }
        }
    }

    /// Whether the greeting line is prepended on the first turn.
    #[inline]
    pub fn greets_first_turn(self) -> bool {
        matches!(self, PromptVariant::Conversational)
    }

    /// Builds the system prompt for `tone`.
    pub fn system_prompt(self, tone: Tone, first_turn: bool) -> String {
        let template = match self {
            PromptVariant::Conversational => {
                include_str!("./prompts/conversational.txt")
            }
            PromptVariant::Structured => {
                include_str!("./prompts/structured.txt")
            }
        };
        let body = template
            .trim_end()
            .replace(TONE_PLACEHOLDER, self.tone_instruction(tone));
        if first_turn && self.greets_first_turn() {
            format!("{GREETING}{body}")
        } else {
            body
        }
    }
}
