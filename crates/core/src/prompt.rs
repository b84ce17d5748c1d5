//! Assembly of the single prompt document sent to the generation service.

use std::fmt::{self, Display, Formatter};

use crate::request::ChatRequest;
use crate::tone::{self, Tone};
use crate::transcript::{self, HistoryEntry};
use crate::variant::{ASSISTANT_NAME, PromptVariant};

/// A fully assembled prompt document. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    tone: Tone,
    system_prompt: String,
    context: String,
    document: String,
}

impl Prompt {
    /// The tone the message was classified as.
    #[inline]
    pub fn tone(&self) -> Tone {
        self.tone
    }

    /// The system instruction part of the document.
    #[inline]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// The rendered transcript of prior turns, possibly empty.
    #[inline]
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The flattened document.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.document
    }
}

impl Display for Prompt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.document)
    }
}

/// Builds a [`Prompt`] for one incoming message.
#[derive(Clone, Copy, Debug)]
pub struct PromptBuilder<'a> {
    variant: PromptVariant,
    history: &'a [HistoryEntry],
    continuing: bool,
}

impl<'a> PromptBuilder<'a> {
    /// Creates a builder for a first turn without prior history.
    #[inline]
    pub fn new(variant: PromptVariant) -> Self {
        Self {
            variant,
            history: &[],
            continuing: false,
        }
    }

    /// Creates a builder with the prior turns of `req`.
    ///
    /// A request whose history could not be read as turns still counts as
    /// an ongoing conversation.
    pub fn for_request(variant: PromptVariant, req: &'a ChatRequest) -> Self {
        Self {
            continuing: req.has_history,
            ..Self::new(variant).with_history(&req.history)
        }
    }

    /// Sets the prior turns, oldest first.
    #[inline]
    pub fn with_history(mut self, history: &'a [HistoryEntry]) -> Self {
        self.history = history;
        self
    }

    /// Classifies `message` and assembles the document around it.
    pub fn build(&self, message: &str) -> Prompt {
        let tone = tone::classify(message);
        let first_turn =
            !self.continuing && transcript::is_first_turn(self.history);
        let system_prompt = self.variant.system_prompt(tone, first_turn);
        let context =
            transcript::render_transcript(self.history, ASSISTANT_NAME);

        let mut document = format!("{system_prompt}\n\n");
        if !context.is_empty() {
            document.push_str("Previous Conversation:\n");
            document.push_str(&context);
        }
        document.push_str("User: ");
        document.push_str(message);

        trace!(%tone, first_turn, "built prompt");
        Prompt {
            tone,
            system_prompt,
            context,
            document,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_turn_document() {
        let prompt =
            PromptBuilder::new(PromptVariant::Conversational).build("Hello");
        assert_eq!(prompt.tone(), Tone::Formal);
        assert!(prompt.as_str().starts_with("Hello! I'm EENAPATI"));
        assert!(prompt.as_str().ends_with(
            "using the conversation context if available.\n\nUser: Hello"
        ));
        assert!(!prompt.as_str().contains("Previous Conversation:"));
        assert_eq!(prompt.context(), "");
    }

    #[test]
    fn test_document_with_history() {
        let history = [
            HistoryEntry::new("user", "What is Rust?"),
            HistoryEntry::new("assistant", "A language."),
        ];
        let prompt = PromptBuilder::new(PromptVariant::Structured)
            .with_history(&history)
            .build("cool!");
        assert_eq!(prompt.tone(), Tone::Casual);
        let expected_tail = "\n\nPrevious Conversation:\nHuman: What is Rust?\n\
            EENAPATI: A language.\n\nUser: cool!";
        assert!(prompt.as_str().ends_with(expected_tail));
        assert_eq!(
            prompt.as_str(),
            format!("{}{expected_tail}", prompt.system_prompt())
        );
    }

    #[test]
    fn test_no_greeting_with_history() {
        let history = [HistoryEntry::new("user", "Hi")];
        let prompt = PromptBuilder::new(PromptVariant::Conversational)
            .with_history(&history)
            .build("Thanks.");
        assert!(prompt.as_str().starts_with("You are EENAPATI"));
    }

    #[test]
    fn test_history_of_only_invalid_entries() {
        // Not the first turn, but nothing to render either.
        let history = [HistoryEntry::default()];
        let prompt = PromptBuilder::new(PromptVariant::Conversational)
            .with_history(&history)
            .build("Thanks.");
        assert!(prompt.as_str().starts_with("You are EENAPATI"));
        assert!(!prompt.as_str().contains("Previous Conversation:"));
        assert!(prompt.as_str().ends_with("\n\nUser: Thanks."));
    }

    #[test]
    fn test_unreadable_history_is_not_a_first_turn() {
        let req = ChatRequest::from_json(
            br#"{"message":"Hi.","conversationHistory":{"0":1}}"#,
        )
        .unwrap();
        let prompt =
            PromptBuilder::for_request(PromptVariant::Conversational, &req)
                .build(&req.message);
        assert!(prompt.as_str().starts_with("You are EENAPATI"));
        assert_eq!(prompt.context(), "");

        let req = ChatRequest::from_json(br#"{"message":"Hi."}"#).unwrap();
        let prompt =
            PromptBuilder::for_request(PromptVariant::Conversational, &req)
                .build(&req.message);
        assert!(prompt.as_str().starts_with("Hello! I'm EENAPATI"));
    }
}
