//! Heuristic tone detection for a single user utterance.

use std::fmt::{self, Display, Formatter};
use std::sync::LazyLock;

use regex::Regex;

// Word boundaries are ASCII-only: a non-ASCII letter next to a keyword does
// not join it into a longer word.
static CASUAL_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)(what's|let's|gotcha)(?-u:\b)")
        .expect("valid casual pattern")
});

static HONORIFICS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u:\b)(Mr\.|Ms\.|Dr\.|Sir|Madam)(?-u:\b)")
        .expect("valid honorific pattern")
});

static TERMINAL_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[.!?]$").expect("valid punctuation pattern")
});

/// The register the response should be written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tone {
    /// Relaxed, friendly register.
    Casual,
    /// Polite, professional register.
    Formal,
    /// Balanced register, used when the signals agree or are both absent.
    Neutral,
}

impl Display for Tone {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Casual => write!(f, "casual"),
            Tone::Formal => write!(f, "formal"),
            Tone::Neutral => write!(f, "neutral"),
        }
    }
}

/// The raw signals a message carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ToneSignals {
    /// Whether any casual marker was found.
    pub casual: bool,
    /// Whether any formal marker was found.
    pub formal: bool,
}

impl ToneSignals {
    /// Inspects `text` for casual and formal markers.
    ///
    /// Note that a message without terminal punctuation counts as a formal
    /// signal, so a bare `"hello"` reads as formal.
    pub fn detect(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let casual = lowered.contains("hey")
            || lowered.contains("cool")
            || CASUAL_WORDS.is_match(text)
            || text.contains('!');
        let formal = text.contains("please")
            || text.contains("kindly")
            || HONORIFICS.is_match(text)
            || !TERMINAL_PUNCTUATION.is_match(text);
        Self { casual, formal }
    }

    /// Resolves the signals into a single tone.
    #[inline]
    pub fn tone(self) -> Tone {
        match (self.casual, self.formal) {
            (true, false) => Tone::Casual,
            (false, true) => Tone::Formal,
            _ => Tone::Neutral,
        }
    }
}

/// Classifies the tone of `text`.
///
/// The text is inspected as received, without trimming.
#[inline]
pub fn classify(text: &str) -> Tone {
    ToneSignals::detect(text).tone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclamation_is_casual() {
        assert_eq!(classify("That works!"), Tone::Casual);
        assert_eq!(classify("wow!"), Tone::Casual);
    }

    #[test]
    fn test_casual_keywords() {
        assert_eq!(classify("Hey there."), Tone::Casual);
        assert_eq!(classify("That is COOL."), Tone::Casual);
        assert_eq!(classify("ok let's go."), Tone::Casual);
        assert_eq!(classify("gotcha."), Tone::Casual);
    }

    #[test]
    fn test_missing_punctuation_reads_as_formal() {
        // Known quirk: no terminal punctuation counts as a formal marker.
        assert_eq!(classify("Hello"), Tone::Formal);
        assert_eq!(classify("tell me about rust"), Tone::Formal);
        assert_eq!(classify("Hello. "), Tone::Formal);
    }

    #[test]
    fn test_formal_markers() {
        assert_eq!(classify("Could you please explain this?"), Tone::Formal);
        assert_eq!(classify("I kindly request a summary."), Tone::Formal);
        assert_eq!(classify("Thank you, Sir."), Tone::Formal);
        assert_eq!(classify("Good evening Madam."), Tone::Formal);
    }

    #[test]
    fn test_markers_are_case_sensitive() {
        // Only `hey` and `cool` are matched case-insensitively.
        assert_eq!(classify("Please explain this."), Tone::Neutral);
        assert_eq!(classify("What's up?"), Tone::Neutral);
        assert_eq!(classify("what's up?"), Tone::Casual);
    }

    #[test]
    fn test_honorific_needs_word_after_dot() {
        assert!(!ToneSignals::detect("Ask Dr. Smith.").formal);
        assert!(ToneSignals::detect("Ask Dr.Smith.").formal);
    }

    #[test]
    fn test_non_ascii_letters_are_not_word_characters() {
        assert_eq!(classify("好的gotcha."), Tone::Casual);
        assert_eq!(classify("Ask Dr.émile."), Tone::Neutral);
        assert_eq!(
            ToneSignals::detect("Ask Dr.émile."),
            ToneSignals::default()
        );
        assert!(ToneSignals::detect("Merci Sirè.").formal);
    }

    #[test]
    fn test_mixed_or_absent_signals_are_neutral() {
        assert_eq!(classify("hey, could you please help?"), Tone::Neutral);
        assert_eq!(classify("Explain monads."), Tone::Neutral);
        assert_eq!(classify("What time is it?"), Tone::Neutral);
        // Casual keyword plus missing punctuation.
        assert_eq!(classify("hey there"), Tone::Neutral);
    }

    #[test]
    fn test_signals() {
        assert_eq!(
            ToneSignals::detect("cool"),
            ToneSignals {
                casual: true,
                formal: true,
            }
        );
        assert_eq!(ToneSignals::detect("Fine."), ToneSignals::default());
    }
}
