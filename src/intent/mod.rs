//! Pre-dispatch intent gate.
//!
//! Classifies raw chat input before any network call. Empty and too-short
//! input is handled here; everything else goes through a replaceable
//! [`IntentPolicy`], by default the lexical tables in [`LexicalPolicy`].

mod destructive;
mod patterns;

pub use destructive::{
    detect_destructive, DestructiveCategory, DestructiveIntent, DestructiveOperation,
    DestructiveScope,
};
pub use patterns::{capability_examples, UnsupportedCategory};

/// Shortest input, in characters after trimming, that can be dispatched.
pub const MIN_INPUT_CHARS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Empty or whitespace-only; rejected silently.
    Empty,
    TooShort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    /// Guidance to show the user; `None` for silent rejections.
    pub guidance: Option<Guidance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceKind {
    TooShort,
    Capabilities,
    Unclear,
    Unsupported(UnsupportedCategory),
}

/// Assistant-style message with example commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guidance {
    pub kind: GuidanceKind,
    pub message: String,
    pub examples: Vec<String>,
}

impl Guidance {
    /// Message plus examples as one block of text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = self.message.clone();
        if !self.examples.is_empty() {
            text.push_str("\n\nTry:");
            for example in &self.examples {
                text.push_str("\n- ");
                text.push_str(example);
            }
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentDecision {
    Reject(Rejection),
    Guide(Guidance),
    ConfirmDestructive(DestructiveIntent),
    /// Trimmed input, ready for the dispatcher.
    Dispatchable(String),
}

impl IntentDecision {
    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Dispatchable(_))
    }
}

/// Classifies non-trivial input. Implementations must be pure.
pub trait IntentPolicy: Send + Sync {
    fn classify(&self, input: &str) -> IntentDecision;
}

/// Ordered lexical tables: greeting/help, unclear, unsupported action,
/// destructive, then dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalPolicy;

impl IntentPolicy for LexicalPolicy {
    fn classify(&self, input: &str) -> IntentDecision {
        if patterns::is_greeting_or_help(input) {
            return IntentDecision::Guide(patterns::capability_guidance());
        }
        if patterns::is_unclear(input) {
            return IntentDecision::Guide(patterns::unclear_guidance());
        }
        if let Some(category) = patterns::unsupported_category(input) {
            return IntentDecision::Guide(patterns::redirect_guidance(category, input));
        }
        if let Some(intent) = detect_destructive(input) {
            return IntentDecision::ConfirmDestructive(intent);
        }
        IntentDecision::Dispatchable(input.to_string())
    }
}

pub struct IntentGate {
    policy: Box<dyn IntentPolicy>,
}

impl Default for IntentGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IntentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentGate").finish_non_exhaustive()
    }
}

impl IntentGate {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(LexicalPolicy)
    }

    #[must_use]
    pub fn with_policy(policy: impl IntentPolicy + 'static) -> Self {
        Self {
            policy: Box::new(policy),
        }
    }

    /// First match wins: empty, too short, then the policy.
    #[must_use]
    pub fn classify(&self, input: &str) -> IntentDecision {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return IntentDecision::Reject(Rejection {
                reason: RejectReason::Empty,
                guidance: None,
            });
        }
        if trimmed.chars().count() < MIN_INPUT_CHARS {
            return IntentDecision::Reject(Rejection {
                reason: RejectReason::TooShort,
                guidance: Some(patterns::too_short_guidance()),
            });
        }
        self.policy.classify(trimmed)
    }
}
