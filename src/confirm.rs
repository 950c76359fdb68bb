//! Holds a destructive command until the user accepts or cancels it.

use crate::error::PipelineError;
use crate::intent::DestructiveIntent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConfirmation {
    /// Input exactly as submitted.
    pub text: String,
    pub intent: DestructiveIntent,
}

/// At most one confirmation is live at a time. There is no timeout: cancel is
/// the only exit that does not dispatch.
#[derive(Debug, Default)]
pub struct ConfirmationGate {
    pending: Option<PendingConfirmation>,
}

impl ConfirmationGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        &mut self,
        text: impl Into<String>,
        intent: DestructiveIntent,
    ) -> Result<&PendingConfirmation, PipelineError> {
        if let Some(pending) = &self.pending {
            return Err(PipelineError::ConfirmationRequired {
                message: pending.intent.confirmation_message.clone(),
            });
        }
        Ok(&*self.pending.insert(PendingConfirmation {
            text: text.into(),
            intent,
        }))
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingConfirmation> {
        self.pending.as_ref()
    }

    /// Closes the gate and releases the original text for dispatch.
    pub fn accept(&mut self) -> Option<String> {
        self.pending.take().map(|pending| pending.text)
    }

    /// Closes the gate and hands the original text back for editing.
    pub fn cancel(&mut self) -> Option<String> {
        self.pending.take().map(|pending| pending.text)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ConfirmationGate;
    use crate::error::PipelineError;
    use crate::intent::detect_destructive;

    #[test]
    fn cancel_returns_text_byte_identical() {
        let raw = "  Delete ALL   tasks!! ";
        let mut gate = ConfirmationGate::new();
        gate.open(raw, detect_destructive(raw).expect("destructive"))
            .expect("gate opens");

        assert_eq!(gate.cancel().as_deref(), Some(raw));
        assert!(!gate.is_open());
        assert_eq!(gate.accept(), None);
    }

    #[test]
    fn accept_releases_original_text() {
        let mut gate = ConfirmationGate::new();
        let intent = detect_destructive("clear my list").expect("destructive");
        gate.open("clear my list", intent).expect("gate opens");

        assert_eq!(gate.accept().as_deref(), Some("clear my list"));
        assert!(!gate.is_open());
    }

    #[test]
    fn second_confirmation_is_refused_while_one_is_open() {
        let mut gate = ConfirmationGate::new();
        let first = detect_destructive("delete all tasks").expect("destructive");
        let second = detect_destructive("delete all completed tasks").expect("destructive");
        gate.open("delete all tasks", first.clone()).expect("gate opens");

        let error = gate
            .open("delete all completed tasks", second)
            .expect_err("only one gate is live");
        assert_eq!(
            error,
            PipelineError::ConfirmationRequired {
                message: first.confirmation_message.clone()
            }
        );
        assert_eq!(gate.pending().map(|p| p.text.as_str()), Some("delete all tasks"));
    }
}
