//! Consent gate shown before the camera is used

use thiserror::Error;

/// Outcome of the consent prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConsentDecision {
    #[default]
    Pending,
    /// Agreed, with the name the visitor entered
    Agreed(String),
    Declined,
}

/// What the visitor did with the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentAnswer {
    Agree(String),
    Disagree,
    /// Prompt dismissed without answering
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsentError {
    /// A decision was already taken for this session
    #[error("consent was already decided")]
    AlreadyDecided,
    /// Agreeing requires a non-blank name
    #[error("a name is required to agree")]
    MissingName,
}

/// Single-transition state machine: Pending moves to Agreed or Declined once
#[derive(Debug, Default)]
pub struct ConsentGate {
    decision: ConsentDecision,
}

impl ConsentGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decision(&self) -> &ConsentDecision {
        &self.decision
    }

    /// The prompt is only shown while pending
    pub fn needs_prompt(&self) -> bool {
        self.decision == ConsentDecision::Pending
    }

    pub fn is_agreed(&self) -> bool {
        matches!(self.decision, ConsentDecision::Agreed(_))
    }

    pub fn apply(&mut self, answer: ConsentAnswer) -> Result<&ConsentDecision, ConsentError> {
        if !self.needs_prompt() {
            return Err(ConsentError::AlreadyDecided);
        }
        self.decision = match answer {
            ConsentAnswer::Agree(name) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConsentError::MissingName);
                }
                ConsentDecision::Agreed(name.to_string())
            }
            // Closing the prompt counts as declining
            ConsentAnswer::Disagree | ConsentAnswer::Closed => ConsentDecision::Declined,
        };
        log::info!(
            "Consent decided: {}",
            if self.is_agreed() { "agreed" } else { "declined" }
        );
        Ok(&self.decision)
    }
}
