//! Activation policy
//!
//! Decides when the preview pane switches artifacts on its own. The first
//! artifact of a fresh turn is activated automatically; once the user selects
//! or dismisses anything, automatic activation stays off until the next turn.

use crate::registry::ArtifactRegistry;
use lumen_artifact::ArtifactId;
use serde::Serialize;

/// Who last chose the active artifact this turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Nothing activated yet this turn
    #[default]
    None,
    /// The system picked the first artifact
    Auto,
    /// The user selected or dismissed something
    User,
}

/// Activation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    /// Transition not in the allowed table
    #[error("illegal activation transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// State before
        from: ActivationState,
        /// Requested state
        to: ActivationState,
    },
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: ActivationState) -> Vec<ActivationState> {
    use ActivationState::{Auto, None, User};
    match from {
        None => vec![Auto, User],
        Auto => vec![User, None],
        User => vec![User, None],
    }
}

/// Check a transition against [`allowed_transitions`]
pub fn validate_transition(
    from: ActivationState,
    to: ActivationState,
) -> Result<(), ActivationError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ActivationError::IllegalTransition { from, to })
    }
}

/// Per-turn activation state machine
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivationPolicy {
    state: ActivationState,
}

impl ActivationPolicy {
    /// Create policy for a fresh turn
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Whether a newly created artifact would be auto-activated
    #[inline]
    #[must_use]
    pub fn auto_enabled(&self) -> bool {
        self.state == ActivationState::None
    }

    /// Move to `to`, rejecting transitions outside the table
    pub fn transition(&mut self, to: ActivationState) -> Result<(), ActivationError> {
        if let Err(err) = validate_transition(self.state, to) {
            tracing::warn!(from = ?self.state, to = ?to, "rejected activation transition");
            return Err(err);
        }
        tracing::debug!(from = ?self.state, to = ?to, "activation transition");
        self.state = to;
        Ok(())
    }

    /// React to an artifact created by an upsert
    ///
    /// Activates it when nothing has been activated yet this turn. Returns
    /// whether the registry's active pointer changed.
    pub fn on_created(&mut self, registry: &mut ArtifactRegistry, id: &ArtifactId) -> bool {
        if !self.auto_enabled() || !registry.set_active(Some(id.as_str())) {
            return false;
        }
        // None -> Auto is always in the table
        self.state = ActivationState::Auto;
        tracing::info!(%id, "auto-activated artifact");
        true
    }

    /// User picked an artifact
    ///
    /// Unknown ids leave both the registry and the state untouched.
    pub fn select(
        &mut self,
        registry: &mut ArtifactRegistry,
        id: &str,
    ) -> Result<bool, ActivationError> {
        if !registry.contains(id) {
            tracing::debug!(id, "select ignored for unknown artifact");
            return Ok(false);
        }
        self.transition(ActivationState::User)?;
        registry.set_active(Some(id));
        tracing::info!(id, "user activated artifact");
        Ok(true)
    }

    /// User closed the preview
    pub fn dismiss(&mut self, registry: &mut ArtifactRegistry) -> Result<(), ActivationError> {
        self.transition(ActivationState::User)?;
        registry.set_active(None);
        tracing::info!("user dismissed preview");
        Ok(())
    }

    /// Card click: dismiss if `id` is already active, otherwise select it
    ///
    /// Returns the id that is active afterwards.
    pub fn toggle(
        &mut self,
        registry: &mut ArtifactRegistry,
        id: &str,
    ) -> Result<Option<ArtifactId>, ActivationError> {
        if registry.active_id().is_some_and(|active| active.as_str() == id) {
            self.dismiss(registry)?;
        } else {
            self.select(registry, id)?;
        }
        Ok(registry.active_id().cloned())
    }

    /// Start a new turn
    pub fn reset(&mut self) {
        self.state = ActivationState::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_artifact::{ArtifactDraft, ArtifactKind};

    const ALL: [ActivationState; 3] = [
        ActivationState::None,
        ActivationState::Auto,
        ActivationState::User,
    ];

    fn registry_with(ids: &[&str]) -> ArtifactRegistry {
        let mut registry = ArtifactRegistry::new();
        for name in ids {
            let id = ArtifactId::new(*name).unwrap();
            registry.upsert(ArtifactDraft::new(id, ArtifactKind::Markdown, "# x"));
        }
        registry
    }

    fn aid(s: &str) -> ArtifactId {
        ArtifactId::new(s).unwrap()
    }

    #[test]
    fn transition_table() {
        assert!(validate_transition(ActivationState::None, ActivationState::Auto).is_ok());
        assert!(validate_transition(ActivationState::Auto, ActivationState::User).is_ok());
        assert!(validate_transition(ActivationState::User, ActivationState::User).is_ok());
        assert!(validate_transition(ActivationState::User, ActivationState::Auto).is_err());
        assert!(validate_transition(ActivationState::Auto, ActivationState::Auto).is_err());
    }

    #[test]
    fn every_state_can_reset() {
        for from in ALL {
            if from != ActivationState::None {
                assert!(allowed_transitions(from).contains(&ActivationState::None));
            }
        }
    }

    #[test]
    fn first_created_is_auto_activated() {
        let mut registry = registry_with(&["a", "b"]);
        let mut policy = ActivationPolicy::new();

        assert!(policy.on_created(&mut registry, &aid("a")));
        assert_eq!(policy.state(), ActivationState::Auto);

        assert!(!policy.on_created(&mut registry, &aid("b")));
        assert_eq!(registry.active_id(), Some(&aid("a")));
    }

    #[test]
    fn user_choice_disables_auto_until_reset() {
        let mut registry = registry_with(&["a"]);
        let mut policy = ActivationPolicy::new();

        policy.dismiss(&mut registry).unwrap();
        assert_eq!(policy.state(), ActivationState::User);
        assert!(!policy.on_created(&mut registry, &aid("a")));
        assert!(registry.active().is_none());

        policy.reset();
        assert!(policy.on_created(&mut registry, &aid("a")));
    }

    #[test]
    fn select_unknown_keeps_state() {
        let mut registry = registry_with(&["a"]);
        let mut policy = ActivationPolicy::new();

        assert_eq!(policy.select(&mut registry, "ghost"), Ok(false));
        assert_eq!(policy.state(), ActivationState::None);
    }

    #[test]
    fn toggle_selects_then_dismisses() {
        let mut registry = registry_with(&["a", "b"]);
        let mut policy = ActivationPolicy::new();
        policy.on_created(&mut registry, &aid("a"));

        assert_eq!(policy.toggle(&mut registry, "b"), Ok(Some(aid("b"))));
        assert_eq!(policy.state(), ActivationState::User);
        assert_eq!(policy.toggle(&mut registry, "b"), Ok(None));
        assert_eq!(policy.toggle(&mut registry, "a"), Ok(Some(aid("a"))));
    }

    #[test]
    fn illegal_transition_is_an_error() {
        let mut policy = ActivationPolicy::new();
        policy.transition(ActivationState::User).unwrap();
        assert_eq!(
            policy.transition(ActivationState::Auto),
            Err(ActivationError::IllegalTransition {
                from: ActivationState::User,
                to: ActivationState::Auto,
            })
        );
        assert_eq!(policy.state(), ActivationState::User);
    }
}
