//! Module unlocking and the onboarding access gate.
//!
//! Lock state is always derived from current progress and never stored.

use thiserror::Error;

use crate::model::{CardId, CompletionLookup, Curriculum, Module, ModuleId};

/// Whether the module at `index` is locked for the given progress.
///
/// Module 0 is never locked. Any later module is locked until every
/// non-bonus card of the previous module is completed. A previous module
/// with only bonus cards keeps the next one locked.
#[must_use]
pub fn is_locked<P: CompletionLookup>(index: usize, modules: &[Module], progress: &P) -> bool {
    if index == 0 {
        return false;
    }
    let Some(previous) = modules.get(index - 1) else {
        return true;
    };
    progress.completion_percentage(previous.required_card_ids()) < 100
}

/// Derived board state for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleState {
    pub module_id: ModuleId,
    pub position: usize,
    pub locked: bool,
    /// Completion over all cards of the module, bonus included.
    pub percentage: u8,
}

#[must_use]
pub fn module_states<P: CompletionLookup>(curriculum: &Curriculum, progress: &P) -> Vec<ModuleState> {
    let modules = curriculum.modules();
    modules
        .iter()
        .enumerate()
        .map(|(index, module)| ModuleState {
            module_id: module.id().clone(),
            position: module.position(),
            locked: is_locked(index, modules, progress),
            percentage: progress.completion_percentage(module.card_ids()),
        })
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AccessDenied {
    #[error("complete the onboarding card {onboarding} before opening other cards")]
    OnboardingIncomplete { onboarding: CardId },

    #[error("module {module} is locked until the previous module is completed")]
    ModuleLocked { module: ModuleId },

    #[error("unknown card: {0}")]
    UnknownCard(CardId),
}

/// Refuses cards of locked modules, and any card but the onboarding one
/// until the onboarding card is completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGate {
    onboarding: Option<CardId>,
}

impl AccessGate {
    #[must_use]
    pub fn new(onboarding: Option<CardId>) -> Self {
        Self { onboarding }
    }

    /// Gate keyed on the first card of the curriculum, unless overridden.
    #[must_use]
    pub fn for_curriculum(curriculum: &Curriculum, override_card: Option<&CardId>) -> Self {
        let onboarding = override_card
            .cloned()
            .or_else(|| curriculum.first_card().map(|c| c.id().clone()));
        Self { onboarding }
    }

    #[must_use]
    pub fn onboarding_card(&self) -> Option<&CardId> {
        self.onboarding.as_ref()
    }

    /// # Errors
    ///
    /// Returns `AccessDenied::UnknownCard` when the card is not part of the
    /// curriculum, `AccessDenied::OnboardingIncomplete` while the
    /// onboarding card is not completed and `AccessDenied::ModuleLocked`
    /// when the card's module is locked.
    pub fn check_open<P: CompletionLookup>(
        &self,
        curriculum: &Curriculum,
        card: &CardId,
        progress: &P,
    ) -> Result<(), AccessDenied> {
        let Some(index) = curriculum.module_index_of(card) else {
            return Err(AccessDenied::UnknownCard(card.clone()));
        };
        if let Some(onboarding) = &self.onboarding {
            // The onboarding card stays reachable wherever it sits.
            if onboarding == card {
                return Ok(());
            }
            if !progress.is_completed(onboarding) {
                return Err(AccessDenied::OnboardingIncomplete {
                    onboarding: onboarding.clone(),
                });
            }
        }
        if is_locked(index, curriculum.modules(), progress) {
            return Err(AccessDenied::ModuleLocked {
                module: curriculum.modules()[index].id().clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressMap;

    fn curriculum() -> Curriculum {
        Curriculum::from_json(
            r#"{"modules": [
                {"id": "m0", "title": "Start", "cards": [
                    {"id": "inst-1", "title": "Instructions", "type": "text"}
                ]},
                {"id": "m1", "title": "Choose", "cards": [
                    {"id": "a", "title": "A", "type": "text"},
                    {"id": "b", "title": "B", "type": "checklist"},
                    {"id": "bonus", "title": "Bônus: extra", "type": "text"}
                ]},
                {"id": "m2", "title": "Build", "cards": [
                    {"id": "c", "title": "C", "type": "video"}
                ]},
                {"id": "m3", "title": "Only bonus", "cards": [
                    {"id": "d", "title": "BONUS deep dive", "type": "text"}
                ]},
                {"id": "m4", "title": "After bonus", "cards": []}
            ]}"#,
        )
        .unwrap()
    }

    fn progress(done: &[&str]) -> ProgressMap {
        done.iter().map(|id| (CardId::new(*id), true)).collect()
    }

    #[test]
    fn first_module_is_never_locked() {
        let c = curriculum();
        assert!(!is_locked(0, c.modules(), &ProgressMap::new()));
        assert!(!is_locked(0, c.modules(), &progress(&["a", "b"])));
    }

    #[test]
    fn module_unlocks_when_previous_required_cards_complete() {
        let c = curriculum();
        assert!(is_locked(1, c.modules(), &ProgressMap::new()));
        assert!(!is_locked(1, c.modules(), &progress(&["inst-1"])));
        assert!(is_locked(2, c.modules(), &progress(&["inst-1", "a"])));
        assert!(!is_locked(2, c.modules(), &progress(&["inst-1", "a", "b"])));
    }

    #[test]
    fn bonus_cards_never_block() {
        let c = curriculum();
        let p = progress(&["a", "b"]);
        assert!(!p.get(&CardId::new("bonus")));
        assert!(!is_locked(2, c.modules(), &p));
    }

    #[test]
    fn module_after_bonus_only_module_stays_locked() {
        let c = curriculum();
        assert!(is_locked(4, c.modules(), &progress(&["d"])));
    }

    #[test]
    fn module_states_report_percentages() {
        let c = curriculum();
        let states = module_states(&c, &progress(&["inst-1", "a"]));
        assert_eq!(states.len(), 5);
        assert!(!states[1].locked);
        assert_eq!(states[1].percentage, 33);
        assert!(states[2].locked);
    }

    #[test]
    fn gate_refuses_other_cards_until_onboarding_done() {
        let c = curriculum();
        let gate = AccessGate::for_curriculum(&c, None);
        let empty = ProgressMap::new();
        assert_eq!(gate.check_open(&c, &CardId::new("inst-1"), &empty), Ok(()));
        assert_eq!(
            gate.check_open(&c, &CardId::new("a"), &empty),
            Err(AccessDenied::OnboardingIncomplete {
                onboarding: CardId::new("inst-1")
            })
        );
        assert_eq!(
            gate.check_open(&c, &CardId::new("a"), &progress(&["inst-1"])),
            Ok(())
        );
    }

    #[test]
    fn gate_refuses_cards_of_locked_modules() {
        let c = curriculum();
        let gate = AccessGate::for_curriculum(&c, None);
        let p = progress(&["inst-1", "a"]);
        assert_eq!(gate.check_open(&c, &CardId::new("bonus"), &p), Ok(()));
        assert_eq!(
            gate.check_open(&c, &CardId::new("c"), &p),
            Err(AccessDenied::ModuleLocked {
                module: ModuleId::new("m2")
            })
        );
        assert_eq!(
            gate.check_open(&c, &CardId::new("c"), &progress(&["inst-1", "a", "b"])),
            Ok(())
        );
    }

    #[test]
    fn onboarding_card_in_a_later_module_stays_reachable() {
        let c = curriculum();
        let gate = AccessGate::for_curriculum(&c, Some(&CardId::new("c")));
        let empty = ProgressMap::new();
        assert_eq!(gate.check_open(&c, &CardId::new("c"), &empty), Ok(()));
        assert_eq!(
            gate.check_open(&c, &CardId::new("a"), &progress(&["c"])),
            Err(AccessDenied::ModuleLocked {
                module: ModuleId::new("m1")
            })
        );
    }

    #[test]
    fn gate_reports_unknown_cards() {
        let c = curriculum();
        let gate = AccessGate::for_curriculum(&c, Some(&CardId::new("a")));
        assert_eq!(gate.onboarding_card(), Some(&CardId::new("a")));
        assert_eq!(
            gate.check_open(&c, &CardId::new("nope"), &ProgressMap::new()),
            Err(AccessDenied::UnknownCard(CardId::new("nope")))
        );
    }
}
