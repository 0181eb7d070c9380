//! Resume-after-gap reconciliation.
//!
//! When a returning user's cached context disagrees with durable state, we
//! ask rather than silently resuming or silently restarting. The cache only
//! shapes the prose of that question; durable state stays authoritative for
//! every commit, so the worst a stale or corrupted cache can cause is a
//! confusing summary, never a wrong business decision.

use crate::lead::{ConversationState, Lead};
use crate::messaging::types::OutboundMessage;
use crate::store::SessionContext;
use crate::texts;

/// Decide whether the gap between cached and durable state warrants a
/// resume prompt. `None` means proceed normally, the common case for a
/// user active within the same session, and always the case when no
/// context survived.
pub fn assess(lead: &Lead, cached: Option<&SessionContext>) -> Option<OutboundMessage> {
    let cached = cached?;
    if cached.state == lead.state {
        return None;
    }
    // A brand-new or already-finished conversation has nothing to resume.
    if lead.state == ConversationState::Start || lead.state.is_terminal() {
        return None;
    }

    Some(OutboundMessage::with_buttons(
        texts::resume_prompt(lead.language, &cached.slots),
        texts::resume_buttons(lead.language),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::{Language, LeadKey, TenantId, UserKey};
    use crate::lead::{BudgetRange, SlotValues};
    use crate::messaging::types::Action;

    fn lead_in(state: ConversationState) -> Lead {
        let key = LeadKey::new(
            TenantId("9".to_string()),
            UserKey::normalize("777").unwrap(),
        );
        let mut lead = Lead::new(key, Language::En, Utc::now());
        lead.state = state;
        lead
    }

    fn cached_at(state: ConversationState, slots: SlotValues) -> SessionContext {
        SessionContext {
            state,
            slots,
            pending_slot: None,
            language: Language::En,
        }
    }

    #[test]
    fn no_cache_means_no_prompt() {
        let lead = lead_in(ConversationState::SlotFilling);
        assert_eq!(assess(&lead, None), None);
    }

    #[test]
    fn matching_states_proceed_silently() {
        let lead = lead_in(ConversationState::SlotFilling);
        let ctx = cached_at(ConversationState::SlotFilling, SlotValues::default());
        assert_eq!(assess(&lead, Some(&ctx)), None);
    }

    #[test]
    fn divergence_prompts_with_cached_summary_and_choices() {
        let mut lead = lead_in(ConversationState::SlotFilling);
        lead.slots.budget = BudgetRange::new(Some(1_000_000), None);

        let ctx = cached_at(
            ConversationState::HardGate,
            SlotValues {
                budget: BudgetRange::new(Some(1_000_000), None),
                ..Default::default()
            },
        );

        let prompt = assess(&lead, Some(&ctx)).expect("resume prompt");
        assert!(prompt.text.contains("1000000"), "{}", prompt.text);
        let actions: Vec<Action> = prompt.buttons.iter().map(|b| b.action).collect();
        assert!(actions.contains(&Action::ResumeContinue));
        assert!(actions.contains(&Action::ResumeRestart));
    }

    #[test]
    fn terminal_conversations_never_prompt() {
        let lead = lead_in(ConversationState::Completed);
        let ctx = cached_at(ConversationState::SlotFilling, SlotValues::default());
        assert_eq!(assess(&lead, Some(&ctx)), None);
    }
}
