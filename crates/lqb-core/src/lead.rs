//! The lead entity: one qualification conversation per (tenant, user) pair.
//!
//! Slots are typed variants rather than a string dictionary, so "state X
//! requires slots {a, b}" is checkable at compile time instead of being a
//! runtime key convention.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Language, LeadKey};
use crate::scoring::Temperature;

/// Conversation position. Generally forward-progressing; `Closed` is
/// reachable from anywhere via an abandon signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    Start,
    LanguageSelect,
    CollectingName,
    CaptureContact,
    Warmup,
    SlotFilling,
    ValueProposition,
    HardGate,
    Engagement,
    HandoffSchedule,
    HandoffUrgent,
    Completed,
    Closed,
}

impl ConversationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConversationState::Completed | ConversationState::Closed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Buy,
    Rent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    House,
    Commercial,
    Land,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Live,
    Invest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Mortgage,
    Installments,
}

/// Budget with at least one bound. `min <= max` when both are present;
/// [`BudgetRange::new`] swaps misordered bounds rather than rejecting them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl BudgetRange {
    pub fn new(min: Option<u64>, max: Option<u64>) -> Option<Self> {
        match (min, max) {
            (None, None) => None,
            (Some(a), Some(b)) if a > b => Some(Self {
                min: Some(b),
                max: Some(a),
            }),
            _ => Some(Self { min, max }),
        }
    }

    pub fn exact(v: u64) -> Self {
        Self {
            min: Some(v),
            max: Some(v),
        }
    }
}

/// Slot names in canonical collection order. The engine asks for the first
/// missing slot in this order and skips anything already filled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Purpose,
    Transaction,
    Property,
    Budget,
    Location,
    Bedrooms,
    Payment,
}

pub const SLOT_ORDER: [Slot; 7] = [
    Slot::Purpose,
    Slot::Transaction,
    Slot::Property,
    Slot::Budget,
    Slot::Location,
    Slot::Bedrooms,
    Slot::Payment,
];

/// Partial record of slots filled so far. Also used as the update payload of
/// a transition: `None` means "leave as is".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotValues {
    pub purpose: Option<Purpose>,
    pub transaction: Option<TransactionType>,
    pub property: Option<PropertyType>,
    pub budget: Option<BudgetRange>,
    pub location: Option<String>,
    pub bedrooms: Option<u8>,
    pub payment: Option<PaymentMethod>,
}

impl SlotValues {
    pub fn is_filled(&self, slot: Slot) -> bool {
        match slot {
            Slot::Purpose => self.purpose.is_some(),
            Slot::Transaction => self.transaction.is_some(),
            Slot::Property => self.property.is_some(),
            Slot::Budget => self.budget.is_some(),
            Slot::Location => self.location.is_some(),
            Slot::Bedrooms => self.bedrooms.is_some(),
            Slot::Payment => self.payment.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        SLOT_ORDER.iter().all(|s| !self.is_filled(*s))
    }

    /// First slot in canonical order not yet filled.
    pub fn first_missing(&self) -> Option<Slot> {
        SLOT_ORDER.iter().copied().find(|s| !self.is_filled(*s))
    }

    /// Merge `updates` into self; a present value wins over an existing one
    /// (the user is allowed to correct themselves). Returns how many slots
    /// changed.
    pub fn merge(&mut self, updates: &SlotValues) -> usize {
        let mut changed = 0;
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = updates.$field.clone() {
                    if self.$field.as_ref() != Some(&v) {
                        changed += 1;
                    }
                    self.$field = Some(v);
                }
            };
        }
        take!(purpose);
        take!(transaction);
        take!(property);
        take!(budget);
        take!(location);
        take!(bedrooms);
        take!(payment);
        changed
    }
}

/// Engagement counters feeding the scoring function.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
    pub messages: u32,
    pub catalog_views: u32,
    pub qr_scans: u32,
    pub voice_note: bool,
}

/// Durable record of one end-user's qualification conversation with one
/// tenant. Never hard-deleted; terminal conversations move to `Completed`
/// or `Closed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub key: LeadKey,
    pub state: ConversationState,
    pub language: Language,
    pub slots: SlotValues,
    /// Slot currently being asked for, if any.
    pub pending_slot: Option<Slot>,

    pub name: Option<String>,
    pub phone: Option<String>,
    /// Free-text preference captured during handoff scheduling.
    pub handoff_note: Option<String>,

    pub engagement: Engagement,
    pub last_interaction: DateTime<Utc>,

    pub score: u8,
    pub temperature: Temperature,

    pub created_at: DateTime<Utc>,
    /// Optimistic-concurrency version, bumped by the repository on save.
    pub version: u64,
}

impl Lead {
    pub fn new(key: LeadKey, language: Language, now: DateTime<Utc>) -> Self {
        Self {
            key,
            state: ConversationState::Start,
            language,
            slots: SlotValues::default(),
            pending_slot: None,
            name: None,
            phone: None,
            handoff_note: None,
            engagement: Engagement::default(),
            last_interaction: now,
            score: 0,
            temperature: Temperature::Cold,
            created_at: now,
            version: 0,
        }
    }

    /// Slots a state claims to have collected. Used to check the invariant
    /// that state and filled-slots stay mutually consistent.
    pub fn required_slots(state: ConversationState) -> &'static [Slot] {
        match state {
            ConversationState::Start
            | ConversationState::LanguageSelect
            | ConversationState::CollectingName
            | ConversationState::CaptureContact
            | ConversationState::Warmup => &[],
            ConversationState::SlotFilling => &[],
            ConversationState::ValueProposition
            | ConversationState::HardGate
            | ConversationState::Engagement
            | ConversationState::HandoffSchedule
            | ConversationState::HandoffUrgent => &[Slot::Purpose],
            ConversationState::Completed | ConversationState::Closed => &[],
        }
    }

    pub fn is_consistent(&self) -> bool {
        Self::required_slots(self.state)
            .iter()
            .all(|s| self.slots.is_filled(*s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TenantId, UserKey};

    fn key() -> LeadKey {
        LeadKey::new(
            TenantId("42".to_string()),
            UserKey::normalize("998901112233").unwrap(),
        )
    }

    #[test]
    fn slot_order_skips_filled() {
        let mut slots = SlotValues::default();
        assert_eq!(slots.first_missing(), Some(Slot::Purpose));

        slots.purpose = Some(Purpose::Live);
        slots.property = Some(PropertyType::Apartment);
        // Transaction comes before property in canonical order, so it is
        // still the next question even though property is already known.
        assert_eq!(slots.first_missing(), Some(Slot::Transaction));
    }

    #[test]
    fn merge_counts_changes_and_overwrites() {
        let mut slots = SlotValues {
            budget: Some(BudgetRange::exact(50_000)),
            ..Default::default()
        };
        let updates = SlotValues {
            budget: Some(BudgetRange::exact(70_000)),
            bedrooms: Some(2),
            ..Default::default()
        };
        assert_eq!(slots.merge(&updates), 2);
        assert_eq!(slots.budget, Some(BudgetRange::exact(70_000)));
        assert_eq!(slots.bedrooms, Some(2));
    }

    #[test]
    fn budget_range_swaps_misordered_bounds() {
        let b = BudgetRange::new(Some(90_000), Some(40_000)).unwrap();
        assert_eq!(b.min, Some(40_000));
        assert_eq!(b.max, Some(90_000));
        assert!(BudgetRange::new(None, None).is_none());
    }

    #[test]
    fn fresh_lead_is_consistent() {
        let lead = Lead::new(key(), Language::En, Utc::now());
        assert!(lead.is_consistent());
        assert_eq!(lead.state, ConversationState::Start);
        assert_eq!(lead.version, 0);
    }

    #[test]
    fn state_enum_serializes_screaming_snake() {
        let s = serde_json::to_string(&ConversationState::SlotFilling).unwrap();
        assert_eq!(s, "\"SLOT_FILLING\"");
        let back: ConversationState = serde_json::from_str("\"HARD_GATE\"").unwrap();
        assert_eq!(back, ConversationState::HardGate);
    }
}
