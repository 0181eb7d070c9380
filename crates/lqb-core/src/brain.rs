//! The conversation engine: a pure transition function over the lead record.
//!
//! `process` sees one inbound event against the current persisted lead and
//! returns everything the caller needs: next state, data to persist, the
//! outbound reply and side-effect flags. No I/O, no clock, no randomness.
//! Replaying the same (lead, event) pair yields the same transition, which
//! is what makes redelivery and the retry-once path safe.

use crate::domain::Language;
use crate::extract::{extract, extract_pending, Extracted};
use crate::intent::{IntentClassifier, RuleBasedClassifier};
use crate::lead::{ConversationState, Lead, Slot, SlotValues};
use crate::messaging::types::{Action, OutboundMessage};
use crate::texts;

use crate::lead::ConversationState as S;

/// One inbound event. Free text and structured actions are interchangeable
/// at every choice point; `Contact` is the platform's native contact-share
/// card and may fill name and phone in one go.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Text(String),
    Action(Action),
    Contact {
        phone: String,
        name: Option<String>,
    },
}

/// Side effects the caller executes after the durable commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Show the platform's native contact-share UI.
    RequestContact,
    /// Send matching property listings now (counts as a catalog view).
    SendListings,
    /// Hand the lead to a human agent.
    NotifyAgent,
    /// Drop the cached session context (terminal states).
    ClearContext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub next: ConversationState,
    pub pending_slot: Option<Slot>,
    pub slots: SlotValues,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub language: Option<Language>,
    pub handoff_note: Option<String>,
    pub reply: OutboundMessage,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: ConversationState, reply: OutboundMessage) -> Self {
        Self {
            next,
            pending_slot: None,
            slots: SlotValues::default(),
            name: None,
            phone: None,
            language: None,
            handoff_note: None,
            reply,
            effects: Vec::new(),
        }
    }

    fn stay(lead: &Lead, reply: OutboundMessage) -> Self {
        let mut t = Self::to(lead.state, reply);
        t.pending_slot = lead.pending_slot;
        t
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Fold the transition into the lead record. Counters and the derived
    /// score are the caller's business.
    pub fn apply_to(&self, lead: &mut Lead) {
        lead.slots.merge(&self.slots);
        if let Some(n) = &self.name {
            lead.name = Some(n.clone());
        }
        if let Some(p) = &self.phone {
            lead.phone = Some(p.clone());
        }
        if let Some(l) = self.language {
            lead.language = l;
        }
        if let Some(h) = &self.handoff_note {
            lead.handoff_note = Some(h.clone());
        }
        lead.state = self.next;
        lead.pending_slot = self.pending_slot;
    }
}

pub struct Brain {
    classifier: Box<dyn IntentClassifier>,
}

impl Default for Brain {
    fn default() -> Self {
        Self::new(Box::new(RuleBasedClassifier))
    }
}

impl Brain {
    pub fn new(classifier: Box<dyn IntentClassifier>) -> Self {
        Self { classifier }
    }

    /// Compute the transition for one inbound event.
    pub fn process(&self, lead: &Lead, event: &Event) -> Transition {
        let lang = lead.language;

        // Normalize the event into (free text, resolved action, extraction).
        let (text, action, mut ex) = match event {
            Event::Text(t) => {
                let action = self.classifier.resolve(lang, t);
                (Some(t.as_str()), action, extract(lang, t))
            }
            Event::Action(a) => (None, Some(*a), Extracted::default()),
            Event::Contact { phone, name } => (
                None,
                None,
                Extracted {
                    phone: Some(phone.clone()),
                    name: name.clone(),
                    slots: SlotValues::default(),
                },
            ),
        };

        // A question is acknowledged and the pending question re-asked; its
        // words must not be mistaken for slot values.
        let is_question = action.is_none()
            && text
                .map(|t| self.classifier.is_question(lang, t))
                .unwrap_or(false);
        if is_question {
            ex = Extracted::default();
        }

        // Bare answers to the pending question ("2", "Chilanzar").
        if let (Some(t), Some(slot)) = (text, lead.pending_slot) {
            if !is_question && !ex.slots.is_filled(slot) {
                ex.slots.merge(&extract_pending(slot, t));
            }
        }

        // Button taps that carry a slot value.
        match action {
            Some(Action::Purpose(p)) => ex.slots.purpose = Some(p),
            Some(Action::Transaction(t)) => ex.slots.transaction = Some(t),
            Some(Action::Property(p)) => ex.slots.property = Some(p),
            Some(Action::Payment(p)) => ex.slots.payment = Some(p),
            _ => {}
        }

        // Abandon signal wins from any live state.
        let aborted = matches!(action, Some(Action::Close));
        if aborted && lead.state != S::Closed {
            return Transition::to(S::Closed, OutboundMessage::text(texts::closed(lang)))
                .with_effect(Effect::ClearContext);
        }

        // Resume answers may arrive in any state once a resume prompt was
        // shown; both continue from durable truth, restart also drops the
        // cached copy.
        match action {
            Some(Action::ResumeContinue) => {
                let mut t = Transition::stay(lead, self.reprompt(lead));
                t.pending_slot = effective_pending(lead);
                return t;
            }
            Some(Action::ResumeRestart) => {
                let mut t = Transition::stay(lead, self.reprompt(lead));
                t.pending_slot = effective_pending(lead);
                return t.with_effect(Effect::ClearContext);
            }
            _ => {}
        }

        match lead.state {
            S::Start => self.on_start(lead, ex),
            S::LanguageSelect => self.on_language_select(lead, action, ex),
            S::CollectingName => self.on_collecting_name(lead, text, action, is_question, ex),
            S::CaptureContact => self.on_capture_contact(lead, is_question, ex),
            S::Warmup => self.on_warmup(lead, is_question, ex),
            S::SlotFilling => self.on_slot_filling(lead, is_question, ex),
            S::ValueProposition => self.on_value_proposition(lead, text, action, is_question, ex),
            S::HardGate => self.on_hard_gate(lead, is_question, ex),
            S::Engagement => self.on_engagement(lead, action, is_question, ex),
            S::HandoffSchedule => self.on_handoff_schedule(lead, text, is_question),
            S::HandoffUrgent => Transition::to(
                S::Completed,
                OutboundMessage::text(texts::completed(lang)),
            )
            .with_effect(Effect::ClearContext),
            S::Completed => {
                Transition::stay(lead, OutboundMessage::text(texts::completed(lang)))
            }
            S::Closed => Transition::stay(lead, OutboundMessage::text(texts::closed(lang))),
        }
    }

    /// The question matching the lead's current position, used to re-enter
    /// a conversation after a resume prompt.
    pub fn reprompt(&self, lead: &Lead) -> OutboundMessage {
        let lang = lead.language;
        match lead.state {
            S::Start | S::LanguageSelect => {
                OutboundMessage::with_buttons(texts::greeting(lang), texts::language_buttons())
            }
            S::CollectingName => OutboundMessage::text(texts::ask_name(lang)),
            S::CaptureContact => {
                OutboundMessage::text(texts::ask_contact(lang, lead.name.as_deref()))
            }
            S::Warmup => {
                OutboundMessage::with_buttons(texts::ask_purpose(lang), texts::purpose_buttons(lang))
            }
            S::SlotFilling => match effective_pending(lead) {
                Some(slot) => ask_slot(lang, slot),
                None => OutboundMessage::with_buttons(
                    texts::value_proposition(lang),
                    texts::value_proposition_buttons(lang),
                ),
            },
            S::ValueProposition => OutboundMessage::with_buttons(
                texts::value_proposition(lang),
                texts::value_proposition_buttons(lang),
            ),
            S::HardGate => OutboundMessage::text(texts::hard_gate(lang)),
            S::Engagement => OutboundMessage::with_buttons(
                texts::whats_next(lang),
                texts::engagement_buttons(lang),
            ),
            S::HandoffSchedule => OutboundMessage::text(texts::ask_schedule(lang)),
            S::HandoffUrgent | S::Completed => OutboundMessage::text(texts::completed(lang)),
            S::Closed => OutboundMessage::text(texts::closed(lang)),
        }
    }

    // === State handlers ===

    fn on_start(&self, lead: &Lead, ex: Extracted) -> Transition {
        // Whatever the first message carried is kept; the flow still opens
        // with the language question.
        let mut t = Transition::to(
            S::LanguageSelect,
            OutboundMessage::with_buttons(texts::greeting(lead.language), texts::language_buttons()),
        );
        t.slots = ex.slots;
        t.phone = ex.phone;
        t.name = ex.name;
        t
    }

    fn on_language_select(
        &self,
        lead: &Lead,
        action: Option<Action>,
        ex: Extracted,
    ) -> Transition {
        let Some(Action::Lang(chosen)) = action else {
            let reply = OutboundMessage::with_buttons(
                format!(
                    "{} {}",
                    texts::did_not_catch(lead.language),
                    texts::greeting(lead.language)
                ),
                texts::language_buttons(),
            );
            return Transition::stay(lead, reply);
        };

        let mut t = Transition::to(
            S::CollectingName,
            OutboundMessage::text(texts::ask_name(chosen)),
        );
        t.language = Some(chosen);
        t.slots = ex.slots;
        t
    }

    fn on_collecting_name(
        &self,
        lead: &Lead,
        text: Option<&str>,
        action: Option<Action>,
        is_question: bool,
        ex: Extracted,
    ) -> Transition {
        let lang = lead.language;
        if is_question {
            let reply = OutboundMessage::text(format!(
                "{} {}",
                texts::question_ack(lang),
                texts::ask_name(lang)
            ));
            return Transition::stay(lead, reply);
        }

        let name = ex.name.clone().or_else(|| {
            // A short digit-free message that is not a recognized choice or
            // slot value is taken as the name itself.
            if action.is_some() || !ex.slots.is_empty() {
                return None;
            }
            text.and_then(plausible_name)
        });

        let Some(name) = name else {
            let reply = OutboundMessage::text(format!(
                "{} {}",
                texts::did_not_catch(lang),
                texts::ask_name(lang)
            ));
            let mut t = Transition::stay(lead, reply);
            t.slots = ex.slots;
            t.phone = ex.phone;
            return t;
        };

        if ex.phone.is_some() {
            // Name and phone in one message: skip the contact step entirely.
            let mut t = self.advance_to_warmup(lang, &texts::contact_saved(lang));
            t.name = Some(name);
            t.phone = ex.phone;
            t.slots = ex.slots;
            return t;
        }

        let mut t = Transition::to(
            S::CaptureContact,
            OutboundMessage::text(texts::ask_contact(lang, Some(&name))),
        )
        .with_effect(Effect::RequestContact);
        t.name = Some(name);
        t.slots = ex.slots;
        t
    }

    fn on_capture_contact(&self, lead: &Lead, is_question: bool, ex: Extracted) -> Transition {
        let lang = lead.language;
        if let Some(phone) = ex.phone.clone() {
            let mut t = self.advance_to_warmup(lang, &texts::contact_saved(lang));
            t.phone = Some(phone);
            t.name = ex.name.filter(|_| lead.name.is_none());
            t.slots = ex.slots;
            return t;
        }

        let lead_in = if is_question {
            texts::question_ack(lang)
        } else {
            texts::did_not_catch(lang)
        };
        let reply = OutboundMessage::text(format!(
            "{} {}",
            lead_in,
            texts::ask_contact(lang, lead.name.as_deref())
        ));
        Transition::stay(lead, reply).with_effect(Effect::RequestContact)
    }

    fn advance_to_warmup(&self, lang: Language, ack: &str) -> Transition {
        Transition::to(
            S::Warmup,
            OutboundMessage::with_buttons(
                format!("{} {}", ack, texts::ask_purpose(lang)),
                texts::purpose_buttons(lang),
            ),
        )
    }

    fn on_warmup(&self, lead: &Lead, is_question: bool, ex: Extracted) -> Transition {
        let lang = lead.language;
        if is_question {
            let reply = OutboundMessage::with_buttons(
                format!("{} {}", texts::question_ack(lang), texts::ask_purpose(lang)),
                texts::purpose_buttons(lang),
            );
            return Transition::stay(lead, reply);
        }

        if ex.slots.purpose.is_none() {
            let reply = OutboundMessage::with_buttons(
                format!("{} {}", texts::did_not_catch(lang), texts::ask_purpose(lang)),
                texts::purpose_buttons(lang),
            );
            let mut t = Transition::stay(lead, reply);
            t.slots = ex.slots;
            t.phone = ex.phone;
            return t;
        }

        self.continue_slot_filling(lead, ex)
    }

    fn on_slot_filling(&self, lead: &Lead, is_question: bool, ex: Extracted) -> Transition {
        let lang = lead.language;
        let pending = effective_pending(lead);

        if is_question {
            let reply = match pending {
                Some(slot) => {
                    prefixed(texts::question_ack(lang), ask_slot(lang, slot))
                }
                None => OutboundMessage::text(texts::question_ack(lang)),
            };
            return Transition::stay(lead, reply);
        }

        if ex.slots.is_empty() {
            let reply = match pending {
                Some(slot) => prefixed(texts::did_not_catch(lang), ask_slot(lang, slot)),
                None => OutboundMessage::text(texts::did_not_catch(lang)),
            };
            let mut t = Transition::stay(lead, reply);
            t.phone = ex.phone;
            return t;
        }

        self.continue_slot_filling(lead, ex)
    }

    /// Ask the first slot still missing once `ex` lands, or move on to the
    /// value proposition when the profile is complete. Already-filled slots
    /// are never re-asked.
    fn continue_slot_filling(&self, lead: &Lead, ex: Extracted) -> Transition {
        let lang = lead.language;
        let mut merged = lead.slots.clone();
        merged.merge(&ex.slots);

        let mut t = match merged.first_missing() {
            Some(slot) => {
                let mut t = Transition::to(S::SlotFilling, ask_slot(lang, slot));
                t.pending_slot = Some(slot);
                t
            }
            None => Transition::to(
                S::ValueProposition,
                OutboundMessage::with_buttons(
                    texts::value_proposition(lang),
                    texts::value_proposition_buttons(lang),
                ),
            ),
        };
        t.slots = ex.slots;
        t.phone = ex.phone;
        t.name = ex.name;
        t
    }

    fn on_value_proposition(
        &self,
        lead: &Lead,
        text: Option<&str>,
        action: Option<Action>,
        is_question: bool,
        ex: Extracted,
    ) -> Transition {
        let lang = lead.language;
        let affirmative = text
            .map(|t| self.classifier.is_affirmative(lang, t))
            .unwrap_or(false);

        let wants_listings = matches!(action, Some(Action::ShowListings)) || affirmative;
        let wants_call = matches!(action, Some(Action::RequestCall));

        if wants_listings || wants_call {
            if lead.phone.is_none() && ex.phone.is_none() {
                return Transition::to(S::HardGate, OutboundMessage::text(texts::hard_gate(lang)))
                    .with_effect(Effect::RequestContact);
            }
            let mut t = if wants_call {
                Transition::to(
                    S::HandoffUrgent,
                    OutboundMessage::text(texts::urgent_confirmed(lang)),
                )
                .with_effect(Effect::NotifyAgent)
            } else {
                Transition::to(
                    S::Engagement,
                    OutboundMessage::with_buttons(
                        texts::listings_sent(lang),
                        texts::engagement_buttons(lang),
                    ),
                )
                .with_effect(Effect::SendListings)
            };
            t.phone = ex.phone;
            return t;
        }

        let lead_in = if is_question {
            texts::question_ack(lang)
        } else {
            texts::did_not_catch(lang)
        };
        let reply = OutboundMessage::with_buttons(
            format!("{} {}", lead_in, texts::value_proposition(lang)),
            texts::value_proposition_buttons(lang),
        );
        let mut t = Transition::stay(lead, reply);
        t.slots = ex.slots;
        t.phone = ex.phone;
        t
    }

    fn on_hard_gate(&self, lead: &Lead, is_question: bool, ex: Extracted) -> Transition {
        let lang = lead.language;
        if let Some(phone) = ex.phone.clone() {
            let mut t = Transition::to(
                S::Engagement,
                OutboundMessage::with_buttons(
                    format!("{} {}", texts::contact_saved(lang), texts::listings_sent(lang)),
                    texts::engagement_buttons(lang),
                ),
            )
            .with_effect(Effect::SendListings);
            t.phone = Some(phone);
            t.name = ex.name.filter(|_| lead.name.is_none());
            return t;
        }

        let lead_in = if is_question {
            texts::question_ack(lang)
        } else {
            texts::did_not_catch(lang)
        };
        let reply =
            OutboundMessage::text(format!("{} {}", lead_in, texts::hard_gate(lang)));
        Transition::stay(lead, reply).with_effect(Effect::RequestContact)
    }

    fn on_engagement(
        &self,
        lead: &Lead,
        action: Option<Action>,
        is_question: bool,
        ex: Extracted,
    ) -> Transition {
        let lang = lead.language;
        match action {
            Some(Action::ShowListings) => {
                let mut t = Transition::stay(
                    lead,
                    OutboundMessage::with_buttons(
                        texts::listings_sent(lang),
                        texts::engagement_buttons(lang),
                    ),
                )
                .with_effect(Effect::SendListings);
                t.slots = ex.slots;
                t
            }
            Some(Action::ScheduleViewing) => Transition::to(
                S::HandoffSchedule,
                OutboundMessage::text(texts::ask_schedule(lang)),
            ),
            Some(Action::RequestCall) => Transition::to(
                S::HandoffUrgent,
                OutboundMessage::text(texts::urgent_confirmed(lang)),
            )
            .with_effect(Effect::NotifyAgent),
            _ => {
                let lead_in = if is_question {
                    texts::question_ack(lang)
                } else {
                    texts::did_not_catch(lang)
                };
                let reply = OutboundMessage::with_buttons(
                    format!("{} {}", lead_in, texts::whats_next(lang)),
                    texts::engagement_buttons(lang),
                );
                let mut t = Transition::stay(lead, reply);
                t.slots = ex.slots;
                t
            }
        }
    }

    fn on_handoff_schedule(
        &self,
        lead: &Lead,
        text: Option<&str>,
        is_question: bool,
    ) -> Transition {
        let lang = lead.language;
        if is_question {
            let reply = OutboundMessage::text(format!(
                "{} {}",
                texts::question_ack(lang),
                texts::ask_schedule(lang)
            ));
            return Transition::stay(lead, reply);
        }

        match text.map(str::trim).filter(|t| !t.is_empty()) {
            Some(when) => {
                let mut t = Transition::to(
                    S::Completed,
                    OutboundMessage::text(texts::schedule_confirmed(lang)),
                )
                .with_effect(Effect::NotifyAgent)
                .with_effect(Effect::ClearContext);
                t.handoff_note = Some(when.to_string());
                t
            }
            None => Transition::stay(lead, OutboundMessage::text(texts::ask_schedule(lang))),
        }
    }
}

fn effective_pending(lead: &Lead) -> Option<Slot> {
    lead.pending_slot.or_else(|| lead.slots.first_missing())
}

fn ask_slot(lang: Language, slot: Slot) -> OutboundMessage {
    OutboundMessage::with_buttons(texts::slot_question(lang, slot), texts::slot_buttons(lang, slot))
}

fn prefixed(prefix: String, mut msg: OutboundMessage) -> OutboundMessage {
    msg.text = format!("{} {}", prefix, msg.text);
    msg
}

fn plausible_name(text: &str) -> Option<String> {
    let t = text.trim();
    if t.is_empty() || t.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let words: Vec<&str> = t
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() || words.len() > 3 {
        return None;
    }
    Some(words.join(" "))
}
