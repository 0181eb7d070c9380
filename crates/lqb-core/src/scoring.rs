//! Lead scoring: interaction counters + qualification flags + recency → a
//! 0–100 priority score and a coarse temperature tier.
//!
//! Pure and deterministic; the clock is an explicit argument so recency is
//! testable. The score is always derived: callers recompute it whenever a
//! counter or qualification flag changes, never mutate it directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lead::Lead;

const ENGAGEMENT_CAP: u32 = 40;
const QUALIFICATION_CAP: u32 = 40;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperature {
    #[default]
    Cold,
    Warm,
    Hot,
    Burning,
}

impl Temperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Temperature::Cold => "cold",
            Temperature::Warm => "warm",
            Temperature::Hot => "hot",
            Temperature::Burning => "burning",
        }
    }
}

/// Tier boundaries are inclusive on the lower bound.
pub fn temperature_for(score: u8) -> Temperature {
    match score {
        70..=u8::MAX => Temperature::Burning,
        50..=69 => Temperature::Hot,
        25..=49 => Temperature::Warm,
        _ => Temperature::Cold,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub engagement: u32,
    pub qualification: u32,
    pub recency: u32,
    pub total: u8,
    pub temperature: Temperature,
}

pub fn score_at(lead: &Lead, now: DateTime<Utc>) -> ScoreBreakdown {
    let e = &lead.engagement;
    let engagement = ((e.qr_scans * 3).min(15)
        + (e.catalog_views * 2).min(10)
        + e.messages.min(10)
        + if e.voice_note { 5 } else { 0 })
    .min(ENGAGEMENT_CAP);

    let mut qualification = 0u32;
    if lead.phone.is_some() {
        qualification += 10;
    }
    let has_budget = lead
        .slots
        .budget
        .map(|b| b.min.is_some() || b.max.is_some())
        .unwrap_or(false);
    if has_budget {
        qualification += 10;
    }
    if lead.slots.transaction.is_some() {
        qualification += 5;
    }
    if lead.slots.property.is_some() {
        qualification += 5;
    }
    if lead.slots.location.is_some() {
        qualification += 5;
    }
    if lead.slots.payment.is_some() {
        qualification += 5;
    }
    let qualification = qualification.min(QUALIFICATION_CAP);

    let hours = (now - lead.last_interaction).num_hours();
    let recency = if hours < 1 {
        20
    } else if hours < 6 {
        15
    } else if hours < 24 {
        10
    } else if hours < 72 {
        5
    } else {
        0
    };

    let total = (engagement + qualification + recency).min(100) as u8;
    ScoreBreakdown {
        engagement,
        qualification,
        recency,
        total,
        temperature: temperature_for(total),
    }
}

/// Recompute and store the derived score fields on the lead.
pub fn rescore(lead: &mut Lead, now: DateTime<Utc>) {
    let b = score_at(lead, now);
    lead.score = b.total;
    lead.temperature = b.temperature;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::domain::{Language, LeadKey, TenantId, UserKey};
    use crate::lead::{BudgetRange, Lead};

    fn lead_at(now: DateTime<Utc>) -> Lead {
        let key = LeadKey::new(
            TenantId("7".to_string()),
            UserKey::normalize("111").unwrap(),
        );
        Lead::new(key, Language::En, now)
    }

    #[test]
    fn worked_example_scores_hot() {
        let now = Utc::now();
        let mut lead = lead_at(now - Duration::minutes(30));
        lead.engagement.catalog_views = 6;
        lead.engagement.messages = 12;
        lead.phone = Some("998901234567".to_string());
        lead.slots.budget = Some(BudgetRange::exact(100_000));

        let b = score_at(&lead, now);
        // catalog 6*2 capped at 10, messages capped at 10, phone 10,
        // budget 10, under an hour old.
        assert_eq!(b.engagement, 20);
        assert_eq!(b.qualification, 20);
        assert_eq!(b.recency, 20);
        assert_eq!(b.total, 60);
        assert_eq!(b.temperature, Temperature::Hot);
    }

    #[test]
    fn engagement_component_caps_at_40() {
        let now = Utc::now();
        let mut lead = lead_at(now);
        lead.engagement.qr_scans = 100;
        lead.engagement.catalog_views = 100;
        lead.engagement.messages = 100;
        lead.engagement.voice_note = true;

        let b = score_at(&lead, now);
        assert_eq!(b.engagement, 40);
    }

    #[test]
    fn recency_buckets() {
        let now = Utc::now();
        let cases = [
            (Duration::minutes(59), 20),
            (Duration::hours(1), 15),
            (Duration::hours(5), 15),
            (Duration::hours(6), 10),
            (Duration::hours(23), 10),
            (Duration::hours(24), 5),
            (Duration::hours(71), 5),
            (Duration::hours(72), 0),
            (Duration::days(30), 0),
        ];
        for (age, want) in cases {
            let lead = lead_at(now - age);
            let b = score_at(&lead, now);
            assert_eq!(b.recency, want, "age {age}");
        }
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(temperature_for(70), Temperature::Burning);
        assert_eq!(temperature_for(69), Temperature::Hot);
        assert_eq!(temperature_for(50), Temperature::Hot);
        assert_eq!(temperature_for(49), Temperature::Warm);
        assert_eq!(temperature_for(25), Temperature::Warm);
        assert_eq!(temperature_for(24), Temperature::Cold);
        assert_eq!(temperature_for(0), Temperature::Cold);
    }

    #[test]
    fn budget_with_single_bound_counts() {
        let now = Utc::now();
        let mut lead = lead_at(now);
        lead.slots.budget = BudgetRange::new(None, Some(80_000));
        let b = score_at(&lead, now);
        assert_eq!(b.qualification, 10);
    }
}
