//! Opportunistic slot extraction from free text.
//!
//! A single message may fill several slots at once ("Alex, +998 90 123 45 67,
//! looking to rent a 2-bedroom up to 700"), so every inbound text runs
//! through the full extractor and the engine merges whatever comes back.
//! Slot-value synonyms live here; navigation synonyms live in `intent`.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Language;
use crate::lead::{
    BudgetRange, PaymentMethod, PropertyType, Purpose, Slot, SlotValues, TransactionType,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extracted {
    pub phone: Option<String>,
    pub name: Option<String>,
    pub slots: SlotValues,
}

impl Extracted {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.name.is_none() && self.slots.is_empty()
    }
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\+?\d[\d\s\-().]{6,}\d").unwrap())
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:my name is|i am|i'm|меня зовут)\s+(\p{Lu}\p{L}+)").unwrap()
    })
}

fn money_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(k|к|m|thousand|тыс\w*|million|млн)?").unwrap()
    })
}

fn bedrooms_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d{1,2})\s*[- ]?(?:bed(?:room)?s?|br\b|спал\w*|комнат\w*)").unwrap())
}

/// Run all extractors over one message.
pub fn extract(lang: Language, text: &str) -> Extracted {
    let mut out = Extracted::default();
    let lower = text.to_lowercase();

    out.phone = extract_phone(text);
    out.name = name_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    // Blank the phone span before number-based extraction so its digits are
    // not mistaken for a budget.
    let mut scrubbed = lower.clone();
    if out.phone.is_some() {
        if let Some(range) = phone_re().find(&scrubbed).map(|m| m.range()) {
            let blank = " ".repeat(range.len());
            scrubbed.replace_range(range, &blank);
        }
    }

    out.slots.bedrooms = extract_bedrooms(&scrubbed);
    // Blank the bedrooms span too: "2 bedrooms" is not a budget of 2.
    if let Some(range) = bedrooms_re().find(&scrubbed).map(|m| m.range()) {
        let blank = " ".repeat(range.len());
        scrubbed.replace_range(range, &blank);
    }
    out.slots.budget = extract_budget(&scrubbed);

    out.slots.transaction = extract_transaction(&lower);
    out.slots.property = extract_property(&lower);
    out.slots.payment = extract_payment(&lower);
    out.slots.purpose = extract_purpose(&lower);

    let _ = lang; // tables below are bilingual; kept for future per-language tuning
    out
}

/// State-directed fallback for a bare answer to the pending question, where
/// a plain "2" or "Chilanzar" is unambiguous.
pub fn extract_pending(slot: Slot, text: &str) -> SlotValues {
    let mut slots = SlotValues::default();
    let t = text.trim();
    match slot {
        Slot::Bedrooms => {
            if let Ok(n) = t.parse::<u8>() {
                if n <= 20 {
                    slots.bedrooms = Some(n);
                }
            }
        }
        Slot::Budget => {
            slots.budget = extract_budget(&t.to_lowercase());
            if slots.budget.is_none() {
                if let Some(v) = parse_money_token(t, "") {
                    slots.budget = Some(BudgetRange::exact(v));
                }
            }
        }
        Slot::Location => {
            // Any short digit-free text is taken verbatim as an area name.
            if !t.is_empty() && t.chars().filter(|c| c.is_whitespace()).count() < 5
                && !t.chars().any(|c| c.is_ascii_digit())
            {
                slots.location = Some(t.to_string());
            }
        }
        _ => {}
    }
    slots
}

pub fn extract_phone(text: &str) -> Option<String> {
    let m = phone_re().find(text)?;
    let raw = m.as_str();
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(9..=15).contains(&digits.len()) {
        return None;
    }
    if raw.trim_start().starts_with('+') {
        Some(format!("+{digits}"))
    } else {
        Some(digits)
    }
}

fn extract_bedrooms(lower: &str) -> Option<u8> {
    if lower.contains("studio") || lower.contains("студия") || lower.contains("студию") {
        return Some(0);
    }
    let caps = bedrooms_re().captures(lower)?;
    caps.get(1)?.as_str().parse::<u8>().ok()
}

fn parse_money_token(num: &str, suffix: &str) -> Option<u64> {
    let base: f64 = num.replace(',', ".").parse().ok()?;
    let mult = match suffix {
        "k" | "к" | "thousand" => 1_000.0,
        "m" | "million" => 1_000_000.0,
        s if s.starts_with("тыс") => 1_000.0,
        s if s.starts_with("млн") => 1_000_000.0,
        _ => 1.0,
    };
    let v = base * mult;
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    Some(v as u64)
}

/// Money amounts: plain numbers count only when they look like money
/// (>= 1000 or carrying a k/m multiplier). Two amounts make a range; one
/// amount is bounded by surrounding "up to"/"from" words when present.
fn extract_budget(lower: &str) -> Option<BudgetRange> {
    let mut amounts = Vec::new();
    for caps in money_re().captures_iter(lower) {
        let num = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let suffix = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let Some(v) = parse_money_token(num, &suffix.to_lowercase()) else {
            continue;
        };
        if v >= 1_000 || !suffix.is_empty() {
            amounts.push(v);
        }
        if amounts.len() == 2 {
            break;
        }
    }

    match amounts.len() {
        0 => None,
        1 => {
            let v = amounts[0];
            let max_marker = ["up to", "under", "below", "до", "максимум", "не больше"]
                .iter()
                .any(|w| lower.contains(w));
            let min_marker = ["from", "over", "above", "от", "минимум"]
                .iter()
                .any(|w| lower.contains(w));
            match (min_marker, max_marker) {
                (false, true) => BudgetRange::new(None, Some(v)),
                (true, false) => BudgetRange::new(Some(v), None),
                _ => Some(BudgetRange::exact(v)),
            }
        }
        _ => BudgetRange::new(Some(amounts[0]), Some(amounts[1])),
    }
}

fn extract_transaction(lower: &str) -> Option<TransactionType> {
    let rent = ["rent", "rental", "lease", "аренд", "снять", "сниму"];
    let buy = ["buy", "purchase", "purchasing", "купить", "покупк", "куплю"];
    if rent.iter().any(|w| lower.contains(w)) {
        return Some(TransactionType::Rent);
    }
    if buy.iter().any(|w| lower.contains(w)) {
        return Some(TransactionType::Buy);
    }
    None
}

fn extract_property(lower: &str) -> Option<PropertyType> {
    let tables: [(&[&str], PropertyType); 4] = [
        (
            &["apartment", "flat", "квартир"],
            PropertyType::Apartment,
        ),
        (&["house", "villa", "дом", "коттедж"], PropertyType::House),
        (
            &["commercial", "office", "shop", "коммерч", "офис"],
            PropertyType::Commercial,
        ),
        (&["land", "plot", "участок", "земл"], PropertyType::Land),
    ];
    for (words, prop) in tables {
        if words.iter().any(|w| lower.contains(w)) {
            return Some(prop);
        }
    }
    None
}

fn extract_payment(lower: &str) -> Option<PaymentMethod> {
    if lower.contains("mortgage") || lower.contains("ипотек") {
        return Some(PaymentMethod::Mortgage);
    }
    if lower.contains("installment") || lower.contains("рассрочк") {
        return Some(PaymentMethod::Installments);
    }
    if lower.contains("cash") || lower.contains("наличн") {
        return Some(PaymentMethod::Cash);
    }
    None
}

fn extract_purpose(lower: &str) -> Option<Purpose> {
    if lower.contains("invest") || lower.contains("инвест") {
        return Some(Purpose::Invest);
    }
    let live = ["for myself", "to live", "for my family", "для себя", "жить", "сам буду"];
    if live.iter().any(|w| lower.contains(w)) {
        return Some(Purpose::Live);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_message_fills_several_slots() {
        let e = extract(
            Language::En,
            "I'm Alex, +998 90 123 45 67, looking to rent a 2 bedroom apartment up to 700k",
        );
        assert_eq!(e.phone.as_deref(), Some("+998901234567"));
        assert_eq!(e.name.as_deref(), Some("Alex"));
        assert_eq!(e.slots.transaction, Some(TransactionType::Rent));
        assert_eq!(e.slots.property, Some(PropertyType::Apartment));
        assert_eq!(e.slots.bedrooms, Some(2));
        assert_eq!(e.slots.budget, BudgetRange::new(None, Some(700_000)));
    }

    #[test]
    fn phone_digits_do_not_become_a_budget() {
        let e = extract(Language::En, "call me at 998901234567");
        assert_eq!(e.phone.as_deref(), Some("998901234567"));
        assert_eq!(e.slots.budget, None);
    }

    #[test]
    fn budget_ranges_and_multipliers() {
        let e = extract(Language::En, "between 50k and 70k");
        assert_eq!(e.slots.budget, BudgetRange::new(Some(50_000), Some(70_000)));

        let e = extract(Language::Ru, "до 90 тыс");
        assert_eq!(e.slots.budget, BudgetRange::new(None, Some(90_000)));

        let e = extract(Language::En, "around 1.5m");
        assert_eq!(e.slots.budget, Some(BudgetRange::exact(1_500_000)));
    }

    #[test]
    fn small_bare_numbers_are_not_money() {
        let e = extract(Language::En, "maybe 2 or 3");
        assert_eq!(e.slots.budget, None);
    }

    #[test]
    fn bedrooms_count_is_not_a_budget() {
        let e = extract(Language::En, "3 bedrooms");
        assert_eq!(e.slots.bedrooms, Some(3));
        assert_eq!(e.slots.budget, None);
    }

    #[test]
    fn studio_is_zero_bedrooms() {
        let e = extract(Language::Ru, "ищу студию");
        assert_eq!(e.slots.bedrooms, Some(0));
    }

    #[test]
    fn russian_slot_synonyms() {
        let e = extract(Language::Ru, "хочу купить дом в ипотеку для себя");
        assert_eq!(e.slots.transaction, Some(TransactionType::Buy));
        assert_eq!(e.slots.property, Some(PropertyType::House));
        assert_eq!(e.slots.payment, Some(PaymentMethod::Mortgage));
        assert_eq!(e.slots.purpose, Some(Purpose::Live));
    }

    #[test]
    fn pending_slot_fallbacks() {
        assert_eq!(
            extract_pending(Slot::Bedrooms, "2").bedrooms,
            Some(2)
        );
        assert_eq!(
            extract_pending(Slot::Budget, "600").budget,
            Some(BudgetRange::exact(600))
        );
        assert_eq!(
            extract_pending(Slot::Location, "Chilanzar").location.as_deref(),
            Some("Chilanzar")
        );
        assert_eq!(extract_pending(Slot::Location, "call me at 5pm maybe tomorrow or later").location, None);
    }
}
