//! All user-visible copy, keyed by conversation language.
//!
//! Keeping every prompt and button label here means the engine never embeds
//! raw strings and a new language is a single-module change.

use crate::domain::Language;
use crate::lead::{
    BudgetRange, PaymentMethod, PropertyType, Purpose, Slot, SlotValues, TransactionType,
};
use crate::messaging::types::{Action, Button};

use crate::domain::Language::{En, Ru};

pub fn greeting(lang: Language) -> String {
    match lang {
        En => "Hi! I'm the assistant of your real-estate agency. \
               I'll ask a few quick questions to find you the right option. \
               Which language do you prefer?"
            .to_string(),
        Ru => "Здравствуйте! Я ассистент вашего агентства недвижимости. \
               Задам несколько коротких вопросов, чтобы подобрать вариант. \
               На каком языке вам удобнее?"
            .to_string(),
    }
}

pub fn language_buttons() -> Vec<Button> {
    vec![
        Button::new("English", Action::Lang(En)),
        Button::new("Русский", Action::Lang(Ru)),
    ]
}

pub fn ask_name(lang: Language) -> String {
    match lang {
        En => "Great. What's your name?".to_string(),
        Ru => "Отлично. Как вас зовут?".to_string(),
    }
}

pub fn ask_contact(lang: Language, name: Option<&str>) -> String {
    match (lang, name) {
        (En, Some(n)) => format!(
            "Nice to meet you, {n}! Share your phone number so our agent can \
             reach you — tap the button below or just type it."
        ),
        (En, None) => "Share your phone number so our agent can reach you — \
                       tap the button below or just type it."
            .to_string(),
        (Ru, Some(n)) => format!(
            "Очень приятно, {n}! Оставьте номер телефона, чтобы агент мог \
             связаться с вами — нажмите кнопку ниже или просто напишите его."
        ),
        (Ru, None) => "Оставьте номер телефона, чтобы агент мог связаться с \
                       вами — нажмите кнопку ниже или просто напишите его."
            .to_string(),
    }
}

pub fn contact_saved(lang: Language) -> String {
    match lang {
        En => "Got it, thanks!".to_string(),
        Ru => "Записал, спасибо!".to_string(),
    }
}

pub fn ask_purpose(lang: Language) -> String {
    match lang {
        En => "Are you looking for a place for yourself, or as an investment?".to_string(),
        Ru => "Ищете жильё для себя или рассматриваете как инвестицию?".to_string(),
    }
}

pub fn purpose_buttons(lang: Language) -> Vec<Button> {
    match lang {
        En => vec![
            Button::new("For myself", Action::Purpose(Purpose::Live)),
            Button::new("Investment", Action::Purpose(Purpose::Invest)),
        ],
        Ru => vec![
            Button::new("Для себя", Action::Purpose(Purpose::Live)),
            Button::new("Инвестиция", Action::Purpose(Purpose::Invest)),
        ],
    }
}

pub fn slot_question(lang: Language, slot: Slot) -> String {
    match (lang, slot) {
        (En, Slot::Purpose) => ask_purpose(En),
        (En, Slot::Transaction) => "Do you want to buy or rent?".to_string(),
        (En, Slot::Property) => "What kind of property are you after?".to_string(),
        (En, Slot::Budget) => {
            "What budget do you have in mind? A range like \"50k–70k\" works too.".to_string()
        }
        (En, Slot::Location) => "Which area or district do you prefer?".to_string(),
        (En, Slot::Bedrooms) => "How many bedrooms do you need?".to_string(),
        (En, Slot::Payment) => "How would you like to pay?".to_string(),
        (Ru, Slot::Purpose) => ask_purpose(Ru),
        (Ru, Slot::Transaction) => "Вы хотите купить или арендовать?".to_string(),
        (Ru, Slot::Property) => "Какой тип недвижимости вас интересует?".to_string(),
        (Ru, Slot::Budget) => {
            "Какой бюджет вы рассматриваете? Можно диапазон, например «50к–70к».".to_string()
        }
        (Ru, Slot::Location) => "Какой район вы предпочитаете?".to_string(),
        (Ru, Slot::Bedrooms) => "Сколько спален вам нужно?".to_string(),
        (Ru, Slot::Payment) => "Как вам удобнее оплачивать?".to_string(),
    }
}

pub fn slot_buttons(lang: Language, slot: Slot) -> Vec<Button> {
    match (lang, slot) {
        (_, Slot::Purpose) => purpose_buttons(lang),
        (En, Slot::Transaction) => vec![
            Button::new("Buy", Action::Transaction(TransactionType::Buy)),
            Button::new("Rent", Action::Transaction(TransactionType::Rent)),
        ],
        (Ru, Slot::Transaction) => vec![
            Button::new("Купить", Action::Transaction(TransactionType::Buy)),
            Button::new("Аренда", Action::Transaction(TransactionType::Rent)),
        ],
        (En, Slot::Property) => vec![
            Button::new("Apartment", Action::Property(PropertyType::Apartment)),
            Button::new("House", Action::Property(PropertyType::House)),
            Button::new("Commercial", Action::Property(PropertyType::Commercial)),
            Button::new("Land", Action::Property(PropertyType::Land)),
        ],
        (Ru, Slot::Property) => vec![
            Button::new("Квартира", Action::Property(PropertyType::Apartment)),
            Button::new("Дом", Action::Property(PropertyType::House)),
            Button::new("Коммерческая", Action::Property(PropertyType::Commercial)),
            Button::new("Участок", Action::Property(PropertyType::Land)),
        ],
        (En, Slot::Payment) => vec![
            Button::new("Cash", Action::Payment(PaymentMethod::Cash)),
            Button::new("Mortgage", Action::Payment(PaymentMethod::Mortgage)),
            Button::new("Installments", Action::Payment(PaymentMethod::Installments)),
        ],
        (Ru, Slot::Payment) => vec![
            Button::new("Наличные", Action::Payment(PaymentMethod::Cash)),
            Button::new("Ипотека", Action::Payment(PaymentMethod::Mortgage)),
            Button::new("Рассрочка", Action::Payment(PaymentMethod::Installments)),
        ],
        // Free-text-only slots.
        (_, Slot::Budget) | (_, Slot::Location) | (_, Slot::Bedrooms) => Vec::new(),
    }
}

pub fn value_proposition(lang: Language) -> String {
    match lang {
        En => "Perfect, I have everything I need. We have matching options \
               ready — want me to send a selection, or would you rather talk \
               to an agent right away?"
            .to_string(),
        Ru => "Отлично, всё записал. У нас уже есть подходящие варианты — \
               прислать подборку или сразу связать вас с агентом?"
            .to_string(),
    }
}

pub fn value_proposition_buttons(lang: Language) -> Vec<Button> {
    match lang {
        En => vec![
            Button::new("Send the options", Action::ShowListings),
            Button::new("Call me", Action::RequestCall),
        ],
        Ru => vec![
            Button::new("Прислать варианты", Action::ShowListings),
            Button::new("Позвоните мне", Action::RequestCall),
        ],
    }
}

pub fn hard_gate(lang: Language) -> String {
    match lang {
        En => "One last thing before I send the options: leave a phone number \
               so the agent can follow up. Tap the button below or type it."
            .to_string(),
        Ru => "Последний шаг перед подборкой: оставьте номер телефона, чтобы \
               агент был на связи. Нажмите кнопку ниже или напишите его."
            .to_string(),
    }
}

pub fn listings_sent(lang: Language) -> String {
    match lang {
        En => "Here you go — sending the best matches now. Want more options, \
               or shall we set up a viewing?"
            .to_string(),
        Ru => "Готово — отправляю лучшие варианты. Прислать ещё или \
               договоримся о просмотре?"
            .to_string(),
    }
}

pub fn engagement_buttons(lang: Language) -> Vec<Button> {
    match lang {
        En => vec![
            Button::new("More options", Action::ShowListings),
            Button::new("Book a viewing", Action::ScheduleViewing),
            Button::new("Call me", Action::RequestCall),
        ],
        Ru => vec![
            Button::new("Ещё варианты", Action::ShowListings),
            Button::new("Записаться на просмотр", Action::ScheduleViewing),
            Button::new("Позвоните мне", Action::RequestCall),
        ],
    }
}

pub fn whats_next(lang: Language) -> String {
    match lang {
        En => "What would you like to do next?".to_string(),
        Ru => "Что делаем дальше?".to_string(),
    }
}

pub fn ask_schedule(lang: Language) -> String {
    match lang {
        En => "When would suit you for a viewing? Any day and time works — \
               just write it as you'd say it."
            .to_string(),
        Ru => "Когда вам удобно посмотреть объект? Напишите день и время \
               своими словами."
            .to_string(),
    }
}

pub fn schedule_confirmed(lang: Language) -> String {
    match lang {
        En => "Booked — the agent will confirm the exact time shortly. \
               Thanks, talk soon!"
            .to_string(),
        Ru => "Записал — агент скоро подтвердит точное время. Спасибо, на связи!".to_string(),
    }
}

pub fn urgent_confirmed(lang: Language) -> String {
    match lang {
        En => "Our agent will call you shortly. Thank you!".to_string(),
        Ru => "Наш агент свяжется с вами в ближайшее время. Спасибо!".to_string(),
    }
}

pub fn completed(lang: Language) -> String {
    match lang {
        En => "We're all set — the agent has your details. \
               Write here any time if something changes."
            .to_string(),
        Ru => "Всё готово — агент получил ваши данные. \
               Пишите сюда в любой момент, если что-то изменится."
            .to_string(),
    }
}

pub fn closed(lang: Language) -> String {
    match lang {
        En => "No problem, I'll stop here. Write any time to pick it back up.".to_string(),
        Ru => "Хорошо, больше не беспокою. Напишите в любой момент, чтобы продолжить.".to_string(),
    }
}

pub fn question_ack(lang: Language) -> String {
    match lang {
        En => "Good question — I'll pass it to the agent, they'll cover the \
               details. Meanwhile:"
            .to_string(),
        Ru => "Хороший вопрос — передам агенту, он всё расскажет. А пока:".to_string(),
    }
}

pub fn did_not_catch(lang: Language) -> String {
    match lang {
        En => "Sorry, I didn't catch that.".to_string(),
        Ru => "Извините, я не совсем понял.".to_string(),
    }
}

pub fn use_your_link(lang: Language) -> String {
    match lang {
        En => "Please use the link from your agency to start — I can't tell \
               which agency you're with yet."
            .to_string(),
        Ru => "Пожалуйста, перейдите по ссылке вашего агентства — пока я не \
               знаю, с каким агентством вы работаете."
            .to_string(),
    }
}

pub fn nudge(lang: Language) -> String {
    match lang {
        En => "Still there? We were almost done — a couple of questions left \
               and I'll send you matching options."
            .to_string(),
        Ru => "Вы ещё здесь? Мы почти закончили — осталась пара вопросов, и я \
               пришлю подходящие варианты."
            .to_string(),
    }
}

// === Resume prompt ===

pub fn resume_prompt(lang: Language, slots: &SlotValues) -> String {
    let summary = slot_summary(lang, slots);
    match lang {
        En => {
            if summary.is_empty() {
                "Welcome back! Shall we continue where we left off?".to_string()
            } else {
                format!("Welcome back! Last time we noted: {summary}. Continue from there?")
            }
        }
        Ru => {
            if summary.is_empty() {
                "С возвращением! Продолжим с того места, где остановились?".to_string()
            } else {
                format!("С возвращением! В прошлый раз мы записали: {summary}. Продолжим?")
            }
        }
    }
}

pub fn resume_buttons(lang: Language) -> Vec<Button> {
    match lang {
        En => vec![
            Button::new("Continue", Action::ResumeContinue),
            Button::new("Start over", Action::ResumeRestart),
        ],
        Ru => vec![
            Button::new("Продолжить", Action::ResumeContinue),
            Button::new("Начать заново", Action::ResumeRestart),
        ],
    }
}

/// Short comma-joined summary of captured slots (purpose, budget, property
/// type) for the resume prompt.
pub fn slot_summary(lang: Language, slots: &SlotValues) -> String {
    let mut parts = Vec::new();
    if let Some(p) = slots.purpose {
        parts.push(purpose_label(lang, p).to_string());
    }
    if let Some(b) = slots.budget {
        parts.push(budget_label(lang, &b));
    }
    if let Some(p) = slots.property {
        parts.push(property_label(lang, p).to_string());
    }
    parts.join(", ")
}

pub fn purpose_label(lang: Language, p: Purpose) -> &'static str {
    match (lang, p) {
        (En, Purpose::Live) => "for yourself",
        (En, Purpose::Invest) => "investment",
        (Ru, Purpose::Live) => "для себя",
        (Ru, Purpose::Invest) => "инвестиция",
    }
}

pub fn property_label(lang: Language, p: PropertyType) -> &'static str {
    match (lang, p) {
        (En, PropertyType::Apartment) => "apartment",
        (En, PropertyType::House) => "house",
        (En, PropertyType::Commercial) => "commercial",
        (En, PropertyType::Land) => "land",
        (Ru, PropertyType::Apartment) => "квартира",
        (Ru, PropertyType::House) => "дом",
        (Ru, PropertyType::Commercial) => "коммерческая",
        (Ru, PropertyType::Land) => "участок",
    }
}

pub fn budget_label(lang: Language, b: &BudgetRange) -> String {
    let word = match lang {
        En => "budget",
        Ru => "бюджет",
    };
    match (b.min, b.max) {
        (Some(a), Some(z)) if a == z => format!("{word} {a}"),
        (Some(a), Some(z)) => format!("{word} {a}–{z}"),
        (Some(a), None) => match lang {
            En => format!("{word} from {a}"),
            Ru => format!("{word} от {a}"),
        },
        (None, Some(z)) => match lang {
            En => format!("{word} up to {z}"),
            Ru => format!("{word} до {z}"),
        },
        (None, None) => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_prompt_mentions_budget() {
        let slots = SlotValues {
            budget: BudgetRange::new(Some(1_000_000), None),
            ..Default::default()
        };
        let text = resume_prompt(En, &slots);
        assert!(text.contains("1000000"), "{text}");
    }

    #[test]
    fn summary_lists_purpose_budget_property() {
        let slots = SlotValues {
            purpose: Some(Purpose::Live),
            budget: Some(BudgetRange::exact(50_000)),
            property: Some(PropertyType::Apartment),
            ..Default::default()
        };
        let s = slot_summary(En, &slots);
        assert_eq!(s, "for yourself, budget 50000, apartment");
    }

    #[test]
    fn every_slot_has_a_question_in_both_languages() {
        for lang in [En, Ru] {
            for slot in crate::lead::SLOT_ORDER {
                assert!(!slot_question(lang, slot).is_empty());
            }
        }
    }
}
