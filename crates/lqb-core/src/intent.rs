//! Free-text intent resolution.
//!
//! Users type naturally instead of tapping buttons, so every choice point
//! accepts free-text synonyms. The matching lives behind a trait so a
//! smarter classifier can replace the keyword tables without touching the
//! state machine.

use crate::domain::Language;
use crate::messaging::types::Action;

pub trait IntentClassifier: Send + Sync {
    /// Resolve free text into the structured action it is a synonym for.
    /// Returns `None` when the text is not a recognizable choice; the engine
    /// then falls back to slot extraction or a re-prompt.
    fn resolve(&self, lang: Language, text: &str) -> Option<Action>;

    /// Whether the text reads as a question rather than an answer.
    fn is_question(&self, lang: Language, text: &str) -> bool;

    fn is_affirmative(&self, lang: Language, text: &str) -> bool;

    /// Explicit abandon signal ("stop", "not interested").
    fn is_abort(&self, lang: Language, text: &str) -> bool;
}

/// Keyword/synonym tables per language. Deterministic and transparent:
/// every mapping is visible in this file.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleBasedClassifier;

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|t| t == word)
}

fn has_any_word(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| has_word(text, w))
}

fn has_any_phrase(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| text.contains(p))
}

impl IntentClassifier for RuleBasedClassifier {
    fn resolve(&self, lang: Language, text: &str) -> Option<Action> {
        let t = normalize(text);
        if t.is_empty() {
            return None;
        }

        // Language names resolve regardless of the current language.
        if has_any_word(&t, &["english", "en"]) {
            return Some(Action::Lang(Language::En));
        }
        if has_any_word(&t, &["русский", "russian", "ru"]) {
            return Some(Action::Lang(Language::Ru));
        }

        let tables: &[(&[&str], &[&str], Action)] = &[
            (
                &["more", "another", "others", "options"],
                &["ещё", "еще", "другие", "варианты"],
                Action::ShowListings,
            ),
            (
                &["viewing", "visit", "tour"],
                &["просмотр", "посмотреть", "показ"],
                Action::ScheduleViewing,
            ),
            (
                &["call"],
                &["позвоните", "позвонить", "звонок"],
                Action::RequestCall,
            ),
            (
                &["continue", "resume"],
                &["продолжить", "продолжим"],
                Action::ResumeContinue,
            ),
            (
                &["restart"],
                &["заново", "сначала"],
                Action::ResumeRestart,
            ),
        ];
        for &(en_words, ru_words, action) in tables {
            let words = match lang {
                Language::En => en_words,
                Language::Ru => ru_words,
            };
            if has_any_word(&t, words) {
                return Some(action);
            }
        }

        // Phrase synonyms that don't tokenize well.
        match lang {
            Language::En => {
                if t.contains("start over") || t.contains("from scratch") {
                    return Some(Action::ResumeRestart);
                }
            }
            Language::Ru => {
                if t.contains("начать заново") {
                    return Some(Action::ResumeRestart);
                }
            }
        }

        if self.is_abort(lang, text) {
            return Some(Action::Close);
        }

        None
    }

    fn is_question(&self, lang: Language, text: &str) -> bool {
        let t = normalize(text);
        if t.contains('?') {
            return true;
        }
        let interrogatives: &[&str] = match lang {
            Language::En => &[
                "what", "how", "when", "where", "why", "who", "which", "can", "could", "do",
                "does", "is", "are",
            ],
            Language::Ru => &[
                "что", "как", "когда", "где", "почему", "кто", "какой", "какая", "сколько",
                "можно", "ли",
            ],
        };
        t.split_whitespace()
            .next()
            .map(|first| {
                let first: String = first.chars().filter(|c| c.is_alphanumeric()).collect();
                interrogatives.contains(&first.as_str())
            })
            .unwrap_or(false)
    }

    fn is_affirmative(&self, lang: Language, text: &str) -> bool {
        let t = normalize(text);
        match lang {
            Language::En => {
                has_any_word(&t, &["yes", "yeah", "yep", "sure", "ok", "okay", "fine"])
                    || has_any_phrase(&t, &["go ahead", "sounds good"])
            }
            Language::Ru => {
                has_any_word(&t, &["да", "давай", "давайте", "хорошо", "ок", "конечно", "ага"])
            }
        }
    }

    fn is_abort(&self, lang: Language, text: &str) -> bool {
        let t = normalize(text);
        match lang {
            Language::En => {
                has_any_word(&t, &["stop", "unsubscribe", "cancel"])
                    || has_any_phrase(&t, &["not interested", "leave me alone"])
            }
            Language::Ru => {
                has_any_word(&t, &["стоп", "отмена", "отписаться", "отстаньте"])
                    || has_any_phrase(&t, &["не интересно", "неинтересно", "не пишите"])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::TransactionType;

    const C: RuleBasedClassifier = RuleBasedClassifier;

    #[test]
    fn resolves_menu_synonyms_per_language() {
        assert_eq!(
            C.resolve(Language::En, "show me more options"),
            Some(Action::ShowListings)
        );
        assert_eq!(
            C.resolve(Language::Ru, "пришлите ещё варианты"),
            Some(Action::ShowListings)
        );
        assert_eq!(
            C.resolve(Language::En, "please call me"),
            Some(Action::RequestCall)
        );
    }

    #[test]
    fn language_names_resolve_from_any_language() {
        assert_eq!(
            C.resolve(Language::En, "Русский"),
            Some(Action::Lang(Language::Ru))
        );
        assert_eq!(
            C.resolve(Language::Ru, "english please"),
            Some(Action::Lang(Language::En))
        );
    }

    #[test]
    fn question_detection() {
        assert!(C.is_question(Language::En, "what about the mortgage rate?"));
        assert!(C.is_question(Language::En, "how long does it take"));
        assert!(C.is_question(Language::Ru, "сколько стоит оформление"));
        assert!(!C.is_question(Language::En, "two bedrooms"));
        // "no" inside a word must not trigger anything.
        assert!(!C.is_abort(Language::En, "downtown is fine"));
    }

    #[test]
    fn abort_phrases() {
        assert!(C.is_abort(Language::En, "not interested, thanks"));
        assert!(C.is_abort(Language::Ru, "мне это не интересно"));
        assert_eq!(C.resolve(Language::En, "stop"), Some(Action::Close));
    }

    #[test]
    fn unknown_text_resolves_to_none() {
        assert_eq!(C.resolve(Language::En, "somewhere near the park"), None);
        // Slot values are extraction's job, not intent's.
        assert_ne!(
            C.resolve(Language::En, "rent"),
            Some(Action::Transaction(TransactionType::Buy))
        );
    }
}
