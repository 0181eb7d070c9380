//! Cross-messenger outbound model.
//!
//! The engine emits abstract button sets; platform-specific rendering
//! (inline keyboards, interactive lists, reply buttons) and platform limits
//! live in the adapters.

use serde::{Deserialize, Serialize};

use crate::domain::Language;
use crate::lead::{PaymentMethod, PropertyType, Purpose, TransactionType};

/// A structured choice a user can make by tapping a button. The same choice
/// is always reachable by typing free text; buttons are a backup input
/// method, never the only way forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Lang(Language),
    Purpose(Purpose),
    Transaction(TransactionType),
    Property(PropertyType),
    Payment(PaymentMethod),
    ResumeContinue,
    ResumeRestart,
    ShowListings,
    ScheduleViewing,
    RequestCall,
    Close,
}

impl Action {
    /// Stable wire encoding used as callback data by adapters.
    pub fn encode(&self) -> String {
        match self {
            Action::Lang(l) => format!("lang:{}", l.code()),
            Action::Purpose(Purpose::Live) => "purpose:live".to_string(),
            Action::Purpose(Purpose::Invest) => "purpose:invest".to_string(),
            Action::Transaction(TransactionType::Buy) => "tx:buy".to_string(),
            Action::Transaction(TransactionType::Rent) => "tx:rent".to_string(),
            Action::Property(PropertyType::Apartment) => "prop:apartment".to_string(),
            Action::Property(PropertyType::House) => "prop:house".to_string(),
            Action::Property(PropertyType::Commercial) => "prop:commercial".to_string(),
            Action::Property(PropertyType::Land) => "prop:land".to_string(),
            Action::Payment(PaymentMethod::Cash) => "pay:cash".to_string(),
            Action::Payment(PaymentMethod::Mortgage) => "pay:mortgage".to_string(),
            Action::Payment(PaymentMethod::Installments) => "pay:installments".to_string(),
            Action::ResumeContinue => "resume:continue".to_string(),
            Action::ResumeRestart => "resume:restart".to_string(),
            Action::ShowListings => "listings".to_string(),
            Action::ScheduleViewing => "viewing".to_string(),
            Action::RequestCall => "callme".to_string(),
            Action::Close => "close".to_string(),
        }
    }

    pub fn decode(data: &str) -> Option<Self> {
        let action = match data {
            "purpose:live" => Action::Purpose(Purpose::Live),
            "purpose:invest" => Action::Purpose(Purpose::Invest),
            "tx:buy" => Action::Transaction(TransactionType::Buy),
            "tx:rent" => Action::Transaction(TransactionType::Rent),
            "prop:apartment" => Action::Property(PropertyType::Apartment),
            "prop:house" => Action::Property(PropertyType::House),
            "prop:commercial" => Action::Property(PropertyType::Commercial),
            "prop:land" => Action::Property(PropertyType::Land),
            "pay:cash" => Action::Payment(PaymentMethod::Cash),
            "pay:mortgage" => Action::Payment(PaymentMethod::Mortgage),
            "pay:installments" => Action::Payment(PaymentMethod::Installments),
            "resume:continue" => Action::ResumeContinue,
            "resume:restart" => Action::ResumeRestart,
            "listings" => Action::ShowListings,
            "viewing" => Action::ScheduleViewing,
            "callme" => Action::RequestCall,
            "close" => Action::Close,
            other => {
                let code = other.strip_prefix("lang:")?;
                return Language::from_code(code).map(Action::Lang);
            }
        };
        Some(action)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub buttons: Vec<Button>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    pub fn with_buttons(text: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            text: text.into(),
            buttons,
        }
    }
}
