// Intent labels produced by the GenAI classifier

//! # Intents
//!
//! An intent is the classifier's answer to "what does the customer want?".
//! The set is closed: anything the provider returns outside of it collapses
//! to [`Intent::GeneralQuery`] so a flaky classification never aborts a turn.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of classification labels
///
/// Router nodes key their `intent_mappings` by the snake_case form returned
/// from [`Intent::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Anything that is not a transactional request (FAQ, greetings, ...)
    GeneralQuery,
    /// The customer wants to cancel an order
    Cancellation,
    /// The customer asks where an order is or what state it is in
    OrderQuery,
    /// The customer asks for a refund or about a refund
    RefundQuery,
    /// The customer wants to change an existing order
    ModifyOrder,
}

impl Intent {
    /// Every intent, in a stable order (used when building classifier prompts)
    pub const ALL: [Intent; 5] = [
        Intent::GeneralQuery,
        Intent::Cancellation,
        Intent::OrderQuery,
        Intent::RefundQuery,
        Intent::ModifyOrder,
    ];

    /// Wire name of the intent
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::GeneralQuery => "general_query",
            Intent::Cancellation => "cancellation",
            Intent::OrderQuery => "order_query",
            Intent::RefundQuery => "refund_query",
            Intent::ModifyOrder => "modify_order",
        }
    }

    /// Short description handed to the classifier alongside the label
    pub fn description(&self) -> &'static str {
        match self {
            Intent::GeneralQuery => "general questions, greetings, store policies, anything else",
            Intent::Cancellation => "the customer wants to cancel an order",
            Intent::OrderQuery => "the customer asks about order status, shipping or delivery",
            Intent::RefundQuery => "the customer asks for a refund or about refund status",
            Intent::ModifyOrder => "the customer wants to change items, quantity or address of an order",
        }
    }

    /// Lenient parse: accepts case differences, hyphens and spaces
    ///
    /// Returns `None` for labels outside the closed set.
    pub fn parse(label: &str) -> Option<Intent> {
        let normalized = label.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "general_query" | "general" | "faq" => Some(Intent::GeneralQuery),
            "cancellation" | "cancel" | "cancel_order" => Some(Intent::Cancellation),
            "order_query" | "order_status" | "tracking" => Some(Intent::OrderQuery),
            "refund_query" | "refund" => Some(Intent::RefundQuery),
            "modify_order" | "order_modification" => Some(Intent::ModifyOrder),
            _ => None,
        }
    }

    /// Parse a provider label, falling back to `GeneralQuery` when unknown
    pub fn from_provider_label(label: &str) -> Intent {
        Intent::parse(label).unwrap_or(Intent::GeneralQuery)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::parse(s).ok_or_else(|| format!("unknown intent '{}'", s))
    }
}
