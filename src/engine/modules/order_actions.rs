//! Order action modules: cancellation, refund and modify-order
//!
//! All three share one shape. Look the order up through `order_lookup`, check
//! its status allows the action, then call the action binding. A confirmed
//! action answers with a structured record; a refused one answers with the
//! reason as text.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::tracking::ASK_FOR_ORDER_ID;
use super::{recover_or_fail, ModuleApiClient, ModuleExecutor, ModuleFailure, ModuleInput, ModuleOutcome};
use crate::models::{ApiConfig, ExecutionErrorKind, ModuleType};

/// Action performed by an [`OrderActionModule`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Cancel,
    Refund,
    Modify,
}

impl OrderAction {
    pub fn module_type(&self) -> ModuleType {
        match self {
            OrderAction::Cancel => ModuleType::Cancellation,
            OrderAction::Refund => ModuleType::Refund,
            OrderAction::Modify => ModuleType::ModifyOrder,
        }
    }

    /// Binding alias that performs the action
    pub fn action_alias(&self) -> &'static str {
        match self {
            OrderAction::Cancel => "cancel_order",
            OrderAction::Refund => "create_refund",
            OrderAction::Modify => "update_order",
        }
    }

    fn allowed_statuses(&self) -> &'static [&'static str] {
        match self {
            OrderAction::Cancel => &["pending", "placed", "confirmed", "processing", "on_hold", "awaiting_payment"],
            OrderAction::Refund => &["delivered", "completed", "fulfilled"],
            OrderAction::Modify => &["pending", "placed", "confirmed", "processing", "on_hold"],
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            OrderAction::Cancel => "cancelled",
            OrderAction::Refund => "refunded",
            OrderAction::Modify => "changed",
        }
    }

    fn confirmation_status(&self) -> &'static str {
        match self {
            OrderAction::Cancel => "cancelled",
            OrderAction::Refund => "refund_requested",
            OrderAction::Modify => "updated",
        }
    }

    fn confirmation_message(&self, order_id: &str) -> String {
        match self {
            OrderAction::Cancel => format!("Order #{} has been cancelled.", order_id),
            OrderAction::Refund => format!("A refund for order #{} has been requested.", order_id),
            OrderAction::Modify => format!("Order #{} has been updated.", order_id),
        }
    }

    fn fallback(&self) -> &'static str {
        match self {
            OrderAction::Cancel => "Sorry, we couldn't process your cancellation right now. Please try again shortly or contact our support team.",
            OrderAction::Refund => "Sorry, we couldn't process your refund request right now. Please try again shortly or contact our support team.",
            OrderAction::Modify => "Sorry, we couldn't update your order right now. Please try again shortly or contact our support team.",
        }
    }

    /// Why `status` blocks the action, or `None` if allowed
    pub fn rejection(&self, order_id: &str, status: Option<&str>) -> Option<String> {
        let Some(status) = status else {
            return Some(format!(
                "I couldn't confirm the status of order #{}, so it can't be {} automatically. Our support team will follow up.",
                order_id,
                self.verb()
            ));
        };
        if self.allowed_statuses().contains(&status) {
            return None;
        }

        let readable = status.replace('_', " ");
        let hint = match (self, status) {
            (OrderAction::Refund, "pending" | "placed" | "confirmed" | "processing") => {
                " You can cancel it instead while it hasn't shipped."
            }
            (OrderAction::Cancel | OrderAction::Modify, "shipped" | "in_transit" | "out_for_delivery") => {
                " Once it arrives you can request a return or refund."
            }
            _ => "",
        };
        Some(format!(
            "Order #{} can't be {} because its status is {}.{}",
            order_id,
            self.verb(),
            readable,
            hint
        ))
    }
}

fn normalize_status(record: &Value) -> Option<String> {
    ["status", "order_status", "state"]
        .iter()
        .find_map(|name| record.get(*name).and_then(Value::as_str))
        .map(|status| status.trim().to_ascii_lowercase().replace(['-', ' '], "_"))
        .filter(|status| !status.is_empty())
}

/// Executor for the cancellation, refund and modify-order module types
pub struct OrderActionModule {
    action: OrderAction,
    api: Arc<dyn ModuleApiClient>,
}

impl OrderActionModule {
    pub fn new(action: OrderAction, api: Arc<dyn ModuleApiClient>) -> Self {
        Self { action, api }
    }

    fn binding<'a>(&self, input: &ModuleInput<'a>, alias: &str) -> Result<&'a ApiConfig, ModuleFailure> {
        input.config.api(alias).ok_or_else(|| {
            ModuleFailure::new(
                ExecutionErrorKind::Configuration,
                format!("{} module has no {} binding", self.action.module_type(), alias),
            )
        })
    }
}

#[async_trait]
impl ModuleExecutor for OrderActionModule {
    fn module_type(&self) -> ModuleType {
        self.action.module_type()
    }

    async fn execute(&self, input: ModuleInput<'_>) -> Result<ModuleOutcome, ModuleFailure> {
        let lookup = self.binding(&input, "order_lookup")?;
        let action_api = self.binding(&input, self.action.action_alias())?;

        let Some(order_id) = input.order_id() else {
            return Ok(ModuleOutcome::reply(ASK_FOR_ORDER_ID));
        };

        let order = match self.api.call(lookup, Some(&order_id), None).await {
            Ok(order) => order,
            Err(err) if err.status() == Some(404) => {
                return Ok(ModuleOutcome::reply(format!(
                    "I couldn't find order #{}. Please double-check the order number.",
                    order_id
                )));
            }
            Err(err) => return recover_or_fail(&input, err, self.action.fallback()),
        };

        let status = normalize_status(&order);
        if let Some(reason) = self.action.rejection(&order_id, status.as_deref()) {
            return Ok(ModuleOutcome::reply(reason).with_data(json!({
                "orderId": order_id,
                "status": status,
            })));
        }

        let mut body = json!({
            "order_id": order_id,
            "reason": input.context.message,
        });
        if let Some(changes) = input.extracted_data.and_then(|data| data.get("changes")) {
            body["changes"] = changes.clone();
        }

        match self.api.call(action_api, Some(&order_id), Some(&body)).await {
            Ok(result) => {
                let confirmation = json!({
                    "action": self.action.module_type().as_str(),
                    "orderId": order_id,
                    "status": self.action.confirmation_status(),
                    "message": self.action.confirmation_message(&order_id),
                    "result": result,
                });
                Ok(ModuleOutcome::reply(confirmation.clone()).with_data(confirmation))
            }
            Err(err) => recover_or_fail(&input, err, self.action.fallback()),
        }
    }
}
