//! Shipment tracking module
//!
//! Calls the `shipment_status` binding and answers with a short status line.
//! The raw shipment record is kept as extracted data for the frontend.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{recover_or_fail, ModuleApiClient, ModuleExecutor, ModuleFailure, ModuleInput, ModuleOutcome};
use crate::models::{ExecutionErrorKind, ModuleType};

pub const TRACKING_FALLBACK: &str =
    "Sorry, we couldn't retrieve your shipment status right now. Please try again in a few minutes.";
pub const ASK_FOR_ORDER_ID: &str =
    "Could you share your order number (for example #1234) so I can look it up?";

pub struct TrackingModule {
    api: Arc<dyn ModuleApiClient>,
}

impl TrackingModule {
    pub fn new(api: Arc<dyn ModuleApiClient>) -> Self {
        Self { api }
    }
}

fn field<'a>(record: &'a Value, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| record.get(*name).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// One-line answer from a shipment record
pub fn summarize_shipment(order_id: &str, record: &Value) -> String {
    if let Some(message) = field(record, &["message", "summary"]) {
        return message.to_string();
    }

    let mut summary = match field(record, &["status", "shipment_status", "state"]) {
        Some(status) => format!("Your order #{} is {}.", order_id, status.replace('_', " ").to_lowercase()),
        None => format!("Here is the latest update on your order #{}.", order_id),
    };
    if let Some(carrier) = field(record, &["carrier"]) {
        summary.push_str(&format!(" Carrier: {}.", carrier));
    }
    if let Some(tracking) = field(record, &["tracking_number", "trackingNumber"]) {
        summary.push_str(&format!(" Tracking number: {}.", tracking));
    }
    if let Some(eta) = field(record, &["estimated_delivery", "estimatedDelivery", "eta"]) {
        summary.push_str(&format!(" Estimated delivery: {}.", eta));
    }
    summary
}

#[async_trait]
impl ModuleExecutor for TrackingModule {
    fn module_type(&self) -> ModuleType {
        ModuleType::Tracking
    }

    async fn execute(&self, input: ModuleInput<'_>) -> Result<ModuleOutcome, ModuleFailure> {
        let api = input.config.api("shipment_status").ok_or_else(|| {
            ModuleFailure::new(ExecutionErrorKind::Configuration, "tracking module has no shipment_status binding")
        })?;

        let Some(order_id) = input.order_id() else {
            return Ok(ModuleOutcome::reply(ASK_FOR_ORDER_ID));
        };

        match self.api.call(api, Some(&order_id), None).await {
            Ok(record) => {
                let text = summarize_shipment(&order_id, &record);
                Ok(ModuleOutcome::reply(text).with_data(record))
            }
            Err(err) => recover_or_fail(&input, err, TRACKING_FALLBACK),
        }
    }
}
