//! Payment processor webhook events.

use crate::error::{BillingError, BillingResult};
use apf_core::WebhookEventId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Webhook event types we act on or echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    SubscriptionDeleted,
    SubscriptionUpdated,
    Unknown,
}

impl WebhookEventType {
    pub fn from_name(name: &str) -> Self {
        match name {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            _ => Self::Unknown,
        }
    }
}

/// An inbound webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    /// Type name as sent, `"unknown"` when absent.
    pub event_type: String,
    pub kind: WebhookEventType,
    /// `data.object`, or an empty object.
    pub object: Map<String, Value>,
}

impl WebhookEvent {
    /// Parse a raw delivery. Missing `id` gets a generated one.
    pub fn from_slice(body: &[u8]) -> BillingResult<Self> {
        let value: Value = serde_json::from_slice(body)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> BillingResult<Self> {
        let Value::Object(mut event) = value else {
            return Err(BillingError::Payload(
                "webhook payload must be a JSON object".into(),
            ));
        };

        let event_type = event
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let id = event
            .get("id")
            .and_then(Value::as_str)
            .map(WebhookEventId::from)
            .unwrap_or_default();
        let object = match event.remove("data") {
            Some(Value::Object(mut data)) => match data.remove("object") {
                Some(Value::Object(object)) => object,
                _ => Map::new(),
            },
            _ => Map::new(),
        };

        Ok(Self {
            id,
            kind: WebhookEventType::from_name(&event_type),
            event_type,
            object,
        })
    }

    /// `data.object.id` as a string, if present.
    pub fn object_id(&self) -> Option<&str> {
        self.object.get("id").and_then(Value::as_str)
    }

    fn field_or(&self, key: &str, default: Value) -> Value {
        match self.object.get(key) {
            Some(Value::Null) | None => default,
            Some(value) => value.clone(),
        }
    }
}

/// What the processor did with an event, plus the fields echoed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WebhookAction {
    SessionCompleted {
        #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    PaymentRecorded {
        #[serde(rename = "amountPaid")]
        amount_paid: Value,
        customer: Value,
    },
    PaymentFailureRecorded {
        customer: Value,
        #[serde(rename = "nextAttempt")]
        next_attempt: Value,
    },
    SubscriptionCanceled {
        #[serde(rename = "subscriptionId")]
        subscription_id: Value,
    },
    SubscriptionUpdated {
        #[serde(rename = "subscriptionId")]
        subscription_id: Value,
        status: Value,
    },
    Ignored {
        message: String,
    },
}

impl WebhookAction {
    /// Echo for the event types that only get acknowledged.
    pub fn acknowledge(event: &WebhookEvent) -> Self {
        match event.kind {
            WebhookEventType::CheckoutSessionCompleted => WebhookAction::SessionCompleted {
                session_id: event.object_id().map(str::to_string),
            },
            WebhookEventType::InvoicePaymentSucceeded => WebhookAction::PaymentRecorded {
                amount_paid: event.field_or("amount_paid", json!(0)),
                customer: event.field_or("customer", json!("unknown")),
            },
            WebhookEventType::InvoicePaymentFailed => WebhookAction::PaymentFailureRecorded {
                customer: event.field_or("customer", json!("unknown")),
                next_attempt: event.field_or("next_payment_attempt", Value::Null),
            },
            WebhookEventType::SubscriptionDeleted => WebhookAction::SubscriptionCanceled {
                subscription_id: event.field_or("id", json!("unknown")),
            },
            WebhookEventType::SubscriptionUpdated => WebhookAction::SubscriptionUpdated {
                subscription_id: event.field_or("id", json!("unknown")),
                status: event.field_or("status", json!("unknown")),
            },
            WebhookEventType::Unknown => WebhookAction::Ignored {
                message: format!("Unhandled event type: {}", event.event_type),
            },
        }
    }
}

/// Response to a webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    pub event_type: String,
    #[serde(flatten)]
    pub action: WebhookAction,
}

/// Audit record of one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub event_id: WebhookEventId,
    pub processed: bool,
}
