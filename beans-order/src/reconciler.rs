use beans_core::{CoreError, CoreResult, OrderStatus};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};

use crate::effects::NotificationDispatcher;
use crate::lifecycle::{LifecycleEngine, Notice, Source};

// ============================================================================
// Typed payment event
// ============================================================================

/// Fields the provider signs each notification with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSignature {
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
}

/// A payment notification after parsing the untrusted payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEvent {
    pub order_id: String,
    pub transaction_status: String,
    pub fraud_status: Option<String>,
    pub signature: Option<EventSignature>,
}

impl PaymentEvent {
    pub fn from_slice(body: &[u8]) -> CoreResult<Self> {
        let payload: Value = serde_json::from_slice(body)
            .map_err(|e| CoreError::MalformedPayload(format!("body is not JSON: {}", e)))?;
        Self::parse(&payload)
    }

    pub fn parse(payload: &Value) -> CoreResult<Self> {
        let fields = payload
            .as_object()
            .ok_or_else(|| CoreError::MalformedPayload("payload is not a JSON object".to_string()))?;

        let order_id = required_str(fields, "order_id")?;
        if order_id.is_empty() {
            return Err(CoreError::MalformedPayload("order_id is empty".to_string()));
        }

        let signature = match (
            optional_str(fields, "status_code")?,
            optional_str(fields, "gross_amount")?,
            optional_str(fields, "signature_key")?,
        ) {
            (Some(status_code), Some(gross_amount), Some(signature_key)) => Some(EventSignature {
                status_code,
                gross_amount,
                signature_key,
            }),
            _ => None,
        };

        Ok(Self {
            order_id,
            transaction_status: required_str(fields, "transaction_status")?,
            fraud_status: optional_str(fields, "fraud_status")?,
            signature,
        })
    }
}

fn required_str(fields: &Map<String, Value>, key: &str) -> CoreResult<String> {
    optional_str(fields, key)?.ok_or_else(|| CoreError::MalformedPayload(format!("missing field `{}`", key)))
}

fn optional_str(fields: &Map<String, Value>, key: &str) -> CoreResult<Option<String>> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CoreError::MalformedPayload(format!(
            "field `{}` must be a string, got {}",
            key, other
        ))),
    }
}

// ============================================================================
// Gateway vocabulary -> lifecycle mapping
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudMatch {
    Any,
    Is(&'static str),
}

impl FraudMatch {
    fn matches(&self, fraud_status: Option<&str>) -> bool {
        match self {
            FraudMatch::Any => true,
            FraudMatch::Is(expected) => fraud_status == Some(*expected),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRule {
    pub transaction_status: &'static str,
    pub fraud_status: FraudMatch,
    pub target: OrderStatus,
    pub notice: Notice,
}

/// First matching rule wins. `deny` is deliberately silent while `cancel`/`expire` notify.
pub const MAPPING_RULES: &[MappingRule] = &[
    MappingRule {
        transaction_status: "capture",
        fraud_status: FraudMatch::Is("challenge"),
        target: OrderStatus::Pending,
        notice: Notice::Silent,
    },
    MappingRule {
        transaction_status: "capture",
        fraud_status: FraudMatch::Is("accept"),
        target: OrderStatus::Success,
        notice: Notice::Send("Success"),
    },
    MappingRule {
        transaction_status: "settlement",
        fraud_status: FraudMatch::Any,
        target: OrderStatus::Success,
        notice: Notice::Send("success"),
    },
    MappingRule {
        transaction_status: "deny",
        fraud_status: FraudMatch::Any,
        target: OrderStatus::Failed,
        notice: Notice::Silent,
    },
    MappingRule {
        transaction_status: "cancel",
        fraud_status: FraudMatch::Any,
        target: OrderStatus::Failed,
        notice: Notice::Send("Failed"),
    },
    MappingRule {
        transaction_status: "expire",
        fraud_status: FraudMatch::Any,
        target: OrderStatus::Failed,
        notice: Notice::Send("Failed"),
    },
    MappingRule {
        transaction_status: "pending",
        fraud_status: FraudMatch::Any,
        target: OrderStatus::Pending,
        notice: Notice::Silent,
    },
];

/// Look up the lifecycle action for an event; `None` means ignore it.
pub fn map_event(event: &PaymentEvent) -> Option<&'static MappingRule> {
    if event.transaction_status.is_empty() {
        return None;
    }
    let fraud_status = event.fraud_status.as_deref();
    MAPPING_RULES
        .iter()
        .find(|rule| rule.transaction_status == event.transaction_status && rule.fraud_status.matches(fraud_status))
}

// ============================================================================
// Signature verification
// ============================================================================

/// Checks `sha512(order_id + status_code + gross_amount + server_key)`.
pub struct SignatureVerifier {
    server_key: String,
}

impl SignatureVerifier {
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
        }
    }

    pub fn sign(&self, order_id: &str, status_code: &str, gross_amount: &str) -> String {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(gross_amount.as_bytes());
        hasher.update(self.server_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, event: &PaymentEvent) -> CoreResult<()> {
        let signature = event
            .signature
            .as_ref()
            .ok_or_else(|| CoreError::MalformedPayload("signature fields missing".to_string()))?;

        let expected = self.sign(&event.order_id, &signature.status_code, &signature.gross_amount);
        let provided = signature.signature_key.to_ascii_lowercase();

        if bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
            Ok(())
        } else {
            Err(CoreError::MalformedPayload("signature mismatch".to_string()))
        }
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// What happened to a webhook. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Applied {
        order_id: String,
        status: OrderStatus,
        notified: bool,
    },
    AlreadyApplied {
        order_id: String,
        status: OrderStatus,
    },
    Unmapped {
        order_id: String,
        transaction_status: String,
    },
    UnknownOrder {
        order_id: String,
    },
    Malformed {
        reason: String,
    },
    Rejected {
        order_id: String,
        reason: String,
    },
    Failed {
        order_id: String,
        reason: String,
    },
}

/// Maps provider notifications onto lifecycle transitions
pub struct WebhookReconciler {
    engine: Arc<LifecycleEngine>,
    dispatcher: Arc<NotificationDispatcher>,
    verifier: Option<SignatureVerifier>,
}

impl WebhookReconciler {
    pub fn new(engine: Arc<LifecycleEngine>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            engine,
            dispatcher,
            verifier: None,
        }
    }

    pub fn with_signature_verification(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub async fn reconcile_bytes(&self, body: &[u8]) -> Reconciliation {
        match PaymentEvent::from_slice(body) {
            Ok(event) => self.reconcile_event(event).await,
            Err(err) => malformed(err),
        }
    }

    pub async fn reconcile(&self, payload: &Value) -> Reconciliation {
        match PaymentEvent::parse(payload) {
            Ok(event) => self.reconcile_event(event).await,
            Err(err) => malformed(err),
        }
    }

    async fn reconcile_event(&self, event: PaymentEvent) -> Reconciliation {
        if let Some(verifier) = &self.verifier {
            if let Err(err) = verifier.verify(&event) {
                warn!(order_id = %event.order_id, error = %err, "Payment notification failed signature check");
                return malformed(err);
            }
        }

        let Some(rule) = map_event(&event) else {
            debug!(
                order_id = %event.order_id,
                transaction_status = %event.transaction_status,
                fraud_status = ?event.fraud_status,
                "Payment notification has no mapped action"
            );
            return Reconciliation::Unmapped {
                order_id: event.order_id,
                transaction_status: event.transaction_status,
            };
        };

        let order_id = event.order_id;
        match self.engine.apply(&order_id, rule.target, Source::Gateway(rule.notice)).await {
            Ok(transition) if transition.applied => {
                let notified = self.dispatcher.dispatch(&transition).await;
                info!(
                    %order_id,
                    transaction_status = %event.transaction_status,
                    status = %transition.order.status,
                    notified,
                    "Payment notification applied"
                );
                Reconciliation::Applied {
                    order_id,
                    status: transition.order.status,
                    notified,
                }
            }
            Ok(transition) => Reconciliation::AlreadyApplied {
                order_id,
                status: transition.order.status,
            },
            Err(CoreError::NotFound(_)) => {
                debug!(%order_id, "Payment notification for unknown order ignored");
                Reconciliation::UnknownOrder { order_id }
            }
            Err(err @ CoreError::InvalidTransition { .. }) => {
                warn!(%order_id, transaction_status = %event.transaction_status, error = %err, "Payment notification out of order");
                Reconciliation::Rejected {
                    order_id,
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                error!(%order_id, error = %err, "Payment notification could not be applied");
                Reconciliation::Failed {
                    order_id,
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn malformed(err: CoreError) -> Reconciliation {
    warn!(error = %err, "Malformed payment notification acknowledged without processing");
    Reconciliation::Malformed {
        reason: err.to_string(),
    }
}
