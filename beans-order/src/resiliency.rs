use async_trait::async_trait;
use beans_core::payment::{CustomerDetails, GatewayError, PaymentGateway, PaymentToken};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Phase {
    Closed { failures: usize },
    Open { until: Instant },
    /// A single trial call is out; nobody else is admitted until it settles.
    HalfOpen,
}

/// Counts consecutive failures of a downstream call and stops admitting
/// calls once `threshold` is reached. After `cooldown` one trial call is admitted;
/// its outcome closes or reopens the circuit.
pub struct CircuitBreaker {
    name: String,
    threshold: usize,
    cooldown: Duration,
    phase: Mutex<Phase>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, threshold: usize, cooldown: Duration) -> Self {
        Self {
            name: name.into(),
            threshold: threshold.max(1),
            cooldown,
            phase: Mutex::new(Phase::Closed { failures: 0 }),
        }
    }

    fn phase(&self) -> MutexGuard<'_, Phase> {
        // Phase is always left consistent, so a poisoned lock is still usable
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CircuitState {
        match *self.phase() {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen => CircuitState::HalfOpen,
        }
    }

    /// Ask to make a call. `None` means fail fast.
    ///
    /// The returned admission must be settled with `succeeded` or `failed`;
    /// dropping it unsettled (a cancelled call) counts as a failure.
    pub fn admit(&self) -> Option<Admission<'_>> {
        let mut phase = self.phase();
        match *phase {
            Phase::Closed { .. } => Some(Admission::new(self, false)),
            Phase::Open { until } if Instant::now() >= until => {
                *phase = Phase::HalfOpen;
                info!(breaker = %self.name, "Circuit half-open, admitting one trial call");
                Some(Admission::new(self, true))
            }
            Phase::Open { .. } | Phase::HalfOpen => None,
        }
    }

    fn settle(&self, trial: bool, ok: bool) {
        let mut phase = self.phase();

        // Calls admitted before the circuit opened do not get a say afterwards
        if !trial && !matches!(*phase, Phase::Closed { .. }) {
            return;
        }

        if ok {
            if trial {
                info!(breaker = %self.name, "Circuit closed after successful trial call");
            }
            *phase = Phase::Closed { failures: 0 };
            return;
        }

        let failures = match *phase {
            Phase::Closed { failures } => failures + 1,
            _ => self.threshold,
        };
        if failures < self.threshold {
            *phase = Phase::Closed { failures };
        } else {
            *phase = Phase::Open {
                until: Instant::now() + self.cooldown,
            };
            error!(breaker = %self.name, failures, trial, "Circuit opened");
        }
    }
}

/// Permission for one call through a `CircuitBreaker`
#[must_use]
pub struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Admission<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker.settle(self.trial, true);
    }

    pub fn failed(mut self) {
        self.settled = true;
        self.breaker.settle(self.trial, false);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.trial, false);
        }
    }
}

/// Payment gateway behind a circuit breaker. Each call is bounded by
/// `call_timeout`; a timeout counts as a failure like any other error.
pub struct GuardedGateway {
    inner: Arc<dyn PaymentGateway>,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl GuardedGateway {
    pub fn new(inner: Arc<dyn PaymentGateway>, breaker: CircuitBreaker, call_timeout: Duration) -> Self {
        Self {
            inner,
            breaker,
            call_timeout,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }
}

#[async_trait]
impl PaymentGateway for GuardedGateway {
    async fn request_token(
        &self,
        order_id: &str,
        amount: i64,
        customer: &CustomerDetails,
    ) -> Result<PaymentToken, GatewayError> {
        let Some(admission) = self.breaker.admit() else {
            return Err(GatewayError::CircuitOpen);
        };

        let outcome = tokio::time::timeout(self.call_timeout, self.inner.request_token(order_id, amount, customer))
            .await
            .unwrap_or(Err(GatewayError::Timeout));

        match outcome {
            Ok(token) => {
                admission.succeeded();
                Ok(token)
            }
            Err(err) => {
                admission.failed();
                Err(err)
            }
        }
    }
}
