//! Per-run state shared by every worker: the external call budget,
//! per-provider throttles and the cancellation signal.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use crate::config::Config;
use crate::error::ResolveError;

/// Hard cap on external calls for one run, shared across workers.
#[derive(Debug)]
pub struct CallBudget {
    remaining: AtomicUsize,
    exhausted_logged: AtomicBool,
}

impl CallBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(limit),
            exhausted_logged: AtomicBool::new(false),
        }
    }

    /// Take one call from the budget. Returns false once it is spent.
    pub fn try_acquire(&self) -> bool {
        let acquired = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if !acquired && !self.exhausted_logged.swap(true, Ordering::AcqRel) {
            tracing::warn!("External call budget exhausted; remaining lookups are rate limited");
        }
        acquired
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Enforces a minimum delay between consecutive calls to one provider.
#[derive(Debug)]
pub struct Throttle {
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the provider may be called again and claim the slot.
    pub async fn wait(&self) {
        if self.min_delay.is_zero() {
            return;
        }
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            tokio::time::sleep_until(previous + self.min_delay).await;
        }
        *last_call = Some(Instant::now());
    }
}

/// Run-level cancellation signal. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }
}

impl CancelToken {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once the run is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// State threaded through every resolution of one run.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub budget: Arc<CallBudget>,
    pub cancel: CancelToken,
    pub poi_throttle: Arc<Throttle>,
    pub geocode_throttle: Arc<Throttle>,
}

impl ResolutionContext {
    pub fn new(max_external_calls: usize, poi_delay: Duration, geocode_delay: Duration) -> Self {
        Self {
            budget: Arc::new(CallBudget::new(max_external_calls)),
            cancel: CancelToken::default(),
            poi_throttle: Arc::new(Throttle::new(poi_delay)),
            geocode_throttle: Arc::new(Throttle::new(geocode_delay)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_external_calls,
            config.poi.min_delay(),
            config.geocoder.min_delay(),
        )
    }

    /// Run one external request under the budget, the provider throttle and
    /// the cancellation signal.
    ///
    /// `Cancelled` and `RateLimitExceeded` mean no request was sent. A
    /// request abandoned mid-flight by cancellation is reported as
    /// `ProviderUnavailable`, like any other provider failure.
    pub async fn call<T, F>(
        &self,
        provider: &'static str,
        throttle: &Throttle,
        request: F,
    ) -> Result<T, ResolveError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(ResolveError::Cancelled);
        }
        if !self.budget.try_acquire() {
            return Err(ResolveError::RateLimitExceeded);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ResolveError::ProviderUnavailable {
                provider,
                reason: "abandoned: run cancelled".to_string(),
            }),
            result = async {
                throttle.wait().await;
                request.await
            } => result.map_err(|e| ResolveError::provider(provider, &e)),
        }
    }
}
