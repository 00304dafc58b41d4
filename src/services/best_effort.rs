//! Best-effort side effects.
//!
//! A batch runs every effect concurrently on the current task and waits for
//! all of them. A failing effect is logged and recorded in the report; it
//! never cancels its siblings and never reaches the caller as an error.

use std::fmt::Display;
use std::future::Future;

use futures::future::join_all;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EffectOutcome<K> {
    pub(crate) key: K,
    pub(crate) error: Option<String>,
}

impl<K> EffectOutcome<K> {
    pub(crate) fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BatchReport<K> {
    pub(crate) outcomes: Vec<EffectOutcome<K>>,
}

impl<K> BatchReport<K> {
    pub(crate) fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.succeeded()).count()
    }

    pub(crate) fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub(crate) fn failures(&self) -> impl Iterator<Item = &EffectOutcome<K>> {
        self.outcomes.iter().filter(|outcome| !outcome.succeeded())
    }
}

/// Runs `effects` concurrently. Outcomes keep the input order.
pub(crate) async fn run_batch<K, F, E>(label: &'static str, effects: Vec<(K, F)>) -> BatchReport<K>
where
    K: Display,
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    let attempts = effects.into_iter().map(|(key, effect)| async move {
        match effect.await {
            Ok(()) => EffectOutcome { key, error: None },
            Err(err) => {
                tracing::warn!(
                    batch = label,
                    item = %key,
                    error = %err,
                    "Best-effort effect failed"
                );
                EffectOutcome { key, error: Some(err.to_string()) }
            }
        }
    });

    BatchReport { outcomes: join_all(attempts).await }
}

/// Single ancillary effect: the value on success, `None` (logged) on failure.
pub(crate) async fn attempt<T, E, F>(label: &'static str, effect: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match effect.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(effect = label, error = %err, "Best-effort effect failed");
            None
        }
    }
}
