//! Bounded-concurrency bulk mutation runner.

use std::{collections::HashSet, future::Future};

use futures::{StreamExt, future, stream};
use tokio_util::sync::CancellationToken;

use crate::prelude::*;

#[derive(Debug)]
pub struct BatchOutcome {
  pub index: usize,
  pub size: usize,
  pub result: std::result::Result<u64, String>,
}

#[derive(Debug, Default)]
pub struct BatchResult {
  /// Rows changed by successful batches.
  pub total_affected: u64,
  /// Executed batches in submission order.
  pub batches: Vec<BatchOutcome>,
  /// Batches never started because the caller cancelled.
  pub skipped: usize,
}

impl BatchResult {
  pub fn failed(&self) -> usize {
    self.batches.iter().filter(|b| b.result.is_err()).count()
  }

  /// Nothing matched, as opposed to nothing succeeded.
  pub fn nothing_matched(&self) -> bool {
    self.total_affected == 0 && self.failed() == 0
  }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchExecutor {
  max_batch: usize,
  concurrency: usize,
}

impl BatchExecutor {
  pub fn new(max_batch: usize, concurrency: usize) -> Self {
    Self { max_batch: max_batch.max(1), concurrency: concurrency.max(1) }
  }

  /// Runs `mutate` over `ids` in batches of `max_batch`, at most `concurrency`
  /// at a time. A batch is only started once a slot is free, and none are
  /// started after `cancel` fires; running batches are awaited either way.
  ///
  /// `mutate` must be idempotent: it returns the number of rows it changed.
  pub async fn execute<F, Fut>(
    &self,
    ids: Vec<i64>,
    cancel: &CancellationToken,
    mutate: F,
  ) -> BatchResult
  where
    F: Fn(Vec<i64>) -> Fut,
    Fut: Future<Output = Result<u64>>,
  {
    let mut seen = HashSet::with_capacity(ids.len());
    let ids: Vec<i64> = ids.into_iter().filter(|id| seen.insert(*id)).collect();

    let batches: Vec<Vec<i64>> =
      ids.chunks(self.max_batch).map(<[i64]>::to_vec).collect();
    let planned = batches.len();

    let mut outcomes: Vec<BatchOutcome> = stream::iter(batches.into_iter().enumerate())
      .take_while(|_| future::ready(!cancel.is_cancelled()))
      .map(|(index, batch)| {
        let size = batch.len();
        let fut = mutate(batch);
        async move {
          let result = fut.await.map_err(|err| err.to_string());
          BatchOutcome { index, size, result }
        }
      })
      .buffer_unordered(self.concurrency)
      .collect()
      .await;

    outcomes.sort_by_key(|outcome| outcome.index);

    let mut total_affected = 0;
    for outcome in &outcomes {
      match &outcome.result {
        // a conditional update never changes more rows than it names
        Ok(rows) => total_affected += (*rows).min(outcome.size as u64),
        Err(err) => {
          warn!("Batch {} ({} ids) failed: {}", outcome.index, outcome.size, err)
        }
      }
    }

    let skipped = planned - outcomes.len();
    if skipped > 0 {
      info!("Batch run cancelled, {} of {} batches skipped", skipped, planned);
    }

    BatchResult { total_affected, batches: outcomes, skipped }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[tokio::test]
  async fn test_concurrency_never_exceeds_limit() {
    let executor = BatchExecutor::new(2, 3);
    let in_flight = AtomicUsize::new(0);
    let peak = AtomicUsize::new(0);

    let result = executor
      .execute((0..40).collect(), &CancellationToken::new(), |batch| {
        let (in_flight, peak) = (&in_flight, &peak);
        async move {
          let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
          peak.fetch_max(now, Ordering::SeqCst);
          time::sleep(Duration::from_millis(5)).await;
          in_flight.fetch_sub(1, Ordering::SeqCst);
          Ok(batch.len() as u64)
        }
      })
      .await;

    assert_eq!(result.total_affected, 40);
    assert_eq!(result.batches.len(), 20);
    assert_eq!(peak.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_failed_batches_do_not_abort_siblings() {
    let executor = BatchExecutor::new(10, 5);

    let result = executor
      .execute((1..=25).collect(), &CancellationToken::new(), |batch| async move {
        if batch.contains(&15) {
          Err(Error::Internal("deadlock detected".into()))
        } else {
          Ok(batch.len() as u64)
        }
      })
      .await;

    assert_eq!(result.batches.len(), 3);
    assert_eq!(result.failed(), 1);
    assert!(result.batches[1].result.is_err());
    assert_eq!(result.total_affected, 15);
    assert!(!result.nothing_matched());
  }

  #[tokio::test]
  async fn test_affected_never_exceeds_ids() {
    let executor = BatchExecutor::new(4, 2);

    // duplicated ids and an over-reporting mutation
    let ids = vec![1, 2, 2, 3, 3, 3, 4, 5];
    let result = executor
      .execute(ids.clone(), &CancellationToken::new(), |_| async { Ok(100) })
      .await;

    assert_eq!(result.total_affected, 5);
    assert!(result.total_affected <= ids.len() as u64);
  }

  #[tokio::test]
  async fn test_cancel_stops_new_batches() {
    let executor = BatchExecutor::new(1, 1);
    let cancel = CancellationToken::new();
    let started = AtomicUsize::new(0);

    let result = executor
      .execute((1..=5).collect(), &cancel, |batch| {
        started.fetch_add(1, Ordering::SeqCst);
        cancel.cancel();
        async move { Ok(batch.len() as u64) }
      })
      .await;

    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(result.total_affected, 1);
    assert_eq!(result.skipped, 4);
  }

  #[tokio::test]
  async fn test_empty_input() {
    let result = BatchExecutor::new(10, 2)
      .execute(Vec::new(), &CancellationToken::new(), |_| async { Ok(1) })
      .await;

    assert!(result.batches.is_empty());
    assert!(result.nothing_matched());
  }

  #[test]
  fn test_zero_limits_are_clamped() {
    let executor = BatchExecutor::new(0, 0);
    assert_eq!(executor.max_batch, 1);
    assert_eq!(executor.concurrency, 1);
  }
}
