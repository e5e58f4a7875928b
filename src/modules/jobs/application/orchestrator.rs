//! Drives ordered stages over collections.
//!
//! Per-item errors are recorded on the job and never abort a stage; only a
//! failure to enumerate a stage's collection escapes to the caller. Items are
//! processed in collection order with a jittered pause between them.

use crate::modules::catalog::domain::Batch;
use crate::modules::jobs::domain::entities::{ItemOutcome, StageCounters};
use crate::modules::jobs::infrastructure::JobHandle;
use crate::shared::errors::AppResult;
use crate::shared::utils::text::truncate;
use crate::shared::utils::{Pacer, PacingPolicy, TimedOperation};
use crate::{log_debug, log_info, log_warn};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

#[async_trait]
pub trait Stage: Send + Sync {
    type Item: Send + Sync;

    fn name(&self) -> &str;

    /// Items this stage will process, in order.
    async fn collect(&self) -> AppResult<Vec<Self::Item>>;

    /// Short label used in progress reports and error lines.
    fn describe(&self, item: &Self::Item) -> String;

    async fn process(&self, item: &Self::Item) -> AppResult<ItemOutcome>;
}

/// Stage over a precomputed list.
pub struct ListStage<T, D, P> {
    name: String,
    items: std::sync::Mutex<Option<Vec<T>>>,
    describe: D,
    process: P,
}

impl<T, D, P> ListStage<T, D, P> {
    pub fn new(name: impl Into<String>, items: Vec<T>, describe: D, process: P) -> Self {
        Self {
            name: name.into(),
            items: std::sync::Mutex::new(Some(items)),
            describe,
            process,
        }
    }
}

#[async_trait]
impl<T, D, P, Fut> Stage for ListStage<T, D, P>
where
    T: Send + Sync + Clone + 'static,
    D: Fn(&T) -> String + Send + Sync,
    P: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = AppResult<ItemOutcome>> + Send,
{
    type Item = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> AppResult<Vec<T>> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .unwrap_or_default())
    }

    fn describe(&self, item: &T) -> String {
        (self.describe)(item)
    }

    async fn process(&self, item: &T) -> AppResult<ItemOutcome> {
        (self.process)(item.clone()).await
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    pacer: Arc<dyn Pacer>,
    pacing: PacingPolicy,
}

impl Orchestrator {
    pub fn new(pacer: Arc<dyn Pacer>, pacing: PacingPolicy) -> Self {
        Self { pacer, pacing }
    }

    pub fn pacer(&self) -> &Arc<dyn Pacer> {
        &self.pacer
    }

    pub fn pacing(&self) -> &PacingPolicy {
        &self.pacing
    }

    /// Run one stage to the end of its collection.
    pub async fn run_stage<S: Stage>(&self, handle: &JobHandle, stage: &S) -> AppResult<StageCounters> {
        let name = stage.name().to_string();
        handle.begin_stage(&name, None);
        let items = stage.collect().await?;
        handle.begin_stage(&name, Some(items.len()));

        let counters = self.process_items(handle, stage, items, 0).await;
        handle.finish_stage(&name);
        Ok(counters)
    }

    /// Process one more slice of a stage the caller has already begun.
    ///
    /// `first_index` keeps item numbers running across slices; the caller
    /// finishes the stage once the last slice is done.
    pub async fn run_slice<S: Stage>(
        &self,
        handle: &JobHandle,
        stage: &S,
        first_index: usize,
    ) -> AppResult<StageCounters> {
        let items = stage.collect().await?;
        Ok(self.process_items(handle, stage, items, first_index).await)
    }

    async fn process_items<S: Stage>(
        &self,
        handle: &JobHandle,
        stage: &S,
        items: Vec<S::Item>,
        first_index: usize,
    ) -> StageCounters {
        let name = stage.name().to_string();
        let timer = TimedOperation::new(&format!("{} stage {}", handle.id(), name));
        log_info!("[{}] stage {}: {} items", handle.id(), name, items.len());

        let mut counters = StageCounters::default();
        let last = items.len().saturating_sub(1);

        for (offset, item) in items.iter().enumerate() {
            let index = first_index + offset;
            let label = stage.describe(item);
            handle.set_current_item(&label);

            match stage.process(item).await {
                Ok(outcome) => {
                    log_debug!("[{}] {} item #{} ({}): {:?}", handle.id(), name, index + 1, label, outcome);
                    counters.record(outcome);
                    let error = match outcome {
                        ItemOutcome::Failed => Some(item_error(&name, index, &label, "failed")),
                        _ => None,
                    };
                    handle.record(&name, outcome, error);
                }
                Err(e) => {
                    let message = item_error(&name, index, &label, &e.to_string());
                    log_warn!("{}", message);
                    counters.record(ItemOutcome::Failed);
                    handle.record(&name, ItemOutcome::Failed, Some(message));
                }
            }

            if offset < last {
                self.pacer.pause(self.pacing.item.sample()).await;
            }
        }

        timer.finish_with_info(&format!(
            "{} processed, {} created, {} updated, {} errors",
            counters.processed, counters.created, counters.updated, counters.errors
        ));
        counters
    }

    /// Longer pause separating two stages.
    pub async fn between_stages(&self) {
        self.pacer.pause(self.pacing.stage).await;
    }

    /// Page through a collection `limit` items at a time from `offset`.
    ///
    /// A page shorter than `limit` ends the sweep; `run_page` returns how many
    /// items its page held. Returns the offsets that were visited.
    pub async fn run_batched<F, Fut>(
        &self,
        limit: usize,
        offset: usize,
        mut run_page: F,
    ) -> AppResult<Vec<usize>>
    where
        F: FnMut(Batch) -> Fut + Send,
        Fut: Future<Output = AppResult<usize>> + Send,
    {
        let limit = limit.max(1);
        let mut offset = offset;
        let mut visited = Vec::new();

        loop {
            visited.push(offset);
            let seen = run_page(Batch::new(offset, limit)).await?;
            if seen < limit {
                break;
            }
            offset += limit;
            self.pacer.pause(self.pacing.batch).await;
        }

        Ok(visited)
    }
}

/// `[stage] item #N (label): error`
pub fn item_error(stage: &str, index: usize, label: &str, error: &str) -> String {
    format!("[{}] item #{} ({}): {}", stage, index + 1, label, truncate(error, 300))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_error_format() {
        assert_eq!(
            item_error("squad", 3, "Arsenal", "Not found"),
            "[squad] item #4 (Arsenal): Not found"
        );
    }
}
