//! Shared test fixtures: a scriptable in-process counter source.

#![allow(dead_code)]

use async_trait::async_trait;
use clonemon_core::error::{MonitorError, Result};
use clonemon_core::{
    Collection, CounterSource, Counts, HistoryStore, Monitor, RecordFilter, Sampler, SamplerConfig,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a single scripted query misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Return `SourceUnavailable`.
    Fail,
    /// Never complete; only the sampler's timeout ends it.
    Hang,
    /// Complete after a delay.
    Delay(Duration),
}

/// Counter source returning fixed counts, with optional one-shot faults.
#[derive(Default)]
pub struct ScriptedSource {
    counts: Mutex<Counts>,
    clone_sizes: Mutex<Vec<f64>>,
    count_faults: Mutex<HashMap<Collection, VecDeque<Fault>>>,
    sum_faults: Mutex<VecDeque<Fault>>,
    count_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(counts: Counts, clone_sizes: Vec<f64>) -> Arc<Self> {
        Arc::new(Self {
            counts: Mutex::new(counts),
            clone_sizes: Mutex::new(clone_sizes),
            ..Self::default()
        })
    }

    pub fn set_counts(&self, counts: Counts) {
        *self.counts.lock().unwrap() = counts;
    }

    /// Queue a fault for the next count query on `collection`.
    pub fn fault_next_count(&self, collection: Collection, fault: Fault) {
        self.count_faults.lock().unwrap().entry(collection).or_default().push_back(fault);
    }

    /// Queue a fault for the next sum query.
    pub fn fault_next_sum(&self, fault: Fault) {
        self.sum_faults.lock().unwrap().push_back(fault);
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    async fn apply(fault: Option<Fault>, collection: Collection) -> Result<()> {
        match fault {
            None => Ok(()),
            Some(Fault::Fail) => Err(MonitorError::SourceUnavailable {
                collection: collection.to_string(),
                reason: "connection refused".to_string(),
            }),
            Some(Fault::Hang) => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Some(Fault::Delay(d)) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CounterSource for ScriptedSource {
    async fn count(&self, collection: Collection, _filter: &RecordFilter) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self
            .count_faults
            .lock()
            .unwrap()
            .get_mut(&collection)
            .and_then(|queue| queue.pop_front());
        Self::apply(fault, collection).await?;
        Ok(self.counts.lock().unwrap().get(collection))
    }

    async fn sum(
        &self,
        collection: Collection,
        _field: &str,
        _filter: &RecordFilter,
    ) -> Result<f64> {
        let fault = self.sum_faults.lock().unwrap().pop_front();
        Self::apply(fault, collection).await?;
        Ok(self.clone_sizes.lock().unwrap().iter().sum())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn sampler_config(query_timeout: Duration) -> SamplerConfig {
    SamplerConfig { query_timeout, ..SamplerConfig::default() }
}

pub fn monitor(
    source: Arc<ScriptedSource>,
    history: Arc<dyn HistoryStore>,
    query_timeout: Duration,
) -> Monitor {
    Monitor::new(Sampler::new(source, sampler_config(query_timeout)), history)
}

pub fn counts(files: u64, chunks: u64, candidates: u64, clones: u64) -> Counts {
    Counts { files, chunks, candidates, clones }
}
