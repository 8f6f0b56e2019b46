//! Sampler - turns point-in-time counter source queries into snapshots.

use super::snapshot::{Collection, Counts, Snapshot, Timings, CLONES_SIZE_STAGE};
use crate::config::Config;
use crate::error::{MonitorError, Result};
use crate::observability::metrics as obs;
use crate::source::{CounterSource, RecordFilter};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Sampler settings.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Upper bound for every single counter source query.
    pub query_timeout: Duration,
    /// Numeric field summed across clone records.
    pub clones_size_field: String,
    /// Attach per-stage timings to snapshots.
    pub record_timings: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(10),
            clones_size_field: "size".to_string(),
            record_timings: true,
        }
    }
}

impl From<&Config> for SamplerConfig {
    fn from(config: &Config) -> Self {
        Self {
            query_timeout: config.query_timeout(),
            clones_size_field: config.clones_size_field.clone(),
            record_timings: config.record_timings,
        }
    }
}

/// Raw results of one round of counter source queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub counts: Counts,
    pub clones_size: f64,
    pub timings: Option<Timings>,
}

/// Produces snapshots from a counter source.
///
/// A sample is all-or-nothing: if any query fails or times out, no snapshot
/// is produced. Derived metrics are computed only after every raw count is in.
pub struct Sampler {
    source: Arc<dyn CounterSource>,
    config: SamplerConfig,
    /// Latest issued timestamp (ms since epoch); keeps timestamps non-decreasing.
    last_timestamp_ms: AtomicI64,
}

impl Sampler {
    pub fn new(source: Arc<dyn CounterSource>, config: SamplerConfig) -> Self {
        Self { source, config, last_timestamp_ms: AtomicI64::new(i64::MIN) }
    }

    /// Take one sample of every tracked collection and stamp it.
    pub async fn sample(&self) -> Result<Snapshot> {
        let measurement = self.measure().await?;
        Ok(self.stamp(measurement))
    }

    /// Query every tracked collection plus the `clones_size` aggregate.
    ///
    /// The result carries no timestamp; [`Sampler::stamp`] issues one once the
    /// caller is ready to store it.
    #[instrument(skip(self), fields(source = self.source.name()))]
    pub async fn measure(&self) -> Result<Measurement> {
        let filter = RecordFilter::all();

        let mut counts = Counts::default();
        let mut timings = Timings::new();

        for collection in Collection::ALL {
            let query = self.source.count(collection, &filter);
            let (count, elapsed) = self.timed(collection, collection.as_str(), query).await?;
            counts.set(collection, count);
            timings.insert(collection.as_str().to_string(), elapsed);
        }

        let query = self.source.sum(Collection::Clones, &self.config.clones_size_field, &filter);
        let (clones_size, elapsed) =
            self.timed(Collection::Clones, CLONES_SIZE_STAGE, query).await?;
        timings.insert(CLONES_SIZE_STAGE.to_string(), elapsed);

        debug!(?counts, clones_size, "Sample complete");

        let timings = self.config.record_timings.then_some(timings);
        Ok(Measurement { counts, clones_size, timings })
    }

    /// Turn a finished measurement into a snapshot stamped with the current time.
    pub fn stamp(&self, measurement: Measurement) -> Snapshot {
        let Measurement { counts, clones_size, timings } = measurement;
        Snapshot::new(self.next_timestamp(), counts, clones_size, timings)
    }

    /// Run one query under the configured timeout, returning its value and elapsed seconds.
    async fn timed<T>(
        &self,
        collection: Collection,
        stage: &str,
        query: impl Future<Output = Result<T>>,
    ) -> Result<(T, f64)> {
        let start = Instant::now();
        let value = tokio::time::timeout(self.config.query_timeout, query)
            .await
            .map_err(|_| MonitorError::SourceTimeout {
                collection: collection.to_string(),
                timeout: self.config.query_timeout,
            })??;

        let elapsed = start.elapsed().as_secs_f64();
        obs::record_query(stage, elapsed);
        Ok((value, elapsed))
    }

    /// Current time at millisecond precision, never earlier than a previously issued one.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let previous = self.last_timestamp_ms.fetch_max(now_ms, Ordering::SeqCst);
        let ms = previous.max(now_ms);

        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(now)
    }
}
