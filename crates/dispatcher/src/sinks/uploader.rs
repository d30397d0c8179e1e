//! UploaderSink - batched HTTP POST of serialized records
//!
//! Records accumulate into a batch. Full batches (and, on the flush tick, any
//! partial batch) move to a bounded delivery queue. Delivery always starts at
//! the oldest pending batch; a failed batch stays in front until it succeeds
//! or runs out of attempts.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use contracts::{ContractError, Measurement, RawRecord, SinkHandler};
use observability::metrics as obs;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument, warn};

/// Posts one JSON array body to the remote collector
#[trait_variant::make(BatchPoster: Send)]
pub trait LocalBatchPoster {
    /// Target used in logs and errors
    fn endpoint(&self) -> &str;

    /// Send one batch
    ///
    /// # Errors
    /// [`ContractError::Delivery`] on transport failure or a 4xx/5xx status.
    async fn post(&self, body: Vec<u8>) -> Result<(), ContractError>;
}

/// reqwest-backed poster
pub struct HttpPoster {
    client: reqwest::Client,
    url: String,
}

impl HttpPoster {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, ContractError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ContractError::SinkConnection {
                sink_name: url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

impl BatchPoster for HttpPoster {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn post(&self, body: Vec<u8>) -> Result<(), ContractError> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ContractError::delivery(&self.url, e.to_string()))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ContractError::delivery(
                &self.url,
                format!("received {status}"),
            ));
        }
        debug!(endpoint = %self.url, status = status.as_u16(), "Batch accepted");
        Ok(())
    }
}

/// Configuration for UploaderSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploaderConfig {
    /// Collector URL
    pub url: String,
    /// Records per batch
    pub batch_size: usize,
    /// Partial batches are sent after this long
    pub flush_interval: Duration,
    /// Upper bound of one POST
    pub request_timeout: Duration,
    /// Attempts before a batch is given up
    pub max_attempts: u32,
    /// Batches kept while the collector is unreachable
    pub max_pending_batches: usize,
}

impl UploaderConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            batch_size: 25,
            flush_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
            max_attempts: 3,
            max_pending_batches: 64,
        }
    }

    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let url = params
            .get("url")
            .ok_or_else(|| "missing 'url' parameter".to_string())?;
        let mut config = Self::new(url);

        fn parse<T: std::str::FromStr>(
            params: &HashMap<String, String>,
            key: &str,
        ) -> Result<Option<T>, String> {
            params
                .get(key)
                .map(|raw| raw.parse().map_err(|_| format!("invalid {key} '{raw}'")))
                .transpose()
        }

        if let Some(n) = parse::<usize>(params, "batch_size")? {
            config.batch_size = n.max(1);
        }
        if let Some(ms) = parse::<u64>(params, "flush_interval_ms")? {
            config.flush_interval = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = parse::<u64>(params, "request_timeout_ms")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse::<u32>(params, "max_attempts")? {
            config.max_attempts = n.max(1);
        }
        if let Some(n) = parse::<usize>(params, "max_pending_batches")? {
            config.max_pending_batches = n.max(1);
        }
        Ok(config)
    }
}

struct PendingBatch {
    records: Vec<RawRecord>,
    attempts: u32,
}

/// Sink that uploads measurements in batches
pub struct UploaderSink<P> {
    name: String,
    config: UploaderConfig,
    poster: P,
    batch: Vec<RawRecord>,
    pending: VecDeque<PendingBatch>,
}

impl UploaderSink<HttpPoster> {
    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = UploaderConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks[{name}].params"), e))?;
        let poster = HttpPoster::new(&config.url, config.request_timeout)?;
        Ok(Self::new(name, config, poster))
    }
}

impl<P: BatchPoster> UploaderSink<P> {
    pub fn new(name: impl Into<String>, config: UploaderConfig, poster: P) -> Self {
        Self {
            name: name.into(),
            batch: Vec::with_capacity(config.batch_size),
            config,
            poster,
            pending: VecDeque::new(),
        }
    }

    /// Batches waiting for delivery
    pub fn pending_batches(&self) -> usize {
        self.pending.len()
    }

    /// Records not yet in a batch
    pub fn buffered_records(&self) -> usize {
        self.batch.len()
    }

    fn seal_batch(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        if self.pending.len() >= self.config.max_pending_batches {
            if let Some(oldest) = self.pending.pop_front() {
                obs::record_upload(&self.name, "dropped", oldest.records.len());
                warn!(
                    sink = %self.name,
                    records = oldest.records.len(),
                    max_pending = self.config.max_pending_batches,
                    "Delivery queue full, oldest batch dropped"
                );
            }
        }
        let records = std::mem::replace(
            &mut self.batch,
            Vec::with_capacity(self.config.batch_size),
        );
        self.pending.push_back(PendingBatch {
            records,
            attempts: 0,
        });
    }

    /// Deliver pending batches oldest first; stop at the first failure
    async fn deliver(&mut self) -> Result<(), ContractError> {
        while let Some(front) = self.pending.front_mut() {
            let records = front.records.len();
            let body = serde_json::to_vec(&front.records)
                .map_err(|e| ContractError::format(e.to_string()))?;

            let started = Instant::now();
            let outcome =
                match tokio::time::timeout(self.config.request_timeout, self.poster.post(body))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ContractError::delivery(
                        self.poster.endpoint(),
                        format!("timed out after {:?}", self.config.request_timeout),
                    )),
                };
            obs::record_upload_latency_ms(&self.name, started.elapsed().as_secs_f64() * 1000.0);

            match outcome {
                Ok(()) => {
                    obs::record_upload(&self.name, "ok", records);
                    debug!(sink = %self.name, records, "Uploaded batch");
                    self.pending.pop_front();
                }
                Err(e) => {
                    front.attempts += 1;
                    if front.attempts >= self.config.max_attempts {
                        obs::record_upload(&self.name, "dropped", records);
                        warn!(
                            sink = %self.name,
                            records,
                            attempts = front.attempts,
                            error = %e,
                            "Unable to upload batch, giving up"
                        );
                        self.pending.pop_front();
                    } else {
                        obs::record_upload(&self.name, "failed", records);
                        warn!(
                            sink = %self.name,
                            records,
                            attempts = front.attempts,
                            error = %e,
                            "Unable to upload batch, will retry"
                        );
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl<P: BatchPoster + 'static> SinkHandler for UploaderSink<P> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "uploader_sink_handle",
        skip(self, measurement),
        fields(sink = %self.name, measurement = measurement.name())
    )]
    async fn handle(&mut self, measurement: &Measurement) -> Result<(), ContractError> {
        self.batch
            .push(RawRecord::Measurement(measurement.to_record()));
        if self.batch.len() < self.config.batch_size {
            return Ok(());
        }
        self.seal_batch();
        // the record is accepted; `deliver` reports its own failures
        if self.deliver().await.is_err() {
            debug!(sink = %self.name, pending = self.pending.len(), "Delivery deferred");
        }
        Ok(())
    }

    #[instrument(name = "uploader_sink_flush", skip(self), fields(sink = %self.name))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.seal_batch();
        self.deliver().await
    }

    #[instrument(name = "uploader_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let undelivered: usize = self.pending.drain(..).map(|b| b.records.len()).sum();
        if undelivered > 0 {
            obs::record_upload(&self.name, "dropped", undelivered);
            warn!(sink = %self.name, records = undelivered, "Undelivered records discarded on close");
        }
        info!(sink = %self.name, "UploaderSink closed");
        Ok(())
    }

    fn flush_interval(&self) -> Option<Duration> {
        Some(self.config.flush_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queued::{QueueConfig, QueuedSink};
    use chrono::Utc;
    use contracts::{MeasurementRegistry, RawValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records request bodies; fails the first `failures` posts
    #[derive(Default)]
    struct MockPoster {
        bodies: Arc<Mutex<Vec<serde_json::Value>>>,
        failures: AtomicUsize,
        delay: Option<Duration>,
    }

    impl BatchPoster for MockPoster {
        fn endpoint(&self) -> &str {
            "mock://collector"
        }

        async fn post(&self, body: Vec<u8>) -> Result<(), ContractError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(ContractError::delivery("mock://collector", "503"));
            }
            let value = serde_json::from_slice(&body).unwrap();
            self.bodies.lock().unwrap().push(value);
            Ok(())
        }
    }

    fn config(batch_size: usize) -> UploaderConfig {
        UploaderConfig {
            batch_size,
            flush_interval: Duration::from_secs(60),
            request_timeout: Duration::from_millis(200),
            ..UploaderConfig::new("mock://collector")
        }
    }

    fn speed(value: f64) -> Measurement {
        MeasurementRegistry::standard()
            .create("vehicle_speed", &RawValue::Number(value), None, Utc::now())
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_batches_upload_immediately() {
        let poster = MockPoster::default();
        let bodies = Arc::clone(&poster.bodies);
        let mut sink = UploaderSink::new("uploader", config(10), poster);

        for i in 0..25 {
            sink.handle(&speed(i as f64)).await.unwrap();
        }
        assert_eq!(bodies.lock().unwrap().len(), 2);
        assert_eq!(sink.buffered_records(), 5);

        sink.flush().await.unwrap();
        let bodies = bodies.lock().unwrap();
        let sizes: Vec<_> = bodies.iter().map(|b| b.as_array().unwrap().len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(bodies[0][0]["name"], "vehicle_speed");
        assert_eq!(bodies[2][4]["value"], 24.0);
    }

    #[tokio::test]
    async fn test_failed_batch_is_retried_first() {
        let poster = MockPoster {
            failures: AtomicUsize::new(1),
            ..MockPoster::default()
        };
        let bodies = Arc::clone(&poster.bodies);
        let mut sink = UploaderSink::new("uploader", config(2), poster);

        sink.handle(&speed(1.0)).await.unwrap();
        sink.handle(&speed(2.0)).await.unwrap();
        assert_eq!(sink.pending_batches(), 1);

        sink.handle(&speed(3.0)).await.unwrap();
        sink.handle(&speed(4.0)).await.unwrap();
        assert_eq!(sink.pending_batches(), 0);

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0][0]["value"], 1.0);
        assert_eq!(bodies[1][0]["value"], 3.0);
    }

    #[tokio::test]
    async fn test_batch_dropped_after_max_attempts() {
        let poster = MockPoster {
            failures: AtomicUsize::new(usize::MAX),
            ..MockPoster::default()
        };
        let mut sink = UploaderSink::new(
            "uploader",
            UploaderConfig {
                max_attempts: 2,
                ..config(1)
            },
            poster,
        );

        sink.handle(&speed(1.0)).await.unwrap();
        assert_eq!(sink.pending_batches(), 1);
        assert!(sink.flush().await.is_err());
        assert_eq!(sink.pending_batches(), 0);
    }

    #[tokio::test]
    async fn test_pending_queue_is_bounded() {
        let poster = MockPoster {
            failures: AtomicUsize::new(usize::MAX),
            ..MockPoster::default()
        };
        let mut sink = UploaderSink::new(
            "uploader",
            UploaderConfig {
                max_attempts: 100,
                max_pending_batches: 3,
                ..config(1)
            },
            poster,
        );

        for i in 0..10 {
            sink.handle(&speed(i as f64)).await.unwrap();
        }
        assert_eq!(sink.pending_batches(), 3);
        sink.close().await.unwrap();
        assert_eq!(sink.pending_batches(), 0);
    }

    #[tokio::test]
    async fn test_slow_collector_counts_as_failure() {
        let poster = MockPoster {
            delay: Some(Duration::from_secs(5)),
            ..MockPoster::default()
        };
        let mut sink = UploaderSink::new("uploader", config(1), poster);

        let started = Instant::now();
        sink.handle(&speed(1.0)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(sink.pending_batches(), 1);

        let err = sink.flush().await.unwrap_err();
        assert!(matches!(err, ContractError::Delivery { .. }));
        assert_eq!(sink.pending_batches(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_collector_still_counts_processed() {
        let poster = MockPoster {
            failures: AtomicUsize::new(usize::MAX),
            ..MockPoster::default()
        };
        let sink = QueuedSink::spawn(
            UploaderSink::new("uploader", config(1), poster),
            QueueConfig::default(),
        );
        for i in 0..3 {
            sink.enqueue(speed(i as f64)).unwrap();
        }
        sink.shutdown().await;

        let metrics = sink.metrics().snapshot();
        assert_eq!(metrics.processed, 3);
        // only the final flush on shutdown reports the outstanding batch
        assert_eq!(metrics.failures, 1);
    }

    #[test]
    fn test_config_from_params() {
        let params = HashMap::from([
            ("url".to_string(), "https://collector.local/records".to_string()),
            ("batch_size".to_string(), "10".to_string()),
            ("request_timeout_ms".to_string(), "1500".to_string()),
        ]);
        let config = UploaderConfig::from_params(&params).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_attempts, 3);

        let mut bad = params.clone();
        bad.insert("batch_size".to_string(), "ten".to_string());
        assert!(UploaderConfig::from_params(&bad).is_err());
        assert!(UploaderConfig::from_params(&HashMap::new()).is_err());
    }
}
