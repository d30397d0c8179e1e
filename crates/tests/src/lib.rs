//! # Integration Tests
//!
//! Cross-crate end-to-end tests.
//!
//! Covers:
//! - data model laws over every built-in measurement kind
//! - transport → source → vehicle → sinks flows without external services
//! - shutdown bounds with blocked sources and sinks

#[cfg(test)]
mod contract_tests {
    use chrono::Utc;
    use contracts::{
        Formatter, JsonFormatter, MeasurementError, MeasurementRegistry, RawMeasurement,
        RawRecord, RawValue,
    };

    #[test]
    fn test_range_classification_leaves_range_untouched() {
        let registry = MeasurementRegistry::standard();
        let now = Utc::now();
        for name in registry.names() {
            let kind = registry.kind(name).unwrap();
            let Some(range) = kind.valid_range() else {
                continue;
            };
            let span = range.maximum() - range.minimum();
            for (value, inside) in [
                (range.minimum(), true),
                (range.minimum() + span / 2.0, true),
                (range.maximum(), true),
                (range.minimum() - 1.0, false),
                (range.maximum() + 0.001, false),
            ] {
                let raw = RawRecord::Measurement(RawMeasurement::new(name, value));
                let m = registry.from_record(&raw, now).unwrap();
                assert_eq!(m.within_range(), Some(inside), "{name} = {value}");
                assert_eq!(m.valid_range(), Some(range));
            }
        }
    }

    #[test]
    fn test_unrecognized_names_fail() {
        let registry = MeasurementRegistry::standard();
        for name in ["", "warp_drive", "Vehicle_Speed", "vehicle_speed "] {
            let raw = RawRecord::Measurement(RawMeasurement::new(name, 1.0));
            assert_eq!(
                registry.from_record(&raw, Utc::now()),
                Err(MeasurementError::Unrecognized {
                    name: name.to_string()
                })
            );
        }
    }

    #[test]
    fn test_round_trip_every_kind() {
        let registry = MeasurementRegistry::standard();
        let now = Utc::now();
        for name in registry.names() {
            let kind = registry.kind(name).unwrap();
            let (value, event) = match (kind.valid_range(), kind.states()) {
                (Some(range), _) => (RawValue::Number(range.minimum()), None),
                (None, Some(states)) => (
                    RawValue::Text(states[states.len() - 1].clone()),
                    kind.is_evented().then(|| RawValue::Boolean(false)),
                ),
                (None, None) => (RawValue::Boolean(false), None),
            };
            let m = registry.create(name, &value, event, now).unwrap();
            let wire = JsonFormatter
                .serialize(&RawRecord::Measurement(m.to_record()))
                .unwrap();
            let back = registry
                .from_record(&JsonFormatter.deserialize(&wire).unwrap(), now)
                .unwrap();
            assert_eq!(back, m, "{name}");

            if kind.valid_range().is_some() {
                for x in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                    let raw = RawRecord::Measurement(RawMeasurement::new(name, x));
                    assert!(matches!(
                        registry.from_record(&raw, now),
                        Err(MeasurementError::NonFinite { .. })
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use contracts::{
        ContractError, DataSink, Measurement, MeasurementError, MeasurementRegistry,
        PipelineBlueprint, RawMeasurement, RawRecord, SinkConfig, SinkHandler, SinkType,
        SourceConfig, SourceType, Transport, TransportRead,
    };
    use dispatcher::{
        BatchPoster, Listener, QueueConfig, QueuedSink, RecorderConfig, RecorderSink,
        UploaderConfig, UploaderSink,
    };
    use ingestion::transports::{channel, TraceOptions, TraceTransport};
    use ingestion::{DataSource, SourceSettings, SourceState};
    use vehicle::{Vehicle, VehicleBuilder, VehicleError};

    async fn wait_for(what: &str, condition: impl Fn() -> bool) {
        for _ in 0..300 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {what}");
    }

    /// Counts requests and keeps the decoded bodies
    #[derive(Clone, Default)]
    struct CollectingPoster {
        bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    impl BatchPoster for CollectingPoster {
        fn endpoint(&self) -> &str {
            "memory://collector"
        }

        async fn post(&self, body: Vec<u8>) -> Result<(), ContractError> {
            let value = serde_json::from_slice(&body)
                .map_err(|e| ContractError::delivery("memory://collector", e.to_string()))?;
            self.bodies.lock().unwrap().push(value);
            Ok(())
        }
    }

    /// Consumer handler that fails every call
    struct BrokenHandler;

    impl SinkHandler for BrokenHandler {
        fn name(&self) -> &str {
            "broken"
        }

        async fn handle(&mut self, _: &Measurement) -> Result<(), ContractError> {
            Err(ContractError::sink_write("broken", "disk on fire"))
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Consumer handler that never finishes
    struct StuckHandler;

    impl SinkHandler for StuckHandler {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn handle(&mut self, _: &Measurement) -> Result<(), ContractError> {
            std::future::pending().await
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Producer-side sink that panics
    struct PanickingSink;

    impl DataSink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        fn receive(&self, _: &Measurement) -> Result<(), ContractError> {
            panic!("receive bug")
        }
    }

    /// Transport whose reads always wait out the full timeout
    struct SilentTransport;

    impl Transport for SilentTransport {
        fn name(&self) -> &str {
            "silent"
        }

        fn read(&mut self, timeout: Duration) -> Result<TransportRead, ContractError> {
            std::thread::sleep(timeout);
            Ok(TransportRead::Idle)
        }

        fn write(&mut self, data: &[u8]) -> Result<usize, ContractError> {
            Ok(data.len())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_steering_wheel_angle_pull() {
        let vehicle = Vehicle::new(MeasurementRegistry::standard());
        let (transport, sender) = channel("can0");
        vehicle
            .add_source(DataSource::new("can0", Box::new(transport)))
            .unwrap();

        sender
            .send_line(r#"{"name": "steering_wheel_angle", "value": 12.5}"#)
            .unwrap();
        wait_for("steering angle", || vehicle.get("steering_wheel_angle").is_some()).await;

        let angle = vehicle.get("steering_wheel_angle").unwrap();
        assert_eq!(angle.value().as_f64(), Some(12.5));
        assert_eq!(angle.within_range(), Some(true));
        vehicle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_listener_sees_source_order() {
        let vehicle = Vehicle::new(MeasurementRegistry::standard());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        let listener: Listener = Arc::new(move |m: &Measurement| {
            inner.lock().unwrap().push(m.value().as_f64().unwrap());
        });
        vehicle.listen("vehicle_speed", listener).unwrap();

        let (transport, sender) = channel("obd");
        vehicle
            .add_source(DataSource::new("obd", Box::new(transport)))
            .unwrap();
        let mut burst = String::new();
        for i in 0..200 {
            burst.push_str(&format!("{{\"name\": \"vehicle_speed\", \"value\": {i}}}\n"));
        }
        // split mid-frame to exercise the framer
        let (head, tail) = burst.split_at(burst.len() / 2 + 3);
        sender.send(head.as_bytes().to_vec()).unwrap();
        sender.send(tail.as_bytes().to_vec()).unwrap();

        wait_for("200 notifications", || seen.lock().unwrap().len() == 200).await;
        let expected: Vec<f64> = (0..200).map(f64::from).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
        vehicle.shutdown().await;
    }

    #[tokio::test]
    async fn test_uploader_batches_in_order() {
        let vehicle = Vehicle::new(MeasurementRegistry::standard());
        let poster = CollectingPoster::default();
        let bodies = Arc::clone(&poster.bodies);
        let uploader = UploaderSink::new(
            "uploader",
            UploaderConfig {
                batch_size: 10,
                flush_interval: Duration::from_secs(3600),
                ..UploaderConfig::new("memory://collector")
            },
            poster,
        );
        vehicle.add_sink(Arc::new(QueuedSink::spawn(uploader, QueueConfig::default())));

        for i in 0..25 {
            let raw = RawRecord::Measurement(RawMeasurement::new("odometer", f64::from(i)));
            vehicle.receive(&raw).unwrap();
        }
        vehicle.shutdown().await;

        let bodies = bodies.lock().unwrap();
        assert_eq!(bodies.len(), 3);
        let sizes: Vec<usize> = bodies.iter().map(|b| b.as_array().unwrap().len()).collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        let values: Vec<f64> = bodies
            .iter()
            .flat_map(|b| b.as_array().unwrap().iter())
            .map(|r| r["value"].as_f64().unwrap())
            .collect();
        let expected: Vec<f64> = (0..25).map(f64::from).collect();
        assert_eq!(values, expected);
    }

    #[tokio::test]
    async fn test_failing_sinks_do_not_affect_others() {
        let vehicle = Vehicle::new(MeasurementRegistry::standard());
        let dir = tempfile::tempdir().unwrap();
        let recorder = RecorderSink::new("recorder", RecorderConfig::new(dir.path()));

        vehicle.add_sink(Arc::new(PanickingSink));
        vehicle.add_sink(Arc::new(QueuedSink::spawn(BrokenHandler, QueueConfig::default())));
        let recorder = Arc::new(QueuedSink::spawn(recorder, QueueConfig::default()));
        vehicle.add_sink(recorder.clone());

        for value in [1.0, 2.0, 3.0] {
            let raw = RawRecord::Measurement(RawMeasurement::new("fuel_level", value));
            vehicle.receive(&raw).unwrap();
        }
        vehicle.shutdown().await;

        assert_eq!(recorder.metrics().processed(), 3);
        assert_eq!(vehicle.metrics().sink_failures, 3);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let path = files[0].as_ref().unwrap().path();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_while_read_blocked() {
        let source = DataSource::with_settings(
            "silent",
            Box::new(SilentTransport),
            Arc::new(contracts::JsonFormatter),
            SourceSettings {
                read_timeout: Duration::from_millis(50),
                ..SourceSettings::default()
            },
        );
        let delivered = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&delivered);
        source
            .start(Arc::new(move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        let started = Instant::now();
        tokio::task::spawn_blocking(move || {
            source.stop();
            assert_eq!(source.state(), SourceState::Stopped);
        })
        .await
        .unwrap();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_bounded_by_stuck_sink() {
        let vehicle = Vehicle::new(MeasurementRegistry::standard());
        vehicle.add_sink(Arc::new(QueuedSink::spawn(
            StuckHandler,
            QueueConfig {
                capacity: Some(4),
                drain_timeout: Duration::from_millis(100),
            },
        )));
        for i in 0..10 {
            let raw = RawRecord::Measurement(RawMeasurement::new("engine_speed", f64::from(i)));
            vehicle.receive(&raw).unwrap();
        }

        let started = Instant::now();
        vehicle.shutdown().await;
        assert!(started.elapsed() < Duration::from_secs(2));
        // queue of 4 filled, the rest dropped and reported
        assert_eq!(vehicle.metrics().sink_failures, 6);
    }

    #[tokio::test]
    async fn test_invalid_state_keeps_prior_value() {
        let vehicle = Vehicle::new(MeasurementRegistry::standard());
        let gear = |state: &str| {
            RawRecord::Measurement(RawMeasurement::new("transmission_gear_position", state))
        };
        vehicle.receive(&gear("second")).unwrap();

        let err = vehicle.receive(&gear("ninth")).unwrap_err();
        assert!(matches!(
            err,
            VehicleError::Measurement(MeasurementError::InvalidState { .. })
        ));
        assert_eq!(
            vehicle
                .get("transmission_gear_position")
                .unwrap()
                .value()
                .as_state(),
            Some("second")
        );
        vehicle.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_trace_replay_into_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let trace_path = dir.path().join("drive.json");
        let mut trace = std::fs::File::create(&trace_path).unwrap();
        writeln!(trace, r#"{{"name": "vehicle_speed", "value": 10.0, "timestamp": 100.0}}"#).unwrap();
        writeln!(trace, r#"{{"name": "door_status", "value": "driver", "event": true, "timestamp": 100.1}}"#).unwrap();
        writeln!(trace, r#"{{"bus": 1, "id": 1234, "data": "0x1234"}}"#).unwrap();
        writeln!(trace, r#"{{"name": "vehicle_speed", "value": 12.0, "timestamp": 100.2}}"#).unwrap();
        drop(trace);

        let out_dir = dir.path().join("recordings");
        let vehicle = Vehicle::new(MeasurementRegistry::standard());
        let recorder = QueuedSink::spawn(
            RecorderSink::new("recorder", RecorderConfig::new(&out_dir)),
            QueueConfig::default(),
        );
        vehicle.add_sink(Arc::new(recorder));

        let transport = TraceTransport::open(
            &trace_path,
            TraceOptions {
                realtime: false,
                speed: 1.0,
                loop_playback: false,
            },
        )
        .unwrap();
        vehicle
            .add_source(DataSource::new("trace", Box::new(transport)))
            .unwrap();

        wait_for("trace end", || vehicle.active_sources() == 0).await;
        vehicle.shutdown().await;

        let metrics = vehicle.metrics();
        assert_eq!(metrics.records_received, 4);
        assert_eq!(metrics.translation_errors, 1);
        assert_eq!(
            vehicle.get("vehicle_speed").unwrap().value().as_f64(),
            Some(12.0)
        );

        let file = std::fs::read_dir(&out_dir).unwrap().next().unwrap().unwrap();
        let lines: Vec<serde_json::Value> = std::fs::read_to_string(file.path())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["name"], "door_status");
        assert_eq!(lines[1]["event"], true);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blueprint_to_running_vehicle() {
        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            r#"
            [vehicle]
            range_policy = "drop"

            [[measurements]]
            name = "battery_voltage"
            class = "numeric"
            minimum = 0.0
            maximum = 16.0

            [[sources]]
            id = "sim"
            source_type = "simulated"
            read_timeout_ms = 20
            params = {{ frequency_hz = "50", seed = "7" }}

            [[sinks]]
            name = "recorder"
            sink_type = "recorder"
            queue_capacity = 1000
            params = {{ directory = "{}" }}

            [[sinks]]
            name = "console"
            sink_type = "log"
            "#,
            dir.path().display()
        );
        let blueprint: PipelineBlueprint =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();

        let vehicle = VehicleBuilder::from_blueprint(&blueprint)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(vehicle.sink_names(), vec!["notifier", "recorder", "console"]);
        assert!(vehicle.registry().contains("battery_voltage"));

        wait_for("simulated speed", || vehicle.get("vehicle_speed").is_some()).await;
        vehicle.shutdown().await;

        let metrics = vehicle.metrics();
        assert!(metrics.measurements_dispatched > 0);
        assert_eq!(metrics.translation_errors, 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_programmatic_blueprint_validation() {
        let blueprint = PipelineBlueprint {
            sources: vec![SourceConfig {
                id: "tcp".to_string(),
                source_type: SourceType::Network,
                read_timeout_ms: 100,
                max_frame_len: 4096,
                params: HashMap::from([("host".to_string(), "127.0.0.1".to_string())]),
            }],
            sinks: vec![SinkConfig {
                name: "log".to_string(),
                sink_type: SinkType::Log,
                queue_capacity: Some(10),
                drain_timeout_ms: 100,
                params: HashMap::new(),
            }],
            ..PipelineBlueprint::default()
        };
        config_loader::ConfigLoader::validate(&blueprint).unwrap();

        let mut missing_host = blueprint.clone();
        missing_host.sources[0].params.clear();
        assert!(config_loader::ConfigLoader::validate(&missing_host).is_err());
    }
}
