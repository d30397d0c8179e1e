//! Trace transport - replays a recorded JSON-lines trace file
//!
//! With `realtime` set, each line is released when its `timestamp` is due
//! relative to the first timestamp of the pass, scaled by `speed`. Waits never
//! exceed the read timeout, so the owning source stays responsive to `stop`.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{ContractError, Transport, TransportRead};
use serde::Deserialize;
use tracing::{debug, info};

/// Replay options
#[derive(Debug, Clone)]
pub struct TraceOptions {
    /// Pace lines by their timestamps
    pub realtime: bool,

    /// Playback speed multiplier (1.0 = recorded speed)
    pub speed: f64,

    /// Restart from the top at end of file
    pub loop_playback: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            realtime: true,
            speed: 1.0,
            loop_playback: true,
        }
    }
}

#[derive(Deserialize)]
struct Stamp {
    timestamp: Option<f64>,
}

pub struct TraceTransport {
    name: String,
    path: PathBuf,
    options: TraceOptions,
    reader: BufReader<File>,
    pass_started: Instant,
    first_timestamp: Option<f64>,
    lines_this_pass: u64,
    /// Line read ahead of its due time
    pending: Option<(Bytes, Instant)>,
}

impl TraceTransport {
    /// Open a trace file
    ///
    /// # Errors
    /// `DataSource` if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, options: TraceOptions) -> Result<Self, ContractError> {
        let path = path.as_ref().to_path_buf();
        let reader = Self::open_reader(&path)?;
        debug!(path = %path.display(), "opened trace file");
        Ok(Self {
            name: format!("trace:{}", path.display()),
            path,
            options: TraceOptions {
                speed: if options.speed > 0.0 { options.speed } else { 1.0 },
                ..options
            },
            reader,
            pass_started: Instant::now(),
            first_timestamp: None,
            lines_this_pass: 0,
            pending: None,
        })
    }

    fn open_reader(path: &Path) -> Result<BufReader<File>, ContractError> {
        File::open(path).map(BufReader::new).map_err(|e| {
            ContractError::data_source(
                path.display().to_string(),
                format!("unable to open trace file: {e}"),
            )
        })
    }

    fn rewind(&mut self) -> Result<(), ContractError> {
        self.reader = Self::open_reader(&self.path)?;
        self.pass_started = Instant::now();
        self.first_timestamp = None;
        self.lines_this_pass = 0;
        Ok(())
    }

    /// Next non-empty line with its trailing newline, or None at end of file
    fn next_line(&mut self) -> Result<Option<Vec<u8>>, ContractError> {
        loop {
            let mut line = Vec::new();
            let n = self
                .reader
                .read_until(b'\n', &mut line)
                .map_err(|e| ContractError::data_source(&self.name, e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if line.last() != Some(&b'\n') {
                line.push(b'\n');
            }
            return Ok(Some(line));
        }
    }

    /// When a line should be released
    ///
    /// # Errors
    /// `DataSource` when the scaled gap to the first timestamp is too large
    /// to schedule.
    fn due_time(&mut self, line: &[u8]) -> Result<Instant, ContractError> {
        if !self.options.realtime {
            return Ok(self.pass_started);
        }
        let Some(timestamp) = serde_json::from_slice::<Stamp>(line)
            .ok()
            .and_then(|stamp| stamp.timestamp)
        else {
            return Ok(self.pass_started);
        };
        let first = *self.first_timestamp.get_or_insert(timestamp);
        let offset = ((timestamp - first) / self.options.speed).max(0.0);
        Duration::try_from_secs_f64(offset)
            .ok()
            .and_then(|offset| self.pass_started.checked_add(offset))
            .ok_or_else(|| {
                ContractError::data_source(
                    &self.name,
                    format!("timestamp {timestamp} is {offset}s after the first line"),
                )
            })
    }

    /// Release `line` if due, otherwise wait up to `timeout` for it
    fn release(&mut self, line: Bytes, due: Instant, timeout: Duration) -> TransportRead {
        let now = Instant::now();
        if due > now {
            let wait = due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                self.pending = Some((line, due));
                return TransportRead::Idle;
            }
            std::thread::sleep(wait);
        }
        TransportRead::Data(line)
    }
}

impl Transport for TraceTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, timeout: Duration) -> Result<TransportRead, ContractError> {
        if let Some((line, due)) = self.pending.take() {
            return Ok(self.release(line, due, timeout));
        }

        let line = match self.next_line()? {
            Some(line) => line,
            None if self.options.loop_playback && self.lines_this_pass > 0 => {
                debug!(path = %self.path.display(), "looping trace");
                self.rewind()?;
                match self.next_line()? {
                    Some(line) => line,
                    None => return Ok(TransportRead::Closed),
                }
            }
            None => {
                info!(path = %self.path.display(), lines = self.lines_this_pass, "trace completed");
                return Ok(TransportRead::Closed);
            }
        };

        self.lines_this_pass += 1;
        let due = self.due_time(&line)?;
        Ok(self.release(Bytes::from(line), due, timeout))
    }

    fn write(&mut self, _data: &[u8]) -> Result<usize, ContractError> {
        Err(ContractError::data_source(
            &self.name,
            "trace transport is read-only",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn trace_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn drain(transport: &mut TraceTransport, limit: usize) -> Vec<TransportRead> {
        let mut reads = Vec::new();
        for _ in 0..limit {
            let read = transport.read(Duration::from_millis(50)).unwrap();
            let closed = read == TransportRead::Closed;
            if read != TransportRead::Idle {
                reads.push(read);
            }
            if closed {
                break;
            }
        }
        reads
    }

    #[test]
    fn test_missing_file_is_data_source_error() {
        let result = TraceTransport::open("/nonexistent/drive.json", TraceOptions::default());
        assert!(matches!(result, Err(ContractError::DataSource { .. })));
    }

    #[test]
    fn test_fast_replay_then_closed() {
        let file = trace_file(&[
            r#"{"name": "vehicle_speed", "value": 10, "timestamp": 1000.0}"#,
            "",
            r#"{"name": "vehicle_speed", "value": 11, "timestamp": 1500.0}"#,
        ]);
        let options = TraceOptions {
            realtime: false,
            loop_playback: false,
            ..Default::default()
        };
        let mut transport = TraceTransport::open(file.path(), options).unwrap();

        let started = Instant::now();
        let reads = drain(&mut transport, 10);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(reads.len(), 3);
        assert_eq!(reads[2], TransportRead::Closed);
    }

    #[test]
    fn test_realtime_paces_lines() {
        let file = trace_file(&[
            r#"{"name": "engine_speed", "value": 800, "timestamp": 10.0}"#,
            r#"{"name": "engine_speed", "value": 900, "timestamp": 10.2}"#,
        ]);
        let options = TraceOptions {
            realtime: true,
            speed: 1.0,
            loop_playback: false,
        };
        let mut transport = TraceTransport::open(file.path(), options).unwrap();

        let started = Instant::now();
        let reads = drain(&mut transport, 20);
        assert_eq!(reads.len(), 3);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_unschedulable_gap_is_data_source_error() {
        let file = trace_file(&[
            r#"{"name": "odometer", "value": 1.0, "timestamp": 0.0}"#,
            r#"{"name": "odometer", "value": 2.0, "timestamp": 1e20}"#,
        ]);
        let mut transport = TraceTransport::open(file.path(), TraceOptions::default()).unwrap();

        assert!(matches!(
            transport.read(Duration::from_millis(10)).unwrap(),
            TransportRead::Data(_)
        ));
        assert!(matches!(
            transport.read(Duration::from_millis(10)),
            Err(ContractError::DataSource { .. })
        ));
    }

    #[test]
    fn test_loop_restarts_from_top() {
        let file = trace_file(&[r#"{"name": "fuel_level", "value": 40}"#]);
        let options = TraceOptions {
            realtime: false,
            loop_playback: true,
            ..Default::default()
        };
        let mut transport = TraceTransport::open(file.path(), options).unwrap();

        for _ in 0..3 {
            assert!(matches!(
                transport.read(Duration::from_millis(10)).unwrap(),
                TransportRead::Data(_)
            ));
        }
        assert!(transport.write(b"{}").is_err());
    }

    #[test]
    fn test_empty_looping_trace_closes() {
        let file = trace_file(&[]);
        let mut transport = TraceTransport::open(file.path(), TraceOptions::default()).unwrap();
        assert_eq!(
            transport.read(Duration::from_millis(10)).unwrap(),
            TransportRead::Closed
        );
    }
}
