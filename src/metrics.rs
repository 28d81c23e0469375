//! Metrics Sink
//!
//! Counters and bounded rolling-sample series the core writes to. The sink
//! is owned by the session and mutated only from its hook calls; external
//! consumers read periodic [`StatsSnapshot`]s. How snapshots are rendered
//! (dashboards, feeds) is out of scope here.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;

/// How many samples a rolling series keeps.
pub const AVERAGE_CAPACITY: usize = 30;

/// Bounded rolling-sample series: pushing beyond capacity evicts the oldest.
#[derive(Debug, Clone, Default)]
pub struct RollingAverage {
    samples: VecDeque<f64>,
}

impl RollingAverage {
    /// Append a sample, evicting the oldest beyond [`AVERAGE_CAPACITY`].
    pub fn push(&mut self, value: f64) {
        if self.samples.len() == AVERAGE_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Mean of the retained samples, 0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Most recently pushed sample.
    pub fn last(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples have been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Process-wide stats, initialized once at startup.
#[derive(Debug)]
pub struct ServerStats {
    /// When the sink was created.
    pub started_at: Instant,
    /// Ticks executed.
    pub ticks: u64,
    /// Total messages sent.
    pub messages_sent: u64,
    /// Total messages received.
    pub messages_received: u64,
    /// Total bytes sent.
    pub bytes_sent: u64,
    /// Total bytes received.
    pub bytes_received: u64,
    /// Players currently connected.
    pub players_currently: u64,
    /// Total players admitted.
    pub players_joined: u64,
    /// Total players departed.
    pub players_left: u64,
    /// Total invalid messages.
    pub invalid_messages: u64,
    /// Total connections refused at capacity.
    pub players_rejected: u64,
    /// Time to process a tick (seconds).
    pub tick_times: RollingAverage,
    /// Messages sent per tick.
    pub tick_messages_sent: RollingAverage,
    /// Events drained per tick.
    pub tick_events_received: RollingAverage,
    /// Bytes sent per tick.
    pub tick_bytes_sent: RollingAverage,
    /// Bytes received per tick.
    pub tick_bytes_received: RollingAverage,
}

impl ServerStats {
    /// Fresh sink with all counters at zero.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            ticks: 0,
            messages_sent: 0,
            messages_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            players_currently: 0,
            players_joined: 0,
            players_left: 0,
            invalid_messages: 0,
            players_rejected: 0,
            tick_times: RollingAverage::default(),
            tick_messages_sent: RollingAverage::default(),
            tick_events_received: RollingAverage::default(),
            tick_bytes_sent: RollingAverage::default(),
            tick_bytes_received: RollingAverage::default(),
        }
    }

    /// Snapshot for external consumption.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            ticks: self.ticks,
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            players_currently: self.players_currently,
            players_joined: self.players_joined,
            players_left: self.players_left,
            invalid_messages: self.invalid_messages,
            players_rejected: self.players_rejected,
            avg_tick_time_secs: self.tick_times.average(),
            avg_tick_messages_sent: self.tick_messages_sent.average(),
            avg_tick_events_received: self.tick_events_received.average(),
            avg_tick_bytes_sent: self.tick_bytes_sent.average(),
            avg_tick_bytes_received: self.tick_bytes_received.average(),
        }
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the stats sink.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Seconds since the sink was created.
    pub uptime_secs: f64,
    /// Ticks executed.
    pub ticks: u64,
    /// Total messages sent.
    pub messages_sent: u64,
    /// Total messages received.
    pub messages_received: u64,
    /// Total bytes sent.
    pub bytes_sent: u64,
    /// Total bytes received.
    pub bytes_received: u64,
    /// Players currently connected.
    pub players_currently: u64,
    /// Total players admitted.
    pub players_joined: u64,
    /// Total players departed.
    pub players_left: u64,
    /// Total invalid messages.
    pub invalid_messages: u64,
    /// Total connections refused at capacity.
    pub players_rejected: u64,
    /// Average time to process a tick (seconds).
    pub avg_tick_time_secs: f64,
    /// Average messages sent per tick.
    pub avg_tick_messages_sent: f64,
    /// Average events drained per tick.
    pub avg_tick_events_received: f64,
    /// Average bytes sent per tick.
    pub avg_tick_bytes_sent: f64,
    /// Average bytes received per tick.
    pub avg_tick_bytes_received: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_average_evicts_oldest_beyond_capacity() {
        let mut series = RollingAverage::default();
        for i in 0..(AVERAGE_CAPACITY + 10) {
            series.push(i as f64);
        }
        assert_eq!(series.len(), AVERAGE_CAPACITY);
        assert_eq!(series.last(), Some((AVERAGE_CAPACITY + 9) as f64));
        // Oldest surviving sample is 10, newest is capacity+9.
        let expected = (10..AVERAGE_CAPACITY + 10).sum::<usize>() as f64 / AVERAGE_CAPACITY as f64;
        assert!((series.average() - expected).abs() < 1e-9);
    }

    #[test]
    fn empty_series_averages_to_zero() {
        let series = RollingAverage::default();
        assert_eq!(series.average(), 0.0);
        assert_eq!(series.last(), None);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let mut stats = ServerStats::new();
        stats.ticks = 42;
        stats.tick_times.push(0.002);
        let snapshot = stats.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"ticks\":42"));
        assert!(json.contains("avg_tick_time_secs"));
    }
}
