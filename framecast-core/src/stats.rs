//! Counters and periodic statistics for both ends.
//!
//! Counters only ever grow. Each service owns one stats struct and asks
//! it once per loop iteration whether a snapshot is due; snapshots are
//! emitted through `tracing` at `info`.

use std::time::{Duration, Instant};

use tracing::info;

use crate::fragment::FrameSendReport;

/// Default snapshot interval.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Per-frame summary cadence, in frames.
pub const FRAME_LOG_EVERY: u64 = 30;

// ── IntervalGate ─────────────────────────────────────────────────

/// Fires at most once per `interval` of wall-clock time.
#[derive(Debug, Clone)]
pub struct IntervalGate {
    interval: Duration,
    last: Instant,
}

impl IntervalGate {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    /// Returns `true` and re-arms when `interval` has passed since the
    /// last firing.
    pub fn ready_at(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }

    pub fn ready(&mut self) -> bool {
        self.ready_at(Instant::now())
    }
}

// ── ThroughputMeter ──────────────────────────────────────────────

/// Number of slots the window is divided into.
const METER_SLOTS: usize = 10;

/// Byte rate over a sliding window.
///
/// Bytes land in fixed-width time slots arranged as a ring; a slot is
/// cleared when the clock moves past it. The rate is always bytes still
/// in the ring divided by the full window, so one frame a second reads
/// as one frame's worth of bytes per second and a silent link decays
/// to zero.
pub struct ThroughputMeter {
    origin: Instant,
    slot_width: Duration,
    slots: [u64; METER_SLOTS],
    /// Absolute index of the newest slot.
    head: u64,
}

impl ThroughputMeter {
    /// A meter with a 1-second window.
    pub fn new() -> Self {
        Self::starting_at(Duration::from_secs(1), Instant::now())
    }

    pub fn starting_at(window: Duration, origin: Instant) -> Self {
        let slot_width = (window / METER_SLOTS as u32).max(Duration::from_micros(1));
        Self {
            origin,
            slot_width,
            slots: [0; METER_SLOTS],
            head: 0,
        }
    }

    pub fn window(&self) -> Duration {
        self.slot_width * METER_SLOTS as u32
    }

    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    pub fn record_at(&mut self, when: Instant, bytes: u64) {
        let slot = self.slot_of(when);
        self.advance(slot);
        // Late samples older than the window are dropped.
        if slot + METER_SLOTS as u64 > self.head {
            let i = (slot % METER_SLOTS as u64) as usize;
            self.slots[i] = self.slots[i].saturating_add(bytes);
        }
    }

    /// Bytes per second over the window ending at `now`.
    pub fn estimate_at(&mut self, now: Instant) -> u64 {
        self.advance(self.slot_of(now));
        let bytes: u64 = self.slots.iter().sum();
        (bytes as f64 / self.window().as_secs_f64()) as u64
    }

    pub fn estimate_bps(&mut self) -> u64 {
        self.estimate_at(Instant::now())
    }

    fn slot_of(&self, when: Instant) -> u64 {
        let since = when.saturating_duration_since(self.origin);
        (since.as_nanos() / self.slot_width.as_nanos()) as u64
    }

    /// Move the head to `slot`, clearing every slot it passes.
    fn advance(&mut self, slot: u64) {
        if slot <= self.head {
            return;
        }
        let passed = (slot - self.head).min(METER_SLOTS as u64);
        for step in 1..=passed {
            self.slots[((self.head + step) % METER_SLOTS as u64) as usize] = 0;
        }
        self.head = slot;
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

// ── SenderStats ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderCounters {
    pub frames_produced: u64,
    pub frames_sent: u64,
    /// Frames dropped because no receiver was associated.
    pub frames_withheld: u64,
    pub chunks_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub control_received: u64,
}

pub struct SenderStats {
    counters: SenderCounters,
    throughput: ThroughputMeter,
    gate: IntervalGate,
}

impl SenderStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            counters: SenderCounters::default(),
            throughput: ThroughputMeter::new(),
            gate: IntervalGate::new(interval),
        }
    }

    pub fn counters(&self) -> SenderCounters {
        self.counters
    }

    pub fn record_produced(&mut self) {
        self.counters.frames_produced += 1;
    }

    pub fn record_control(&mut self) {
        self.counters.control_received += 1;
    }

    pub fn record_frame(&mut self, report: &FrameSendReport) {
        let Some(frame_id) = report.frame_id else {
            self.counters.frames_withheld += 1;
            return;
        };
        self.counters.frames_sent += 1;
        self.counters.chunks_sent += report.chunks_sent as u64;
        self.counters.bytes_sent += report.bytes_sent as u64;
        self.counters.send_errors += report.send_errors as u64;
        self.throughput.record(report.bytes_sent as u64);

        if u64::from(frame_id) % FRAME_LOG_EVERY == 0 {
            info!(
                "sent frame {frame_id}: {} chunks, {} bytes",
                report.total_chunks, report.bytes_sent
            );
        }
    }

    /// Log a snapshot if the interval has elapsed.
    pub fn maybe_report(&mut self) -> Option<SenderCounters> {
        if !self.gate.ready() {
            return None;
        }
        let c = self.counters;
        let mbps = self.throughput.estimate_bps() as f64 / 1_000_000.0;
        info!(
            "stats: frames produced={} sent={} withheld={}, chunks={}, bytes={}, send errors={}, control={}, {:.2} MB/s",
            c.frames_produced,
            c.frames_sent,
            c.frames_withheld,
            c.chunks_sent,
            c.bytes_sent,
            c.send_errors,
            c.control_received,
            mbps
        );
        Some(c)
    }
}

// ── ReceiverStats ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverCounters {
    pub datagrams_received: u64,
    pub chunks_accepted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub frames_completed: u64,
    pub frames_displayed: u64,
    pub frames_abandoned: u64,
    pub bytes_received: u64,
}

pub struct ReceiverStats {
    counters: ReceiverCounters,
    throughput: ThroughputMeter,
    gate: IntervalGate,
}

impl ReceiverStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            counters: ReceiverCounters::default(),
            throughput: ThroughputMeter::new(),
            gate: IntervalGate::new(interval),
        }
    }

    pub fn counters(&self) -> ReceiverCounters {
        self.counters
    }

    pub fn record_datagram(&mut self, len: usize) {
        self.counters.datagrams_received += 1;
        self.counters.bytes_received += len as u64;
        self.throughput.record(len as u64);
    }

    pub fn record_accepted(&mut self) {
        self.counters.chunks_accepted += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.counters.duplicates += 1;
    }

    pub fn record_rejected(&mut self) {
        self.counters.rejected += 1;
    }

    pub fn record_completed(&mut self, frame_id: u32, total_chunks: u32) {
        self.counters.frames_completed += 1;
        if self.counters.frames_completed % FRAME_LOG_EVERY == 0 {
            info!("completed frame {frame_id} ({total_chunks} chunks)");
        }
    }

    pub fn record_displayed(&mut self) {
        self.counters.frames_displayed += 1;
    }

    /// Abandonment is tracked by the reassembler; mirror its total.
    pub fn set_abandoned(&mut self, total: u64) {
        self.counters.frames_abandoned = total;
    }

    pub fn maybe_report(&mut self) -> Option<ReceiverCounters> {
        if !self.gate.ready() {
            return None;
        }
        let c = self.counters;
        let mbps = self.throughput.estimate_bps() as f64 / 1_000_000.0;
        info!(
            "stats: frames completed={} displayed={} abandoned={}, chunks={} (dup {}, rejected {}), datagrams={}, {:.2} MB/s",
            c.frames_completed,
            c.frames_displayed,
            c.frames_abandoned,
            c.chunks_accepted,
            c.duplicates,
            c.rejected,
            c.datagrams_received,
            mbps
        );
        Some(c)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn silent_meter_reads_zero() {
        assert_eq!(ThroughputMeter::new().estimate_bps(), 0);
    }

    #[test]
    fn steady_rate_over_full_window() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::starting_at(Duration::from_secs(1), t0);
        for k in 0..=20 {
            meter.record_at(t0 + ms(k * 100), 1_000);
        }
        // Slots 11..=20 are inside the window ending at 2 s.
        assert_eq!(meter.estimate_at(t0 + ms(2_000)), 10_000);
    }

    #[test]
    fn one_frame_per_second_is_one_frame_of_bytes_per_second() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::starting_at(Duration::from_secs(1), t0);
        for k in 0..5 {
            meter.record_at(t0 + ms(k * 1_001), 921_600);
        }
        assert_eq!(meter.estimate_at(t0 + ms(4_004)), 921_600);
    }

    #[test]
    fn rate_decays_to_zero_when_traffic_stops() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::starting_at(Duration::from_secs(1), t0);
        meter.record_at(t0, 1_000_000);
        meter.record_at(t0 + ms(50), 1_000_000);
        assert_eq!(meter.estimate_at(t0 + ms(500)), 2_000_000);
        assert_eq!(meter.estimate_at(t0 + Duration::from_secs(10)), 0);
    }

    #[test]
    fn samples_older_than_window_are_ignored() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::starting_at(Duration::from_secs(1), t0);
        meter.record_at(t0 + ms(5_000), 100);
        meter.record_at(t0 + ms(1_000), 1_000_000);
        assert_eq!(meter.estimate_at(t0 + ms(5_000)), 100);
    }

    #[test]
    fn gate_fires_once_per_interval() {
        let t0 = Instant::now();
        let mut gate = IntervalGate::starting_at(Duration::from_secs(1), t0);
        assert!(!gate.ready_at(t0 + Duration::from_millis(999)));
        assert!(gate.ready_at(t0 + Duration::from_millis(1000)));
        assert!(!gate.ready_at(t0 + Duration::from_millis(1500)));
        assert!(gate.ready_at(t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn sender_counts_withheld_and_sent_frames() {
        let mut stats = SenderStats::new(Duration::from_secs(3600));
        stats.record_produced();
        stats.record_frame(&FrameSendReport::withheld());
        stats.record_produced();
        stats.record_frame(&FrameSendReport {
            frame_id: Some(1),
            total_chunks: 3,
            chunks_sent: 2,
            bytes_sent: 2000,
            send_errors: 1,
        });

        let c = stats.counters();
        assert_eq!(c.frames_produced, 2);
        assert_eq!(c.frames_withheld, 1);
        assert_eq!(c.frames_sent, 1);
        assert_eq!(c.chunks_sent, 2);
        assert_eq!(c.send_errors, 1);
        assert!(stats.maybe_report().is_none());
    }

    #[test]
    fn receiver_counters_accumulate() {
        let mut stats = ReceiverStats::new(Duration::ZERO);
        stats.record_datagram(100);
        stats.record_accepted();
        stats.record_datagram(100);
        stats.record_duplicate();
        stats.record_completed(1, 1);
        stats.record_displayed();
        stats.set_abandoned(2);

        let c = stats.maybe_report().unwrap();
        assert_eq!(c.datagrams_received, 2);
        assert_eq!(c.bytes_received, 200);
        assert_eq!(c.duplicates, 1);
        assert_eq!(c.frames_displayed, 1);
        assert_eq!(c.frames_abandoned, 2);
    }
}
