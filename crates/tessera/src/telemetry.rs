//! Per-call stage tracking and timing.
//!
//! Each forward call walks `Idle → TransferIn → Encode → Decode → TransferOut
//! → Idle`, skipping the transfer stages when residency already matches. The
//! current [`Stage`] is always tracked. Timestamps are only taken when
//! something is listening: the built-in timing recorder, the tracing sink, or
//! a caller-supplied [`TelemetrySink`].

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a layer is within a forward call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Stage {
    #[default]
    Idle,
    TransferIn,
    Encode,
    Decode,
    TransferOut,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::TransferIn => "transfer_in",
            Stage::Encode => "encode",
            Stage::Decode => "decode",
            Stage::TransferOut => "transfer_out",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observer of stage transitions. Must not affect the computation.
pub trait TelemetrySink: Send {
    fn on_transition(&mut self, from: Stage, to: Stage, at: Instant);
}

/// Built-in telemetry behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryMode {
    /// Record [`CallTimings`] for every successful call.
    #[default]
    Timings,
    /// Emit a `tracing` debug event per stage.
    Tracing,
}

/// Telemetry settings of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mode: TelemetryMode,
}

impl TelemetryConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn timings() -> Self {
        TelemetryConfig {
            enabled: true,
            mode: TelemetryMode::Timings,
        }
    }

    pub fn tracing() -> Self {
        TelemetryConfig {
            enabled: true,
            mode: TelemetryMode::Tracing,
        }
    }
}

/// Time spent in each stage of one successful call.
///
/// Skipped transfer stages read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallTimings {
    pub transfer_in: Duration,
    pub encode: Duration,
    pub decode: Duration,
    pub transfer_out: Duration,
    pub total: Duration,
}

impl CallTimings {
    fn slot(&mut self, stage: Stage) -> Option<&mut Duration> {
        match stage {
            Stage::Idle => None,
            Stage::TransferIn => Some(&mut self.transfer_in),
            Stage::Encode => Some(&mut self.encode),
            Stage::Decode => Some(&mut self.decode),
            Stage::TransferOut => Some(&mut self.transfer_out),
        }
    }

    /// Mean of each field over `timings`.
    pub fn mean(timings: &[CallTimings]) -> CallTimings {
        if timings.is_empty() {
            return CallTimings::default();
        }
        let n = timings.len() as u32;
        let sum = timings.iter().fold(CallTimings::default(), |acc, t| CallTimings {
            transfer_in: acc.transfer_in + t.transfer_in,
            encode: acc.encode + t.encode,
            decode: acc.decode + t.decode,
            transfer_out: acc.transfer_out + t.transfer_out,
            total: acc.total + t.total,
        });
        CallTimings {
            transfer_in: sum.transfer_in / n,
            encode: sum.encode / n,
            decode: sum.decode / n,
            transfer_out: sum.transfer_out / n,
            total: sum.total / n,
        }
    }
}

/// Accumulates stage durations for the call in progress.
#[derive(Debug, Default)]
struct StageTimer {
    call_start: Option<Instant>,
    entered: Option<Instant>,
    current: CallTimings,
    completed: Option<CallTimings>,
}

impl StageTimer {
    fn on_transition(&mut self, from: Stage, to: Stage, at: Instant) {
        if let (Some(entered), Some(slot)) = (self.entered, self.current.slot(from)) {
            *slot += at.saturating_duration_since(entered);
        }
        if from == Stage::Idle {
            self.call_start = Some(at);
            self.current = CallTimings::default();
        }
        if to == Stage::Idle {
            if let Some(start) = self.call_start.take() {
                self.current.total = at.saturating_duration_since(start);
                self.completed = Some(self.current);
            }
            self.entered = None;
        } else {
            self.entered = Some(at);
        }
    }
}

/// Logs stage durations through `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink {
    entered: Option<Instant>,
    call_start: Option<Instant>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetrySink for TracingSink {
    fn on_transition(&mut self, from: Stage, to: Stage, at: Instant) {
        if from == Stage::Idle {
            self.call_start = Some(at);
        } else if let Some(entered) = self.entered {
            debug!(
                stage = from.name(),
                elapsed_us = at.saturating_duration_since(entered).as_micros() as u64,
                "stage finished"
            );
        }
        if to == Stage::Idle {
            if let Some(start) = self.call_start.take() {
                debug!(
                    elapsed_us = at.saturating_duration_since(start).as_micros() as u64,
                    "forward finished"
                );
            }
            self.entered = None;
        } else {
            self.entered = Some(at);
        }
    }
}

/// Stage state plus whatever is observing it.
pub struct Telemetry {
    state: Stage,
    timer: Option<StageTimer>,
    sinks: Vec<Box<dyn TelemetrySink>>,
    history: Vec<CallTimings>,
}

impl Telemetry {
    pub fn new(config: TelemetryConfig) -> Self {
        let mut telemetry = Telemetry {
            state: Stage::Idle,
            timer: None,
            sinks: Vec::new(),
            history: Vec::new(),
        };
        if config.enabled {
            match config.mode {
                TelemetryMode::Timings => telemetry.timer = Some(StageTimer::default()),
                TelemetryMode::Tracing => telemetry.sinks.push(Box::new(TracingSink::new())),
            }
        }
        telemetry
    }

    /// Attach another observer.
    pub fn add_sink(&mut self, sink: Box<dyn TelemetrySink>) {
        self.sinks.push(sink);
    }

    pub fn state(&self) -> Stage {
        self.state
    }

    /// Whether transitions are timestamped.
    pub fn is_observed(&self) -> bool {
        self.timer.is_some() || !self.sinks.is_empty()
    }

    /// Move to `to`, notifying observers.
    pub fn transition(&mut self, to: Stage) {
        let from = self.state;
        self.state = to;
        if !self.is_observed() {
            return;
        }
        let at = Instant::now();
        if let Some(timer) = &mut self.timer {
            timer.on_transition(from, to, at);
        }
        for sink in &mut self.sinks {
            sink.on_transition(from, to, at);
        }
    }

    /// End a successful call, keeping its timings.
    pub fn finish(&mut self) {
        self.transition(Stage::Idle);
        if let Some(timings) = self.timer.as_mut().and_then(|t| t.completed.take()) {
            self.history.push(timings);
        }
    }

    /// End a failed call. Partial timings are dropped.
    pub fn abort(&mut self) {
        if self.state == Stage::Idle {
            return;
        }
        self.transition(Stage::Idle);
        if let Some(timer) = &mut self.timer {
            timer.completed = None;
        }
    }

    /// Timings of successful calls since the last [`clear`](Self::clear).
    pub fn call_timings(&self) -> &[CallTimings] {
        &self.history
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("state", &self.state)
            .field("timings", &self.timer.is_some())
            .field("sinks", &self.sinks.len())
            .field("history", &self.history.len())
            .finish()
    }
}
