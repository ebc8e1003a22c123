//! Watch evaluation against a captured baseline.
//!
//! The monitoring backend is an ordinary flush sink. It skips the
//! warm-up window, keeps the first snapshot after it as the baseline,
//! and from then on checks every configured watch against the baseline
//! on every flush.

use std::fmt;
use std::str::FromStr;

use crossbeam::channel::Sender;

use crate::config::{ErrorReaction, HarnessConfig, ProcessSpec};
use crate::error::MetricsError;
use crate::statsd::backends::StatsBackendTrait;
use crate::statsd::flush::{Stats, TimerData};
use crate::statsd::tick::{self, Tick};
use crate::MetricResult;

/// Which derived timer statistic a watch compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Arithmetic mean of the window samples.
    Avg,
    /// Smallest window sample.
    Min,
    /// Largest window sample.
    Max,
    /// Standard deviation of the window samples.
    Stddev,
}

impl ValueKind {
    #[allow(clippy::cast_precision_loss)]
    fn select(self, data: &TimerData) -> f64 {
        match self {
            Self::Avg => data.avg,
            Self::Min => data.min as f64,
            Self::Max => data.max as f64,
            Self::Stddev => data.stddev,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Stddev => "stddev",
        })
    }
}

/// The comparison operator of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOp {
    /// The watch passes while the comparand stays below the operand.
    Lt,
    /// The watch passes while the comparand stays above the operand.
    Gt,
}

impl fmt::Display for WatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lt => "<",
            Self::Gt => ">",
        })
    }
}

/// How the watch operand is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchModel {
    /// Compare the absolute difference to the baseline.
    Absolute,
    /// Compare the difference as a percentage of the baseline value.
    RelativePercent,
}

/// A declarative assertion over a timer statistic relative to a
/// baseline.
///
/// A watch **passes** while its inequality holds, and a regression is
/// reported the first time it does not. The polarity is literal: a
/// watch written `lat > 20%` passes exactly when growth exceeds 20%,
/// which may be the opposite of what the phrase suggests in English.
/// Pick the operator for the condition that should *hold* during a
/// healthy run.
///
/// Watches parse from expressions like `lat avg < 20%`:
///
/// ```
/// use stout::{ValueKind, Watch, WatchModel, WatchOp};
///
/// let watch: Watch = "lat avg < 20%".parse().unwrap();
/// assert_eq!(watch.value, ValueKind::Avg);
/// assert_eq!(watch.op, WatchOp::Lt);
/// assert_eq!(watch.operand, 20);
/// assert_eq!(watch.model, WatchModel::RelativePercent);
///
/// // the value kind is optional and defaults to avg; a bare operand
/// // selects the absolute model
/// let watch: Watch = "commit.time > 100".parse().unwrap();
/// assert_eq!(watch.value, ValueKind::Avg);
/// assert_eq!(watch.model, WatchModel::Absolute);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watch {
    /// Timer-name fragment this watch selects; the full prefix is
    /// `stout.{process_id}.{counter}`.
    pub counter: String,
    /// Which timer statistic to compare.
    pub value: ValueKind,
    /// The comparison operator.
    pub op: WatchOp,
    /// The threshold.
    pub operand: i64,
    /// Absolute or relative interpretation of the threshold.
    pub model: WatchModel,
    failed: bool,
}

impl Watch {
    /// Creates a watch. Prefer parsing an expression with
    /// [`str::parse`] when the watch comes from configuration text.
    #[must_use]
    pub fn new(
        counter: impl Into<String>,
        value: ValueKind,
        op: WatchOp,
        operand: i64,
        model: WatchModel,
    ) -> Self {
        Self { counter: counter.into(), value, op, operand, model, failed: false }
    }
}

impl fmt::Display for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}{}",
            self.counter,
            self.value,
            self.op,
            self.operand,
            match self.model {
                WatchModel::Absolute => "",
                WatchModel::RelativePercent => "%",
            }
        )
    }
}

impl FromStr for Watch {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MetricsError::WatchExpr(s.to_owned());

        let tokens: Vec<&str> = s.split_whitespace().collect();
        let (counter, kind, op, operand) = match tokens.as_slice() {
            [counter, op, operand] => (*counter, None, *op, *operand),
            [counter, kind, op, operand] => (*counter, Some(*kind), *op, *operand),
            _ => return Err(invalid()),
        };

        let value = match kind.map(str::to_ascii_lowercase).as_deref() {
            None | Some("avg") => ValueKind::Avg,
            Some("min") => ValueKind::Min,
            Some("max") => ValueKind::Max,
            Some("stddev") => ValueKind::Stddev,
            Some(_) => return Err(invalid()),
        };

        let op = match op {
            "<" => WatchOp::Lt,
            ">" => WatchOp::Gt,
            _ => return Err(invalid()),
        };

        let (digits, model) = operand.strip_suffix('%').map_or(
            (operand, WatchModel::Absolute),
            |stripped| (stripped, WatchModel::RelativePercent),
        );
        let operand: i64 = digits.parse().map_err(|_| invalid())?;

        Ok(Self::new(counter, value, op, operand, model))
    }
}

/// Flush sink that captures a baseline and evaluates watches.
///
/// Holds its own copy of the process list, so marking watches as failed
/// never touches the caller's configuration. When the configured
/// reaction is [`ErrorReaction::Stop`], a unit message is sent on the
/// stop channel for every regression; the harness owner decides what
/// termination means.
pub struct MonitoringBackend {
    processes: Vec<ProcessSpec>,
    error_reaction: ErrorReaction,
    warmup_ms: i64,
    started_at: Tick,
    baseline: Option<Stats>,
    stop_tx: Sender<()>,
}

impl MonitoringBackend {
    /// Creates the backend from the harness configuration. The warm-up
    /// gate starts counting now.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn new(cfg: &HarnessConfig, stop_tx: Sender<()>) -> Self {
        Self {
            processes: cfg.processes.clone(),
            error_reaction: cfg.error_reaction,
            warmup_ms: ((cfg.initial_delay_s + cfg.sampling_time_s).saturating_sub(1)
                * 1000) as i64,
            started_at: tick::now(),
            baseline: None,
            stop_tx,
        }
    }
}

impl StatsBackendTrait for MonitoringBackend {
    fn emit(&mut self, stats: &Stats) -> MetricResult<()> {
        // flushes during the initial delay and baseline sampling don't
        // contain relevant data yet
        if tick::since(self.started_at) < self.warmup_ms {
            return Ok(());
        }

        let Some(baseline) = &self.baseline else {
            self.baseline = Some(stats.clone());
            println!("baseline assessment done. monitoring started...");
            return Ok(());
        };

        for proc in &mut self.processes {
            for watch in &mut proc.watches {
                if watch.failed {
                    continue; // avoid repeating messages
                }
                if !validate(&proc.id, watch, baseline, stats) {
                    watch.failed = true;
                    if self.error_reaction == ErrorReaction::Stop {
                        println!("Exiting due to error!");
                        let _ = self.stop_tx.send(());
                    }
                }
            }
        }
        Ok(())
    }
}

/// Checks one watch against every timer it selects. Returns `false` on
/// the first failing metric after printing the diagnostic.
fn validate(proc_id: &str, watch: &Watch, baseline: &Stats, current: &Stats) -> bool {
    let prefix = format!("stout.{proc_id}.{}", watch.counter);

    for (name, data) in &current.timers {
        if !name.starts_with(&prefix) {
            continue;
        }
        let Some(base_data) = baseline.timers.get(name) else {
            continue; // didn't exist in baseline
        };

        let base_val = watch.value.select(base_data);
        let curr_val = watch.value.select(data);

        let diff = curr_val - base_val;
        let diff_percent = if base_val == 0.0 { 0.0 } else { 100.0 * diff / base_val };
        let comparand = match watch.model {
            WatchModel::Absolute => diff,
            WatchModel::RelativePercent => diff_percent,
        };
        #[allow(clippy::cast_precision_loss)]
        let holds = match watch.op {
            WatchOp::Lt => comparand < watch.operand as f64,
            WatchOp::Gt => comparand > watch.operand as f64,
        };

        if !holds {
            println!("ERROR: proc {proc_id} failed at metric: {watch}");
            println!("       {name} baseline: {base_val} -> current: {curr_val}");
            return false;
        }
    }

    true
}
