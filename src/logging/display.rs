//! Command-line logger
use super::{LogError, Loggable, StatsLogger};
use crate::utils::fmt::{Frequency, PrettyPrint};
use crate::utils::stats::OnlineMeanVariance;
use coarsetime::{Duration as CDuration, Instant as CInstant};
use std::collections::{btree_map::Entry, BTreeMap};
use std::fmt;
use std::time::{Duration, Instant};
use yansi::Paint;

/// Logger that displays summaries to standard output at fixed time intervals.
///
/// Values logged under the same name within one interval are summarized:
/// scalars by their mean and standard deviation, counters by their total and increment.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayLogger {
    // Coarse time is used because the current time is checked on every log event,
    // which might be quite frequent for per-step values so the time checks should be fast.
    chunk_duration: CDuration,
    coarse_chunk_start: CInstant,
    // Precise start of the chunk; used for measuring counter frequencies.
    chunk_start: Instant,
    // A binary tree is used so that names are displayed in sorted order
    summaries: BTreeMap<&'static str, Node>,
}

impl DisplayLogger {
    pub fn new(chunk_duration: Duration) -> Self {
        Self {
            chunk_duration: CDuration::new(chunk_duration.as_secs(), chunk_duration.subsec_nanos()),
            coarse_chunk_start: CInstant::now(),
            chunk_start: Instant::now(),
            summaries: BTreeMap::new(),
        }
    }
}

impl Default for DisplayLogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl StatsLogger for DisplayLogger {
    fn log(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError> {
        // Check the time before logging so that a burst of logs is not split across chunks.
        if self.coarse_chunk_start.elapsed() > self.chunk_duration {
            self.flush();
        }
        match self.summaries.entry(name) {
            Entry::Vacant(e) => {
                e.insert(Node::new(value));
            }
            Entry::Occupied(e) => e.into_mut().push(name, value)?,
        }
        Ok(())
    }

    fn flush(&mut self) {
        let elapsed = self.chunk_start.elapsed();
        let mut any = false;
        for (name, node) in self.summaries.iter().filter(|(_, node)| node.dirty) {
            if !any {
                println!();
                any = true;
            }
            println!(
                "{:<24} {}",
                Paint::fixed(35, name),
                DisplaySummary {
                    summary: &node.summary,
                    elapsed,
                }
            );
        }

        for node in self.summaries.values_mut() {
            node.reset();
        }
        self.coarse_chunk_start = CInstant::now();
        self.chunk_start = Instant::now();
    }
}

/// Flush when dropped
impl Drop for DisplayLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    summary: Summary,
    /// Whether the summary has been updated in this chunk
    dirty: bool,
}

impl Node {
    fn new(value: Loggable) -> Self {
        let summary = match value {
            Loggable::Scalar(v) => {
                let mut stats = OnlineMeanVariance::new();
                stats.push(v);
                Summary::Scalar { stats }
            }
            Loggable::CounterIncrement(i) => Summary::Counter {
                increment: i,
                initial_value: 0,
            },
        };
        Self {
            summary,
            dirty: true,
        }
    }

    fn push(&mut self, name: &'static str, value: Loggable) -> Result<(), LogError> {
        self.dirty = true;
        self.summary
            .push(value)
            .map_err(|expected| LogError::IncompatibleValue {
                name,
                actual: value.kind(),
                expected,
            })
    }

    fn reset(&mut self) {
        self.dirty = false;
        self.summary.reset()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Summary {
    Scalar {
        stats: OnlineMeanVariance<f64>,
    },
    Counter {
        increment: u64,
        initial_value: u64,
    },
}

impl Summary {
    /// Add a value to the summary. On mismatch, returns the expected kind of value.
    fn push(&mut self, value: Loggable) -> Result<(), &'static str> {
        match (self, value) {
            (Self::Scalar { stats }, Loggable::Scalar(v)) => {
                stats.push(v);
                Ok(())
            }
            (Self::Counter { increment, .. }, Loggable::CounterIncrement(i)) => {
                *increment += i;
                Ok(())
            }
            (Self::Scalar { .. }, _) => Err("scalar"),
            (Self::Counter { .. }, _) => Err("counter"),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Scalar { stats } => *stats = OnlineMeanVariance::new(),
            Self::Counter {
                increment,
                initial_value,
            } => {
                *initial_value += *increment;
                *increment = 0;
            }
        }
    }
}

struct DisplaySummary<'a> {
    summary: &'a Summary,
    elapsed: Duration,
}

impl<'a> fmt::Display for DisplaySummary<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.summary {
            Summary::Counter {
                increment,
                initial_value,
            } => {
                write!(
                    f,
                    "{}  (+{})",
                    initial_value + increment,
                    Paint::fixed(253, increment)
                )?;
                if *increment > 5 {
                    write!(
                        f,
                        "  {:.2}",
                        Paint::fixed(111, Frequency::from_count(*increment, self.elapsed))
                    )?;
                }
                Ok(())
            }
            Summary::Scalar { stats } => {
                if let Some(mean) = stats.mean() {
                    write!(f, "{:.3}", PrettyPrint(mean))?;
                }
                if stats.count() > 1 {
                    if let Some(stddev) = stats.stddev() {
                        let stddev = format!("(σ {:.3})", PrettyPrint(stddev));
                        write!(f, " {}", Paint::fixed(8, stddev))?;
                    }
                }
                Ok(())
            }
        }
    }
}
