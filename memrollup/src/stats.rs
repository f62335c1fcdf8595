use std::{fmt, time::Instant};

use serde::Serialize;

use crate::rollup::Rollup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Metric {
    Rss,
    Pss,
    Uss,
    SharedClean,
    SharedDirty,
    PrivateClean,
    PrivateDirty,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Rss,
        Metric::Pss,
        Metric::Uss,
        Metric::SharedClean,
        Metric::SharedDirty,
        Metric::PrivateClean,
        Metric::PrivateDirty,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Rss => "RSS",
            Metric::Pss => "PSS",
            Metric::Uss => "USS",
            Metric::SharedClean => "SHARED_CLEAN",
            Metric::SharedDirty => "SHARED_DIRTY",
            Metric::PrivateClean => "PRIVATE_CLEAN",
            Metric::PrivateDirty => "PRIVATE_DIRTY",
        }
    }

    pub fn value(&self, rollup: &Rollup) -> u64 {
        match self {
            Metric::Rss => rollup.rss,
            Metric::Pss => rollup.pss,
            Metric::Uss => rollup.uss(),
            Metric::SharedClean => rollup.shared_clean,
            Metric::SharedDirty => rollup.shared_dirty,
            Metric::PrivateClean => rollup.private_clean,
            Metric::PrivateDirty => rollup.private_dirty,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub min: u64,
    pub max: u64,
    pub avg: f64,
    pub std: f64,
    pub count: usize,
    pub unit: &'static str,
}

impl Statistics {
    /// Population statistics, all zeros for an empty input.
    pub fn from_values(values: impl IntoIterator<Item = u64>) -> Self {
        let values = values.into_iter().collect::<Vec<_>>();
        if values.is_empty() {
            return Self {
                min: 0,
                max: 0,
                avg: 0.0,
                std: 0.0,
                count: 0,
                unit: "kB",
            };
        }
        let min = values.iter().copied().min().unwrap_or_default();
        let max = values.iter().copied().max().unwrap_or_default();
        let count = values.len();
        let avg = values.iter().map(|v| *v as f64).sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (*v as f64 - avg).powi(2)).sum::<f64>() / count as f64;
        Self {
            min,
            max,
            avg,
            std: variance.sqrt(),
            count,
            unit: "kB",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub at: Instant,
    pub rollup: Rollup,
}

#[derive(Debug, Default, Clone)]
pub struct Samples(Vec<Sample>);

impl Samples {
    pub fn push(&mut self, at: Instant, rollup: Rollup) {
        self.0.push(Sample { at, rollup });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.0.iter()
    }

    /// Seconds between the first and the last sample.
    pub fn duration(&self) -> f64 {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) => last.at.duration_since(first.at).as_secs_f64(),
            _ => 0.0,
        }
    }

    pub fn statistics(&self, metric: Metric) -> Statistics {
        Statistics::from_values(self.0.iter().map(|sample| metric.value(&sample.rollup)))
    }
}
