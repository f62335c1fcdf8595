use std::{collections::BTreeMap, fmt::Write, time::SystemTime};

use serde::Serialize;

use crate::stats::{Metric, Samples, Statistics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub command: String,
    pub pid: u32,
    pub frequency: f64,
    pub duration: f64,
    pub samples: usize,
    pub start_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metadata: Metadata,
    pub statistics: BTreeMap<&'static str, Statistics>,
}

impl Report {
    pub fn new(command: &str, pid: u32, frequency: f64, started: SystemTime, samples: &Samples) -> Self {
        Self {
            metadata: Metadata {
                command: command.to_string(),
                pid,
                frequency,
                duration: samples.duration(),
                samples: samples.len(),
                start_time: humantime::format_rfc3339_nanos(started).to_string(),
            },
            statistics: Metric::ALL
                .iter()
                .map(|metric| (metric.name(), samples.statistics(*metric)))
                .collect(),
        }
    }

    pub fn render(&self, format: Format) -> Result<String, serde_json::Error> {
        match format {
            Format::Json => serde_json::to_string_pretty(self),
            Format::Csv => Ok(self.csv()),
        }
    }

    fn csv(&self) -> String {
        let mut out = String::from("metric,min_kb,max_kb,avg_kb,std_kb,samples,duration_sec\n");
        for metric in Metric::ALL {
            let stats = &self.statistics[metric.name()];
            // writing into a String can't fail
            _ = writeln!(
                out,
                "{},{},{},{:.2},{:.2},{},{:.3}",
                metric, stats.min, stats.max, stats.avg, stats.std, stats.count, self.metadata.duration
            );
        }
        out
    }
}
