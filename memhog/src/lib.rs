//! Memory pressure workload: one zeroed buffer, replaced on a fixed schedule.

pub mod buffer;
pub mod generator;
