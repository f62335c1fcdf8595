//! Memory rollup sampling of a running process, based on `/proc/<pid>/smaps_rollup`.

pub mod monitor;
pub mod output;
pub mod process;
pub mod rollup;
pub mod stats;
