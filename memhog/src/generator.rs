use std::{
    io::{self, Write},
    thread::sleep,
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::buffer::{AllocationFailure, Buffer};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Allocation(#[from] AllocationFailure),
    #[error("write progress: {0}")]
    Output(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub buffer_size: usize,
    pub iterations: usize,
    pub interval: Duration,
}

impl Default for Plan {
    // 100MiB buffer replaced 5 times, once per second
    fn default() -> Self {
        Self {
            buffer_size: 100 << 20,
            iterations: 5,
            interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running { completed: usize },
    Done,
}

/// Holds exactly one buffer and replaces it on every step.
///
/// A step pauses for the plan interval, prints `Iteration {i}` and only then
/// allocates the replacement. The previous buffer is released when the new one
/// is assigned, so both are alive only while the replacement is being filled.
#[derive(Debug)]
pub struct Generator {
    plan: Plan,
    state: State,
    buffer: Buffer,
}

impl Generator {
    pub fn start(plan: Plan) -> Result<Self, Error> {
        let buffer = allocate(plan.buffer_size)?;
        let state = if plan.iterations == 0 {
            State::Done
        } else {
            State::Running { completed: 0 }
        };
        Ok(Self { plan, state, buffer })
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn step(&mut self, out: &mut impl Write) -> Result<State, Error> {
        let completed = match self.state {
            State::Running { completed } => completed,
            State::Done => return Ok(State::Done),
        };
        sleep(self.plan.interval);
        writeln!(out, "Iteration {}", completed)?;
        out.flush()?;
        self.buffer = allocate(self.plan.buffer_size)?;

        let completed = completed + 1;
        self.state = if completed == self.plan.iterations {
            State::Done
        } else {
            State::Running { completed }
        };
        Ok(self.state)
    }

    pub fn run(&mut self, out: &mut impl Write) -> Result<(), Error> {
        let start = Instant::now();
        info!(
            "replacing {} byte buffer {} times every {}",
            self.plan.buffer_size,
            self.plan.iterations,
            humantime::format_duration(self.plan.interval)
        );
        while self.step(out)? != State::Done {}
        info!("completed in {}", humantime::format_duration(start.elapsed()));
        Ok(())
    }
}

fn allocate(size: usize) -> Result<Buffer, AllocationFailure> {
    let start = Instant::now();
    let buffer = Buffer::zeroed(size)?;
    debug!(size, elapsed = ?start.elapsed(), "allocated zeroed buffer");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_plan(iterations: usize) -> Plan {
        Plan {
            buffer_size: 1 << 20,
            iterations,
            interval: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_default_plan() {
        let plan = Plan::default();
        assert_eq!(plan.buffer_size, 104_857_600);
        assert_eq!(plan.iterations, 5);
        assert_eq!(plan.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_run_prints_iterations() {
        let mut out = Vec::new();
        let mut generator = Generator::start(small_plan(5)).expect("start");
        generator.run(&mut out).expect("run");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "Iteration 0\nIteration 1\nIteration 2\nIteration 3\nIteration 4\n"
        );
        assert_eq!(generator.state(), State::Done);
    }

    #[test]
    fn test_step_transitions() {
        let plan = small_plan(3);
        let mut out = Vec::new();
        let mut generator = Generator::start(plan.clone()).expect("start");
        assert_eq!(generator.state(), State::Running { completed: 0 });
        assert_eq!(generator.buffer().len(), plan.buffer_size);
        assert!(generator.buffer().is_zeroed());

        for completed in 1..plan.iterations {
            assert_eq!(generator.step(&mut out).expect("step"), State::Running { completed });
        }
        assert_eq!(generator.step(&mut out).expect("step"), State::Done);
        // done is terminal and doesn't print
        assert_eq!(generator.step(&mut out).expect("step"), State::Done);
        assert_eq!(out.iter().filter(|b| **b == b'\n').count(), plan.iterations);
    }

    #[test]
    fn test_step_replaces_buffer_with_zeroed() {
        let plan = small_plan(2);
        let mut out = Vec::new();
        let mut generator = Generator::start(plan.clone()).expect("start");
        generator.buffer.as_mut_slice().fill(0xAA);

        generator.step(&mut out).expect("step");
        assert_eq!(generator.buffer().len(), plan.buffer_size);
        assert!(generator.buffer().is_zeroed());
    }

    #[test]
    fn test_no_drift_compensation() {
        let plan = small_plan(5);
        let mut out = Vec::new();
        let start = Instant::now();
        Generator::start(plan.clone())
            .expect("start")
            .run(&mut out)
            .expect("run");
        assert!(start.elapsed() >= plan.interval * plan.iterations as u32);
    }

    #[test]
    fn test_zero_iterations() {
        let mut out = Vec::new();
        let mut generator = Generator::start(small_plan(0)).expect("start");
        assert_eq!(generator.state(), State::Done);
        generator.run(&mut out).expect("run");
        assert!(out.is_empty());
    }

    #[test]
    fn test_allocation_failure_before_output() {
        let plan = Plan {
            buffer_size: isize::MAX as usize + 1,
            ..small_plan(5)
        };
        match Generator::start(plan) {
            Err(Error::Allocation(failure)) => assert_eq!(failure.size, isize::MAX as usize + 1),
            other => panic!("expected allocation failure, got {:?}", other.map(|g| g.state())),
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_output_failure() {
        let mut generator = Generator::start(small_plan(1)).expect("start");
        assert!(matches!(generator.step(&mut FailingWriter), Err(Error::Output(_))));
    }
}
