use std::{
    io,
    os::unix::process::CommandExt,
    process::{Child, Command, ExitStatus},
    thread::sleep,
    time::{Duration, SystemTime},
};

use tracing::{debug, info};

const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Command executed by `bash -c` in its own process group.
///
/// The group lets [`Monitored::stop`] terminate everything the command started,
/// not only the shell.
#[derive(Debug)]
pub struct Monitored {
    command: String,
    child: Child,
    started: SystemTime,
    status: Option<ExitStatus>,
}

impl Monitored {
    pub fn spawn(words: &[String]) -> io::Result<Self> {
        let command = words.join(" ");
        let child = Command::new("bash").arg("-c").arg(&command).process_group(0).spawn()?;
        let started = SystemTime::now();
        info!("started {:?} with pid {}", command, child.id());
        Ok(Self {
            command,
            child,
            started,
            status: None,
        })
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn started(&self) -> SystemTime {
        self.started
    }

    /// Returns exit status once the process was reaped.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        if self.status.is_none() {
            self.status = self.child.try_wait()?;
        }
        Ok(self.status)
    }

    /// Sends SIGTERM and then SIGKILL to the whole process group and reaps the child.
    pub fn stop(mut self) -> io::Result<ExitStatus> {
        let group = self.pid() as i32;
        if signal_group(group, libc::SIGTERM).is_ok() {
            debug!("terminating process group {}", group);
            sleep(TERMINATE_GRACE);
            // group may be gone after SIGTERM
            _ = signal_group(group, libc::SIGKILL);
        }
        match self.status {
            Some(status) => Ok(status),
            None => self.child.wait(),
        }
    }
}

fn signal_group(group: i32, signal: libc::c_int) -> io::Result<()> {
    // SAFETY: kill has no memory safety requirements.
    if unsafe { libc::kill(-group, signal) } != 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
