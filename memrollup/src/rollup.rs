use std::{fs, io};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("no Rss field in smaps_rollup")]
    MissingRss,
}

/// Sum of memory counters over all mappings of a process, in kB.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rollup {
    pub rss: u64,
    pub pss: u64,
    pub shared_clean: u64,
    pub shared_dirty: u64,
    pub private_clean: u64,
    pub private_dirty: u64,
}

impl Rollup {
    pub fn path(pid: u32) -> String {
        format!("/proc/{}/smaps_rollup", pid)
    }

    pub fn read(pid: u32) -> Result<Self, Error> {
        let path = Self::path(pid);
        match fs::read_to_string(&path) {
            Ok(data) => Self::parse(&data),
            Err(source) => Err(Error::Read { path, source }),
        }
    }

    pub fn parse(data: &str) -> Result<Self, Error> {
        let mut rollup = Rollup::default();
        let mut has_rss = false;
        for line in data.lines() {
            let mut fields = line.split_whitespace();
            let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Ok(value) = value.parse::<u64>() else {
                continue;
            };
            match key {
                "Rss:" => {
                    rollup.rss = value;
                    has_rss = true;
                }
                "Pss:" => rollup.pss = value,
                "Shared_Clean:" => rollup.shared_clean = value,
                "Shared_Dirty:" => rollup.shared_dirty = value,
                "Private_Clean:" => rollup.private_clean = value,
                "Private_Dirty:" => rollup.private_dirty = value,
                _ => {}
            }
        }
        if !has_rss {
            return Err(Error::MissingRss);
        }
        Ok(rollup)
    }

    /// Unique set size, memory that would be freed if the process exited.
    pub fn uss(&self) -> u64 {
        self.private_clean + self.private_dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
55d0c1a4b000-7ffd5a9f2000 ---p 00000000 00:00 0                          [rollup]
Rss:              106012 kB
Pss:              104433 kB
Pss_Anon:         102660 kB
Pss_File:           1773 kB
Pss_Shmem:             0 kB
Shared_Clean:       1672 kB
Shared_Dirty:          0 kB
Private_Clean:       276 kB
Private_Dirty:    104064 kB
Referenced:       106012 kB
Anonymous:        102660 kB
LazyFree:              0 kB
AnonHugePages:     98304 kB
Swap:                  0 kB
SwapPss:               0 kB
Locked:                0 kB
";

    #[test]
    fn test_parse() {
        let rollup = Rollup::parse(SAMPLE).expect("parse");
        assert_eq!(
            rollup,
            Rollup {
                rss: 106012,
                pss: 104433,
                shared_clean: 1672,
                shared_dirty: 0,
                private_clean: 276,
                private_dirty: 104064,
            }
        );
        assert_eq!(rollup.uss(), 104340);
    }

    #[test]
    fn test_parse_skips_malformed() {
        let rollup = Rollup::parse("Rss: 10 kB\nPss: many kB\nPss\n\nPrivate_Dirty: 3 kB").expect("parse");
        assert_eq!(rollup.rss, 10);
        assert_eq!(rollup.pss, 0);
        assert_eq!(rollup.private_dirty, 3);
    }

    #[test]
    fn test_parse_without_rss() {
        assert!(matches!(Rollup::parse("Pss: 1 kB\n"), Err(Error::MissingRss)));
        assert!(matches!(Rollup::parse(""), Err(Error::MissingRss)));
    }

    #[test]
    fn test_read_self() {
        if !std::path::Path::new("/proc/self/smaps_rollup").exists() {
            return;
        }
        let rollup = Rollup::read(std::process::id()).expect("read own rollup");
        assert!(rollup.rss > 0);
        assert!(rollup.rss >= rollup.uss());
    }

    #[test]
    fn test_read_missing_process() {
        // pid_max is at most 2^22
        assert!(matches!(Rollup::read(u32::MAX), Err(Error::Read { .. })));
    }
}
