use crate::{error::Result, store::Job};

/// Platform hooks for poking at running processes.
pub trait ProcessController: Send + Sync {
    /// Sends the "continue" signal to a job.
    fn resume(&self, job: &Job) -> Result<()>;

    /// Forcibly terminates an arbitrary process.
    fn kill(&self, pid: i32) -> Result<()>;
}

#[cfg(unix)]
mod imp {
    use nix::{
        sys::signal::{self, Signal},
        unistd::Pid,
    };

    use super::ProcessController;
    use crate::{
        error::{Result, ShellError},
        store::Job,
    };

    #[derive(Debug, Default)]
    pub struct UnixController;

    fn send(pid: i32, sig: Signal) -> Result<()> {
        signal::kill(Pid::from_raw(pid), sig).map_err(|e| ShellError::Signal {
            pid,
            reason: e.desc().to_string(),
        })
    }

    impl ProcessController for UnixController {
        fn resume(&self, job: &Job) -> Result<()> {
            let pid = i32::try_from(job.pid).map_err(|_| ShellError::InvalidPid(job.pid.to_string()))?;
            send(pid, Signal::SIGCONT)
        }

        fn kill(&self, pid: i32) -> Result<()> {
            if pid <= 0 {
                // 0 and negatives address process groups, not a single PID
                return Err(ShellError::InvalidPid(pid.to_string()));
            }
            send(pid, Signal::SIGKILL)
        }
    }

    pub fn platform() -> Box<dyn ProcessController> {
        Box::new(UnixController)
    }
}

#[cfg(not(unix))]
mod imp {
    use super::ProcessController;
    use crate::{
        error::{Result, ShellError},
        store::Job,
    };

    #[derive(Debug, Default)]
    pub struct UnsupportedController;

    impl ProcessController for UnsupportedController {
        fn resume(&self, _job: &Job) -> Result<()> {
            Err(ShellError::Unsupported("SIGCONT"))
        }

        fn kill(&self, _pid: i32) -> Result<()> {
            Err(ShellError::Unsupported("kill"))
        }
    }

    pub fn platform() -> Box<dyn ProcessController> {
        Box::new(UnsupportedController)
    }
}

pub use imp::platform;
