use std::env;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use aether_common::RestartMode;
use aether_core::ProcessRestarter;

/// Exit status that tells a service manager to start us again (EX_TEMPFAIL).
pub const SUPERVISOR_RESTART_CODE: i32 = 75;

/// Re-executes the current binary with the arguments it was started with.
#[derive(Debug, Clone)]
pub struct ExecRestarter {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ExecRestarter {
    pub fn new(program: PathBuf, args: Vec<OsString>) -> Self {
        Self { program, args }
    }

    pub fn current() -> io::Result<Self> {
        Ok(Self::new(env::current_exe()?, env::args_os().skip(1).collect()))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl ProcessRestarter for ExecRestarter {
    fn restart_in_place(&self) -> io::Error {
        relaunch(self.command())
    }
}

#[cfg(unix)]
fn relaunch(mut command: Command) -> io::Error {
    use std::os::unix::process::CommandExt;
    command.exec()
}

#[cfg(not(unix))]
fn relaunch(mut command: Command) -> io::Error {
    // No exec-replace here: start the successor, then leave.
    match command.spawn() {
        Ok(_) => std::process::exit(0),
        Err(err) => err,
    }
}

/// Leaves relaunching to systemd, Docker, or whatever supervises the process.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorRestarter {
    exit_code: i32,
}

impl Default for SupervisorRestarter {
    fn default() -> Self {
        Self {
            exit_code: SUPERVISOR_RESTART_CODE,
        }
    }
}

impl ProcessRestarter for SupervisorRestarter {
    fn restart_in_place(&self) -> io::Error {
        std::process::exit(self.exit_code)
    }
}

pub fn restarter_for(mode: RestartMode) -> io::Result<Box<dyn ProcessRestarter>> {
    Ok(match mode {
        RestartMode::Exec => Box::new(ExecRestarter::current()?),
        RestartMode::Supervisor => Box::new(SupervisorRestarter::default()),
    })
}
