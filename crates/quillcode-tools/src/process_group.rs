//! Process-group helpers for subprocess cleanup.
//!
//! Spawned commands are started in their own process group so an interrupt
//! or kill reaches the whole tree (shells fork freely), not just the
//! immediate child.

#![allow(unsafe_code)]

use std::io;
use tokio::process::Command;

/// Signal to send to a process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSignal {
    /// SIGINT, the Ctrl+C equivalent.
    Interrupt,
    /// SIGKILL, immediate termination.
    Kill,
}

#[cfg(unix)]
impl GroupSignal {
    fn as_libc_signal(self) -> libc::c_int {
        match self {
            GroupSignal::Interrupt => libc::SIGINT,
            GroupSignal::Kill => libc::SIGKILL,
        }
    }
}

/// Arrange for the command to start as the leader of a fresh process group.
#[cfg(unix)]
pub fn spawn_in_own_group(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn spawn_in_own_group(_cmd: &mut Command) {}

/// Send a signal to the process group of `pid` (best-effort).
///
/// A group that has already exited is not an error.
#[cfg(unix)]
pub fn signal_group(pid: u32, signal: GroupSignal) -> io::Result<()> {
    let pid = pid as libc::pid_t;
    let pgid = unsafe { libc::getpgid(pid) };
    if pgid == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        return Err(err);
    }

    if unsafe { libc::killpg(pgid, signal.as_libc_signal()) } == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    Ok(())
}

/// No-op on non-Unix platforms; callers fall back to killing the child
/// directly.
#[cfg(not(unix))]
pub fn signal_group(_pid: u32, _signal: GroupSignal) -> io::Result<()> {
    Ok(())
}
