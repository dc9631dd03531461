//! Process-group helpers.

/// Put the child in its own session so the entire group can be killed when a
/// timeout fires or the owning future is dropped.
#[cfg(unix)]
pub(crate) fn set_new_session(cmd: &mut tokio::process::Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn set_new_session(_cmd: &mut tokio::process::Command) {}

/// Kill the process group rooted at `pid`, falling back to the direct child.
#[cfg(unix)]
pub(crate) fn kill_process_group(child: &mut tokio::process::Child) {
    if let Some(pid) = child.id() {
        unsafe {
            if libc::killpg(pid as i32, libc::SIGKILL) == -1 {
                let _ = child.start_kill();
            }
        }
    } else {
        let _ = child.start_kill();
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_process_group(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
}

/// Guard that kills the child's process group if dropped while running.
///
/// Dropping the execution future mid-flight (cancellation) must not leak the
/// subprocess tree.
pub(crate) struct ChildGuard {
    child: Option<tokio::process::Child>,
}

impl ChildGuard {
    pub(crate) fn new(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    pub(crate) fn inner(&mut self) -> &mut tokio::process::Child {
        // The option is only None after disarm(), which consumes the guard.
        self.child.as_mut().expect("child already taken")
    }

    /// Take the child back out, skipping the kill-on-drop behavior.
    pub(crate) fn disarm(mut self) -> tokio::process::Child {
        self.child.take().expect("child already taken")
    }

    pub(crate) fn kill_group(&mut self) {
        if let Some(child) = self.child.as_mut() {
            kill_process_group(child);
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) {
                kill_process_group(child);
            }
        }
    }
}
