use anyhow::Result;
use nix::pty::{forkpty, ForkptyResult};
use nix::unistd;
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, OwnedFd};

/// Environment for the interactive shell child. Fixed and minimal: the
/// child's inherited environment is discarded entirely.
const SHELL_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
const SHELL_HOME: &str = "/home";
const SHELL_TERM: &str = "xterm-256color";

/// Allocate a pseudo-terminal pair and exec an interactive `bash --norc` on
/// the slave side, with a colorized prompt embedding the session username.
/// Returns the master fd and the child pid.
pub fn spawn_shell_pty(username: &str) -> Result<(OwnedFd, unistd::Pid)> {
    match unsafe { forkpty(None, None)? } {
        ForkptyResult::Parent { master, child } => {
            tracing::info!(
                "Spawned interactive shell for '{}': master fd {}, pid {}",
                username,
                master.as_raw_fd(),
                child
            );
            Ok((master, child))
        }
        ForkptyResult::Child => {
            let ps1 = format!(
                "\\[\\033[1;36m\\][MySSH]\\[\\033[1;33m\\]{}:\\w\\[\\033[0m\\]$ ",
                username
            );
            let env = [
                format!("TERM={}", SHELL_TERM),
                format!("PATH={}", SHELL_PATH),
                format!("HOME={}", SHELL_HOME),
                format!("PS1={}", ps1),
                "LS_OPTIONS=--color=auto".to_string(),
                "CLICOLOR=1".to_string(),
            ];
            let env: Vec<CString> = env
                .iter()
                .map(|entry| CString::new(entry.as_str()))
                .collect::<Result<_, _>>()?;

            let shell = CString::new("/bin/bash")?;
            let args = [CString::new("bash")?, CString::new("--norc")?];

            unistd::execve(&shell, &args, &env)?;
            unreachable!();
        }
    }
}
