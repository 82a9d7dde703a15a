use nix::sys::termios::{self, InputFlags, LocalFlags, OutputFlags, SetArg, Termios};
use nix::unistd;
use std::io;
use std::os::unix::io::RawFd;

/// How the local terminal should treat output while in raw mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    /// No output post-processing; the remote PTY renders everything.
    Raw,
    /// Keep OPOST and NL -> CRNL translation; the command shell emits plain
    /// `\n`-terminated lines.
    Cooked,
}

/// Saved local terminal state with raw-mode entry/exit. The original
/// settings are restored on drop, so an error path cannot leave the user's
/// terminal broken.
#[derive(Debug, Clone)]
pub struct TerminalState {
    original_termios: Option<Termios>,
    is_raw: bool,
}

impl TerminalState {
    pub fn new() -> io::Result<Self> {
        let original_termios = if is_terminal(0) {
            Some(termios::tcgetattr(std::io::stdin())?)
        } else {
            None
        };

        Ok(TerminalState {
            original_termios,
            is_raw: false,
        })
    }

    pub fn is_terminal_available(&self) -> bool {
        self.original_termios.is_some()
    }

    /// Disable canonical input, echo, signal generation and flow control so
    /// every keystroke reaches the session loop as raw bytes.
    pub fn enter_raw_mode(&mut self, output: OutputMode) -> io::Result<()> {
        let Some(original) = self.original_termios.as_ref() else {
            return Ok(());
        };
        if self.is_raw {
            return Ok(());
        }

        let mut raw = original.clone();

        raw.input_flags
            .remove(InputFlags::IXON | InputFlags::ICRNL);
        raw.local_flags
            .remove(LocalFlags::ECHO | LocalFlags::ICANON | LocalFlags::ISIG);

        match output {
            OutputMode::Raw => {
                raw.output_flags.remove(OutputFlags::OPOST);
            }
            OutputMode::Cooked => {
                raw.output_flags
                    .insert(OutputFlags::OPOST | OutputFlags::ONLCR);
            }
        }

        termios::tcsetattr(std::io::stdin(), SetArg::TCSANOW, &raw)?;
        self.is_raw = true;

        Ok(())
    }

    pub fn exit_raw_mode(&mut self) -> io::Result<()> {
        if !self.is_raw {
            return Ok(());
        }
        if let Some(original) = self.original_termios.as_ref() {
            termios::tcsetattr(std::io::stdin(), SetArg::TCSANOW, original)?;
        }
        self.is_raw = false;
        Ok(())
    }
}

impl Drop for TerminalState {
    fn drop(&mut self) {
        let _ = self.exit_raw_mode();
    }
}

pub fn is_terminal(fd: RawFd) -> bool {
    unistd::isatty(fd).unwrap_or(false)
}
