pub mod pty;
pub mod stdin;
pub mod terminal;

pub use pty::spawn_shell_pty;
pub use stdin::StdinReader;
pub use terminal::{is_terminal, OutputMode, TerminalState};
