pub mod cipher;

pub use cipher::Keystream;

/// Default TCP port the server listens on.
pub const DEFAULT_PORT: u16 = 8090;

/// Read granularity for sockets, pipes and the PTY master.
pub const BUFFER_SIZE: usize = 4096;

/// Handshake byte strings. The whole authentication exchange is plaintext
/// by design; the keystream cipher only covers traffic after
/// `AUTH_SUCCESS` has been sent.
pub const USERNAME_PROMPT: &str = "Username: ";
pub const PASSWORD_PROMPT: &str = "Password: ";
pub const AUTH_SUCCESS: &str = "Authentication success\n";
pub const AUTH_FAILED: &str = "Authentication failed\n";

/// Colorized prompt the command shell sends (ciphered) before each line.
pub fn shell_prompt(username: &str, cwd: &str) -> String {
    format!(
        "\x1b[1;36m[MySSH]\x1b[1;33m{}:{}\x1b[0m$ ",
        username, cwd
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_prompt_embeds_user_and_cwd() {
        let prompt = shell_prompt("alice", "/tmp");
        assert!(prompt.contains("[MySSH]"));
        assert!(prompt.contains("alice:/tmp"));
        assert!(prompt.ends_with("$ "));
    }
}
