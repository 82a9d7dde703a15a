use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use myssh_auth::CredentialStore;
use myssh_protocol::{
    shell_prompt, Keystream, AUTH_FAILED, AUTH_SUCCESS, BUFFER_SIZE, PASSWORD_PROMPT,
    USERNAME_PROMPT,
};
use myssh_shell::SessionEnv;

/// Plaintext authentication exchange, one round trip per field. Returns the
/// credentials on success, `None` when the peer should simply be dropped
/// (mismatch, store failure, or the peer closing mid-handshake). The
/// exchange is unencrypted by design: the keystream cipher is casual
/// obfuscation keyed on the password we are about to learn, not transport
/// security.
pub async fn authenticate(
    stream: &mut TcpStream,
    store: &CredentialStore,
) -> Result<Option<(String, String)>> {
    let mut buf = [0u8; BUFFER_SIZE];

    stream.write_all(USERNAME_PROMPT.as_bytes()).await?;
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    // Taken verbatim: no trimming, no length validation.
    let username = String::from_utf8_lossy(&buf[..n]).into_owned();

    stream.write_all(PASSWORD_PROMPT.as_bytes()).await?;
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    let password = String::from_utf8_lossy(&buf[..n]).into_owned();

    let authenticated = match store.lookup(&username) {
        Ok(Some(stored)) => stored == password,
        Ok(None) => false,
        Err(e) => {
            tracing::warn!("Credential store lookup failed: {}", e);
            false
        }
    };

    if authenticated {
        stream.write_all(AUTH_SUCCESS.as_bytes()).await?;
        Ok(Some((username, password)))
    } else {
        tracing::info!("Authentication failed for '{}'", username);
        stream.write_all(AUTH_FAILED.as_bytes()).await?;
        Ok(None)
    }
}

/// One authenticated connection. Owns the socket halves, both cipher
/// directions and the shell environment; nothing here is shared between
/// sessions.
pub struct Session {
    pub(crate) reader: OwnedReadHalf,
    pub(crate) writer: OwnedWriteHalf,
    pub(crate) username: String,
    pub(crate) send: Keystream,
    pub(crate) recv: Keystream,
    pub(crate) env: SessionEnv,
    /// Decrypted bytes received but not yet consumed as a complete line.
    pending: Vec<u8>,
}

impl Session {
    /// Construct the ciphered session. Fails if the password cannot key the
    /// cipher (empty), which ends the connection before any ciphered byte
    /// is exchanged.
    pub fn new(stream: TcpStream, username: String, password: String) -> Result<Self> {
        let send = Keystream::new(password.as_bytes().to_vec())?;
        let recv = Keystream::new(password.as_bytes().to_vec())?;
        let (reader, writer) = stream.into_split();

        Ok(Session {
            reader,
            writer,
            username,
            send,
            recv,
            env: SessionEnv::new(),
            pending: Vec::new(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Encrypt with the send counter and write to the client.
    pub async fn send_ciphered(&mut self, bytes: &[u8]) -> Result<()> {
        let mut buf = bytes.to_vec();
        self.send.apply(&mut buf);
        self.writer.write_all(&buf).await?;
        Ok(())
    }

    /// One-line ciphered message (errors, exit statuses).
    pub async fn send_message(&mut self, message: &str) -> Result<()> {
        self.send_ciphered(message.as_bytes()).await
    }

    pub async fn send_prompt(&mut self) -> Result<()> {
        let prompt = shell_prompt(&self.username, self.env.cwd());
        self.send_ciphered(prompt.as_bytes()).await
    }

    /// Read and decrypt until one full command line is buffered. TCP gives
    /// no boundary guarantee, so bytes accumulate across reads until a
    /// newline arrives (`\r\n` tolerated). `None` means the peer closed.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = [0u8; BUFFER_SIZE];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let n = self.reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            let chunk = &mut buf[..n];
            self.recv.apply(chunk);
            self.pending.extend_from_slice(chunk);
        }
    }
}
