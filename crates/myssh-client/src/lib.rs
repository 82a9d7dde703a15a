//! Client side of the encrypted shell protocol.
//!
//! Authentication runs in the terminal's normal cooked mode (the server's
//! prompts are plaintext and local line editing works as usual). Once the
//! server answers with the success line the terminal switches to raw mode
//! and everything on the wire is ciphered with the password keystream.

pub mod editor;

use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use myssh_core::{OutputMode, StdinReader, TerminalState};
use myssh_protocol::{Keystream, AUTH_FAILED, AUTH_SUCCESS, BUFFER_SIZE};

use crate::editor::LineEditor;

/// Which server shell variant the client is talking to. Determines the local
/// terminal output mode and whether keystrokes are line-edited locally or
/// relayed raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMode {
    /// Line-edit locally, send complete command lines.
    Pipeline,
    /// Relay every keystroke; the remote PTY shell does the editing.
    Interactive,
}

pub async fn run_client(host: &str, port: u16, mode: ClientMode) -> Result<()> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .with_context(|| format!("failed to connect to {}:{}", host, port))?;
    tracing::info!("Connected to {}:{}", host, port);

    let (password, leftover) = authenticate(&mut stream).await?;

    let mut send = Keystream::new(password.as_bytes().to_vec())?;
    let mut recv = Keystream::new(password.as_bytes().to_vec())?;

    let mut terminal = TerminalState::new()?;
    if !terminal.is_terminal_available() {
        bail!("stdin is not a terminal");
    }
    let output_mode = match mode {
        ClientMode::Pipeline => OutputMode::Cooked,
        ClientMode::Interactive => OutputMode::Raw,
    };
    terminal.enter_raw_mode(output_mode)?;

    let result = session_loop(stream, mode, &mut send, &mut recv, leftover).await;

    terminal.exit_raw_mode()?;
    result
}

/// Plaintext handshake: relay the server's prompts to the user, send their
/// answers back verbatim. Returns the password (it keys both cipher
/// directions) plus any ciphered bytes that arrived coalesced after the
/// success line.
async fn authenticate(stream: &mut TcpStream) -> Result<(String, Vec<u8>)> {
    let mut buf = [0u8; BUFFER_SIZE];

    // Username prompt.
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        bail!("connection closed by server during authentication");
    }
    print_raw(&buf[..n])?;
    let username = read_local_line()?;
    stream.write_all(username.as_bytes()).await?;

    // Password prompt. Echo stays on; the handshake is plaintext anyway.
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        bail!("connection closed by server during authentication");
    }
    print_raw(&buf[..n])?;
    let password = read_local_line()?;
    stream.write_all(password.as_bytes()).await?;

    // Verdict. The first ciphered prompt may ride in the same read.
    let n = stream.read(&mut buf).await?;
    if n == 0 {
        bail!("connection closed by server during authentication");
    }
    let reply = &buf[..n];

    if reply.starts_with(AUTH_FAILED.as_bytes()) {
        print_raw(AUTH_FAILED.as_bytes())?;
        bail!("authentication failed");
    }
    let Some(end) = find(reply, AUTH_SUCCESS.as_bytes()).map(|i| i + AUTH_SUCCESS.len()) else {
        bail!("unexpected authentication reply from server");
    };
    print_raw(&reply[..end])?;

    Ok((password, reply[end..].to_vec()))
}

async fn session_loop(
    stream: TcpStream,
    mode: ClientMode,
    send: &mut Keystream,
    recv: &mut Keystream,
    mut leftover: Vec<u8>,
) -> Result<()> {
    let (mut server_reader, mut server_writer) = stream.into_split();
    let mut stdout = tokio::io::stdout();

    if !leftover.is_empty() {
        recv.apply(&mut leftover);
        stdout.write_all(&leftover).await?;
        stdout.flush().await?;
    }

    let mut stdin = StdinReader::start()?;
    let mut line_editor = LineEditor::new();
    let mut server_buf = [0u8; BUFFER_SIZE];

    loop {
        tokio::select! {
            maybe_input = stdin.recv() => {
                let Some(input) = maybe_input else {
                    tracing::debug!("Local stdin closed");
                    break;
                };
                match mode {
                    ClientMode::Interactive => {
                        let mut data = input;
                        send.apply(&mut data);
                        server_writer.write_all(&data).await?;
                    }
                    ClientMode::Pipeline => {
                        let (echo, lines) = line_editor.process_bytes(&input);
                        if !echo.is_empty() {
                            stdout.write_all(&echo).await?;
                            stdout.flush().await?;
                        }
                        for line in lines {
                            let mut data = format!("{}\n", line).into_bytes();
                            send.apply(&mut data);
                            server_writer.write_all(&data).await?;
                        }
                    }
                }
            }

            result = server_reader.read(&mut server_buf) => {
                match result {
                    Ok(0) => {
                        tracing::info!("Connection closed by server");
                        break;
                    }
                    Ok(n) => {
                        let chunk = &mut server_buf[..n];
                        recv.apply(chunk);
                        stdout.write_all(chunk).await?;
                        stdout.flush().await?;
                    }
                    Err(e) => {
                        tracing::warn!("Socket read error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    if let Err(e) = stdin.shutdown().await {
        tracing::warn!("Failed to stop stdin reader: {}", e);
    }
    Ok(())
}

fn print_raw(bytes: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()?;
    Ok(())
}

/// Read one line from the local terminal (cooked mode), newline stripped.
fn read_local_line() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
