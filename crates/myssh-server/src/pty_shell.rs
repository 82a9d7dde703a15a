//! Interactive mode: a pseudo-terminal with a local shell on the slave
//! side, relayed to the client as raw ciphered bytes in both directions.
//! The remote shell owns line editing, job control and prompt rendering;
//! this relay interprets nothing.

use anyhow::Result;
use std::os::unix::io::{AsRawFd, OwnedFd};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use myssh_core::spawn_shell_pty;
use myssh_protocol::BUFFER_SIZE;

use crate::session::Session;

pub async fn run_pty_shell(mut session: Session) -> Result<()> {
    let (master, child) = spawn_shell_pty(&session.username)?;
    tracing::info!(
        "PTY relay started for '{}' (shell pid {})",
        session.username(),
        child
    );

    nix::fcntl::fcntl(
        master.as_raw_fd(),
        nix::fcntl::FcntlArg::F_SETFL(nix::fcntl::OFlag::O_NONBLOCK),
    )?;
    let pty = AsyncFd::new(master)?;

    let mut sock_buf = [0u8; BUFFER_SIZE];
    let mut pty_buf = [0u8; BUFFER_SIZE];

    loop {
        tokio::select! {
            // Client keystrokes: decrypt, forward to the shell.
            result = session.reader.read(&mut sock_buf) => {
                match result {
                    Ok(0) => {
                        tracing::info!("Client disconnected (EOF)");
                        break;
                    }
                    Ok(n) => {
                        let chunk = &mut sock_buf[..n];
                        session.recv.apply(chunk);
                        write_pty(&pty, chunk).await?;
                    }
                    Err(e) => {
                        tracing::warn!("Socket read error: {}", e);
                        break;
                    }
                }
            }

            // Shell output: encrypt, forward to the client.
            guard = pty.readable() => {
                let mut guard = guard?;
                match guard.try_io(|inner| {
                    nix::unistd::read(inner.as_raw_fd(), &mut pty_buf)
                        .map_err(std::io::Error::from)
                }) {
                    Ok(Ok(0)) => {
                        tracing::info!("Shell exited, closing session");
                        break;
                    }
                    Ok(Ok(n)) => {
                        let chunk = &mut pty_buf[..n];
                        session.send.apply(chunk);
                        session.writer.write_all(chunk).await?;
                    }
                    Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Ok(Err(e)) => {
                        tracing::warn!("PTY read error: {}", e);
                        break;
                    }
                    Err(_) => continue,
                }
            }
        }
    }

    // Dropping the master hangs up the shell; the SIGCHLD reaper collects
    // the child.
    Ok(())
}

/// Write a full buffer to the non-blocking PTY master, waiting for
/// writability between short writes.
async fn write_pty(pty: &AsyncFd<OwnedFd>, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let mut guard = pty.writable().await?;
        match guard.try_io(|inner| {
            nix::unistd::write(inner.get_ref(), data).map_err(std::io::Error::from)
        }) {
            Ok(Ok(n)) => data = &data[n..],
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => continue,
        }
    }
    Ok(())
}
