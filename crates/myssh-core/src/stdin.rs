//! Blocking stdin bridged into the async session loop.
//!
//! Raw-mode keystrokes arrive on the process's stdin, which tokio cannot
//! poll directly without stealing the fd. A dedicated thread select()s on
//! stdin plus a shutdown pipe and forwards each chunk over an unbounded
//! channel; dropping a byte into the pipe wakes the thread for a clean exit.

use anyhow::Result;
use std::os::unix::io::{AsRawFd, BorrowedFd, OwnedFd};
use std::thread::JoinHandle;
use tokio::sync::mpsc;

use myssh_protocol::BUFFER_SIZE;

pub struct StdinReader {
    handle: JoinHandle<()>,
    shutdown_write: OwnedFd,
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl StdinReader {
    pub fn start() -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (shutdown_read, shutdown_write) = nix::unistd::pipe()?;

        let handle = std::thread::spawn(move || {
            use nix::sys::select::{select, FdSet};

            let stdin_fd = std::io::stdin().as_raw_fd();
            let mut buf = [0u8; BUFFER_SIZE];

            loop {
                let mut read_fds = FdSet::new();
                let stdin_borrowed = unsafe { BorrowedFd::borrow_raw(stdin_fd) };
                let shutdown_borrowed =
                    unsafe { BorrowedFd::borrow_raw(shutdown_read.as_raw_fd()) };
                read_fds.insert(stdin_borrowed);
                read_fds.insert(shutdown_borrowed);

                match select(None, Some(&mut read_fds), None, None, None) {
                    Ok(_) => {
                        if read_fds.contains(shutdown_borrowed) {
                            tracing::debug!("Stdin thread received shutdown signal");
                            break;
                        }

                        if read_fds.contains(stdin_borrowed) {
                            match nix::unistd::read(stdin_fd, &mut buf) {
                                Ok(0) => {
                                    tracing::debug!("Stdin EOF");
                                    break;
                                }
                                Ok(n) => {
                                    if tx.send(buf[..n].to_vec()).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    tracing::error!("Stdin read error: {}", e);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("select() error in stdin thread: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(StdinReader {
            handle,
            shutdown_write,
            receiver: rx,
        })
    }

    /// Receive the next chunk of stdin bytes; `None` once stdin hit EOF and
    /// the thread exited.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }

    /// Wake the reader thread and join it.
    pub async fn shutdown(self) -> Result<()> {
        if let Err(e) = nix::unistd::write(&self.shutdown_write, &[1u8]) {
            tracing::warn!("Failed to signal stdin thread shutdown: {}", e);
        }

        match tokio::task::spawn_blocking(move || self.handle.join()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => anyhow::bail!("stdin thread panicked: {:?}", e),
            Err(e) => anyhow::bail!("failed to join stdin thread: {}", e),
        }
    }
}
