pub mod command_shell;
pub mod exec;
pub mod pty_shell;
pub mod session;

pub use session::{authenticate, Session};

use anyhow::Result;
use std::path::PathBuf;
use tokio::net::{TcpListener, TcpStream};

use myssh_auth::CredentialStore;

/// Which shell variant every connection gets. Fixed for the lifetime of the
/// server process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellMode {
    /// Structured command shell: parse lines into pipelines and execute.
    Pipeline,
    /// Raw relay to an interactive shell on a pseudo-terminal.
    Interactive,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub users_file: PathBuf,
    pub mode: ShellMode,
}

/// Bind the listening socket and serve forever.
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(
        "Server listening on port {} ({:?} mode)",
        config.port,
        config.mode
    );
    serve(listener, config).await
}

/// Accept loop over an already-bound listener (separated out so tests can
/// bind an ephemeral port). One independent task per connection; a session
/// failure is logged and never takes the server down.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    if config.mode == ShellMode::Interactive {
        // forkpty children are not tokio-managed, so PTY mode needs its own
        // reaper. Pipeline mode must NOT run one: a global waitpid would
        // steal exit statuses from tokio::process children.
        spawn_zombie_reaper();
    }

    let store = CredentialStore::new(&config.users_file);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::info!("New client connected from {}", addr);
                let store = store.clone();
                let mode = config.mode;
                tokio::spawn(async move {
                    match handle_connection(stream, mode, store).await {
                        Ok(()) => tracing::info!("Client disconnected gracefully"),
                        Err(e) => tracing::warn!("Client disconnected with error: {}", e),
                    }
                });
            }
            Err(e) => {
                tracing::error!("Failed to accept client connection: {}", e);
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    mode: ShellMode,
    store: CredentialStore,
) -> Result<()> {
    let Some((username, password)) = authenticate(&mut stream, &store).await? else {
        return Ok(());
    };
    tracing::info!("Authenticated '{}'", username);

    let session = Session::new(stream, username, password)?;
    match mode {
        ShellMode::Pipeline => command_shell::run_command_shell(session).await,
        ShellMode::Interactive => pty_shell::run_pty_shell(session).await,
    }
}

fn spawn_zombie_reaper() {
    tokio::spawn(async move {
        use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigchld = match signal(SignalKind::child()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!("Failed to install SIGCHLD listener: {}", e);
                return;
            }
        };

        while sigchld.recv().await.is_some() {
            loop {
                match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                    Ok(WaitStatus::Exited(pid, status)) => {
                        tracing::info!("Reaped shell process {} (exit status {})", pid, status);
                    }
                    Ok(WaitStatus::Signaled(pid, sig, _)) => {
                        tracing::info!("Reaped shell process {} (signal {})", pid, sig);
                    }
                    Ok(WaitStatus::StillAlive) => break,
                    Err(nix::errno::Errno::ECHILD) => break,
                    Err(e) => {
                        tracing::error!("waitpid error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    });
}
