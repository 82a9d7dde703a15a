//! Pipeline executor: realizes a parsed pipeline as a graph of OS processes
//! connected by pipes, streaming the tail's output back through the session
//! cipher.
//!
//! All stages are spawned before any is waited on, so an intermediate stage
//! that outgrows the kernel pipe buffer cannot deadlock the pipeline. The
//! final stage's stdout feeds a capture pipe read by the session, unless an
//! explicit output file or the background flag overrides it.

use anyhow::Result;
use std::os::unix::io::OwnedFd;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command as OsCommand};

use myssh_protocol::BUFFER_SIZE;
use myssh_shell::Pipeline;

use crate::session::Session;

pub async fn run_pipeline(session: &mut Session, pipeline: &Pipeline) -> Result<()> {
    let total = pipeline.commands.len();
    let mut prev_read: Option<OwnedFd> = None;
    let mut waiting: Vec<(String, Child)> = Vec::new();
    let mut capture = None;

    for (index, cmd) in pipeline.commands.iter().enumerate() {
        let last = index + 1 == total;

        // Pipe feeding the next stage's stdin. Created even for stages that
        // end up not spawning (cd, open/spawn failures): dropping the write
        // end gives the next stage a clean EOF instead of a dangling fd.
        let mut stage_stdout: Option<Stdio> = None;
        let mut next_read: Option<OwnedFd> = None;
        if !last {
            match nix::unistd::pipe() {
                Ok((read_end, write_end)) => {
                    next_read = Some(read_end);
                    stage_stdout = Some(Stdio::from(write_end));
                }
                Err(e) => {
                    tracing::warn!("pipe() failed: {}", e);
                    session.send_message("Error: Failed to create pipe\n").await?;
                    return Ok(());
                }
            }
        }

        let stdin_pipe = prev_read.take();
        prev_read = next_read;

        // `cd` is a built-in: no process, only the session's own PWD moves.
        if cmd.args[0] == "cd" {
            if let Err(e) = session.env.change_dir(cmd.args.get(1).map(String::as_str)) {
                session.send_message(&format!("{}\n", e)).await?;
            }
            continue;
        }

        let mut command = OsCommand::new(&cmd.args[0]);
        command.args(&cmd.args[1..]);
        command.env_clear().envs(session.env.vars());
        command.current_dir(session.env.cwd());

        // A pipe inherited from the previous stage wins over a requested
        // input file; only the head of a pipeline reads from a file.
        if let Some(fd) = stdin_pipe {
            command.stdin(Stdio::from(fd));
        } else if let Some(path) = &cmd.input_file {
            match std::fs::File::open(session.env.resolve(path)) {
                Ok(file) => {
                    command.stdin(Stdio::from(file));
                }
                Err(e) => {
                    tracing::debug!("open input file '{}' failed: {}", path, e);
                    session
                        .send_message(&format!("Error: cannot open input file '{}'\n", path))
                        .await?;
                    continue;
                }
            }
        }

        // Stdout precedence: inter-stage pipe, then explicit file, then the
        // capture pipe; background commands keep the server's own stdio and
        // never stream anything back.
        if let Some(stdio) = stage_stdout {
            command.stdout(stdio);
        } else if let Some(path) = &cmd.output_file {
            let mut options = std::fs::OpenOptions::new();
            options.write(true).create(true);
            if cmd.append_output {
                options.append(true);
            } else {
                options.truncate(true);
            }
            match options.open(session.env.resolve(path)) {
                Ok(file) => {
                    command.stdout(Stdio::from(file));
                }
                Err(e) => {
                    tracing::debug!("open output file '{}' failed: {}", path, e);
                    session
                        .send_message(&format!("Error: cannot open output file '{}'\n", path))
                        .await?;
                    continue;
                }
            }
        } else if cmd.background {
            command.stdout(Stdio::inherit());
        } else {
            command.stdout(Stdio::piped());
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!("spawn '{}' failed: {}", cmd.args[0], e);
                session
                    .send_message(&format!(
                        "Error: Command '{}' failed to execute\n",
                        cmd.args[0]
                    ))
                    .await?;
                continue;
            }
        };

        if cmd.background {
            tracing::info!("Backgrounded '{}' (pid {:?})", cmd.args[0], child.id());
            // Never waited on; the runtime reaps it when it exits.
            continue;
        }

        if last {
            capture = child.stdout.take();
        }
        waiting.push((cmd.args[0].clone(), child));
    }

    // Stream the capture pipe chunk by chunk as output is produced, so
    // long-running commands render progressively on the client.
    if let Some(mut output) = capture {
        let mut buf = [0u8; BUFFER_SIZE];
        loop {
            let n = output.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            session.send_ciphered(&buf[..n]).await?;
        }
    }

    // Collect exit statuses in declaration order. A non-zero status is a
    // one-line report, never fatal to the session.
    for (name, mut child) in waiting {
        let status = child.wait().await?;
        if let Some(code) = status.code() {
            if code != 0 {
                tracing::debug!("'{}' exited with status {}", name, code);
                session
                    .send_message(&format!("Command exited with status {}\n", code))
                    .await?;
            }
        }
    }

    Ok(())
}
