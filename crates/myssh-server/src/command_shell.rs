use anyhow::Result;

use myssh_shell::parse_input;

use crate::exec::run_pipeline;
use crate::session::Session;

/// The structured command shell: prompt, read one decrypted line, parse it
/// into pipelines, execute them in order. Parse leniency means malformed
/// input simply yields nothing to run; only transport errors end the loop.
pub async fn run_command_shell(mut session: Session) -> Result<()> {
    tracing::info!("Command shell started for '{}'", session.username());

    loop {
        session.send_prompt().await?;

        let Some(line) = session.read_line().await? else {
            tracing::info!("Client disconnected (EOF)");
            break;
        };

        if line == "exit" {
            tracing::info!("'{}' requested exit", session.username());
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        tracing::debug!("Command line: {:?}", line);
        for pipeline in parse_input(&line) {
            run_pipeline(&mut session, &pipeline).await?;
        }
    }

    Ok(())
}
