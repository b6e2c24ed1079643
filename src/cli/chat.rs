use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::assistants::retrieve_assistant;
use crate::chat::ChatSession;
use crate::core::AppConfig;

pub async fn run() -> Result<()> {
    let mut rl = DefaultEditor::new().expect("Editor failed");
    let config = AppConfig::default();

    // Fail fast on a bad assistant id and report who we are talking to
    let assistant = retrieve_assistant(
        &config.api_hostname,
        &config.api_key,
        &config.assistant_id,
    )
    .await?;
    tracing::info!(
        "Using assistant {} ({})",
        assistant.name.as_deref().unwrap_or(&assistant.id),
        assistant.model
    );

    let mut session = ChatSession::start(
        &config.api_hostname,
        &config.api_key,
        &config.assistant_id,
    )
    .await?;
    println!("{}", config.greeting);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                // Blank input is not a turn
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match session.send_turn(line).await {
                    Ok(reply) => println!("{}", reply),
                    Err(err) => {
                        tracing::error!("Turn failed: {}", err);
                        // The session stays usable: the thread survives a
                        // failed turn
                        println!("{}", err.user_message());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
