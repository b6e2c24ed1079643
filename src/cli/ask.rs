use anyhow::Result;

use crate::chat::ChatSession;
use crate::core::AppConfig;

/// One-shot turn: create a session, send the message, print the reply.
pub async fn run(message: &str) -> Result<()> {
    let config = AppConfig::default();

    let mut session = ChatSession::start(
        &config.api_hostname,
        &config.api_key,
        &config.assistant_id,
    )
    .await?;

    match session.send_turn(message).await {
        Ok(reply) => println!("{}", reply),
        Err(err) => {
            tracing::error!("Turn failed: {}", err);
            println!("{}", err.user_message());
        }
    }

    Ok(())
}
