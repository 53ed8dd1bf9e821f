//! CLI `ask` command: send one utterance through the assistant.

use anyhow::Result;

use recollect::app::App;

pub async fn ask(app: &App, text: &str, json: bool) -> Result<()> {
    let reply = app.assistant.handle(app.owner(), text).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        println!("{}", reply.message());
    }
    Ok(())
}
