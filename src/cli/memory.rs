//! CLI memory commands: save, search, forget, forget-all, backfill.

use anyhow::{bail, Result};
use indicatif::ProgressBar;
use std::io::Write;
use std::time::Duration;

use recollect::app::App;
use recollect::memory::recall::RecallStrategy;

pub async fn save(app: &App, text: &str) -> Result<()> {
    let record = app.memory.remember(app.owner(), text).await?;
    println!("Saved {}: {}", record.id, record.content);
    Ok(())
}

/// Run a recall from the terminal and print the ranked results.
pub async fn search(app: &App, query: &str, json: bool) -> Result<()> {
    let response = app.memory.recall(app.owner(), query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    let label = match response.strategy {
        RecallStrategy::Semantic => "semantic",
        RecallStrategy::Keyword => "keyword",
        RecallStrategy::RecentFallback => "recent",
        RecallStrategy::Nothing => "none",
    };
    println!("Found {} result(s) ({label} match)\n", response.results.len());

    for (i, result) in response.results.iter().enumerate() {
        println!(
            "  {}. {} (similarity: {:.3}, score: {:.3}, saved {})",
            i + 1,
            result.id,
            result.similarity,
            result.final_score,
            result.created_at.format("%Y-%m-%d %H:%M"),
        );
        println!("     {}", preview(&result.content, 120));
        println!();
    }

    Ok(())
}

pub fn forget(app: &App, id: &str) -> Result<()> {
    if app.memory.forget(id)? {
        println!("Forgot {id}.");
    } else {
        println!("No memory with id {id}.");
    }
    Ok(())
}

/// Delete every memory of the default owner after confirmation.
pub fn forget_all(app: &App, confirmed: bool) -> Result<()> {
    if !confirmed {
        println!("WARNING: This will permanently delete ALL memories of '{}'.", app.owner());
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if input.trim() != "YES" {
            bail!("forget-all cancelled");
        }
    }

    let deleted = app.memory.forget_all(app.owner())?;
    println!("Deleted {deleted} memories.");
    Ok(())
}

/// Embed memories saved while the primary provider was unavailable.
pub async fn backfill(app: &App) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_message("re-embedding memories");
    pb.enable_steady_tick(Duration::from_millis(120));

    let report = app.memory.backfill_embeddings(app.owner()).await;
    pb.finish_and_clear();
    let report = report?;

    println!("Embedded {} memories.", report.embedded);
    if report.failed > 0 {
        println!(
            "{} memories could not be embedded; check the provider and run backfill again.",
            report.failed
        );
    }
    Ok(())
}

fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content.to_string(),
    }
}
