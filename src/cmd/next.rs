use std::path::Path;

use anyhow::Result;

use reelsmith::pipeline::{ContentHistory, JsonContentHistory};
use reelsmith::VideoKind;

pub async fn cmd_next(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let history = JsonContentHistory::new(config.paths.history_dir.clone());

    let last = history.last_kind().await?;
    let next = VideoKind::alternate_after(last);
    match last {
        Some(last) => println!("Last run: {last}"),
        None => println!("Last run: none recorded"),
    }
    println!("Next: {next}");

    let used = history.entries(next).await?;
    if !used.is_empty() {
        println!("\n{} {next} headlines already used:", used.len());
        for headline in used.iter().rev().take(10) {
            println!("  - {headline}");
        }
    }
    Ok(())
}
