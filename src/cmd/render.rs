use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use reelsmith::footage::{DirectoryFallback, HttpFetcher, PexelsProvider};
use reelsmith::pipeline::{Collaborators, JsonContentHistory, PipelineOrchestrator};
use reelsmith::render::{FfprobeProbe, SystemFfmpeg};
use reelsmith::speech::EdgeTts;
use reelsmith::{ScriptPlan, VideoKind};

pub async fn cmd_render(
    script: &Path,
    kind: Option<&str>,
    config_path: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<()> {
    let input = tokio::fs::read_to_string(script)
        .await
        .with_context(|| format!("failed to read {}", script.display()))?;
    let plan = match kind {
        Some(kind) => ScriptPlan::parse(kind.parse::<VideoKind>()?, &input)?,
        None => ScriptPlan::parse_detect(&input)?,
    };

    let mut config = super::load_config(config_path)?;
    if let Some(dir) = output_dir {
        config.paths.output_dir = dir.to_path_buf();
    }
    config.ensure_dirs()?;

    let ffmpeg = SystemFfmpeg::new();
    if !ffmpeg.check_available().await {
        anyhow::bail!("ffmpeg not found at {} (run `reelsmith check`)", ffmpeg.path());
    }

    println!(
        "🎬 Rendering {} video: {} parts",
        plan.kind(),
        plan.parts().len()
    );

    let collaborators = Collaborators {
        speech: Arc::new(EdgeTts::from_settings(&config.speech)),
        provider: Arc::new(PexelsProvider::from_env()?),
        fetcher: Arc::new(HttpFetcher::new()?),
        probe: Arc::new(FfprobeProbe::new()),
        ffmpeg: Arc::new(ffmpeg),
        fallback: Arc::new(DirectoryFallback),
        history: Some(Arc::new(JsonContentHistory::new(
            config.paths.history_dir.clone(),
        ))),
    };

    let start = Instant::now();
    let mut pipeline = PipelineOrchestrator::new(config, collaborators);
    match pipeline.run(&plan).await {
        Ok(report) => {
            println!("✅ Done in {:.1}s\n", start.elapsed().as_secs_f64());
            print!("{}", report.summary());
            Ok(())
        }
        Err(e) => {
            println!("❌ {e}");
            for outcome in &e.outcomes {
                if let reelsmith::pipeline::PartOutcome::Skipped { index, reason } = outcome {
                    println!("   part {index}: {reason}");
                }
            }
            Err(e.into())
        }
    }
}
