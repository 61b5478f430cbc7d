use std::path::Path;

use anyhow::Result;

use reelsmith::config::{config_path, PEXELS_API_KEY_ENV};
use reelsmith::render::{FfprobeProbe, SystemFfmpeg};

pub async fn cmd_check(config: Option<&Path>) -> Result<()> {
    println!("🧪 reelsmith environment check\n");
    let mut ok = true;

    let shown = config.map_or_else(config_path, Path::to_path_buf);
    let config = super::load_config(config)?;
    println!("📄 Config: {}", shown.display());

    let ffmpeg = SystemFfmpeg::new();
    if ffmpeg.check_available().await {
        println!("✅ ffmpeg: {}", ffmpeg.path());
    } else {
        println!("❌ ffmpeg not found ({})", ffmpeg.path());
        ok = false;
    }

    let ffprobe = FfprobeProbe::new();
    if ffprobe.check_available().await {
        println!("✅ ffprobe: {}", ffprobe.path());
    } else {
        println!("❌ ffprobe not found ({})", ffprobe.path());
        ok = false;
    }

    if std::env::var(PEXELS_API_KEY_ENV).is_ok() {
        println!("✅ {PEXELS_API_KEY_ENV} is set");
    } else {
        println!("❌ {PEXELS_API_KEY_ENV} is not set");
        ok = false;
    }

    let font = &config.video.font;
    if font.is_file() {
        println!("✅ Caption font: {}", font.display());
    } else {
        println!("⚠️  Caption font missing: {}", font.display());
    }

    let background = &config.paths.background_dir;
    if background.is_dir() {
        println!("✅ Fallback footage: {}", background.display());
    } else {
        println!("⚠️  No fallback footage directory: {}", background.display());
    }

    println!();
    if ok {
        println!("Ready to render.");
        Ok(())
    } else {
        anyhow::bail!("environment is not ready")
    }
}
