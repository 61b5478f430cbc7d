use std::path::Path;

use anyhow::Result;

use reelsmith::render::FfprobeProbe;
use reelsmith::speech::{narrate, EdgeTts};
use reelsmith::timeline::cue_sheet;
use reelsmith::ResourceTracker;

pub async fn cmd_cues(text: &str, voice: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(voice) = voice {
        config.speech.voice = voice.to_string();
    }

    let audio_path =
        std::env::temp_dir().join(format!("reelsmith-cues-{}.mp3", uuid::Uuid::new_v4()));
    let mut tracker = ResourceTracker::new("cues");
    tracker.track_temp(&audio_path);

    let tts = EdgeTts::from_settings(&config.speech);
    println!("🗣️  Voice: {}", tts.voice());
    let narration = narrate(&tts, &FfprobeProbe::new(), text, &audio_path).await?;

    println!(
        "⏱️  {:.2}s of audio, {} cues\n",
        narration.audio.duration.as_secs_f64(),
        narration.cues.len()
    );
    print!("{}", cue_sheet(&narration.cues));

    tracker.release_all();
    Ok(())
}
