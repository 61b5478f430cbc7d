//! ASS caption files built from narration cues

use std::fmt::Write as FmtWrite;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::fs;

use super::{CaptionLayout, Resolution};
use crate::timeline::Cue;

/// One `[V4+ Styles]` entry
#[derive(Debug, Clone, PartialEq)]
pub struct AssStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    /// Primary color (AABBGGRR format for ASS)
    pub primary_color: String,
    pub outline_color: String,
    pub back_color: String,
    pub bold: bool,
    pub outline: f32,
    pub shadow: f32,
    /// Alignment (numpad style: 1-9)
    pub alignment: u8,
    pub margin_h: u32,
    pub margin_v: u32,
}

impl AssStyle {
    /// White captions with a black outline, placed per `layout`
    #[must_use]
    pub fn caption(font_name: &str, layout: &CaptionLayout, frame: Resolution) -> Self {
        Self {
            name: "Caption".to_string(),
            font_name: font_name.to_string(),
            font_size: layout.font_size,
            primary_color: "&H00FFFFFF".to_string(),
            outline_color: "&H00000000".to_string(),
            back_color: "&H80000000".to_string(),
            bold: false,
            outline: 3.0,
            shadow: 0.0,
            alignment: layout.position.to_ass_alignment(),
            margin_h: 40,
            margin_v: layout.position.vertical_margin(frame.height),
        }
    }

    fn to_ass_line(&self) -> String {
        format!(
            "Style: {},{},{},{},&H000000FF,{},{},{},0,0,0,100,100,0,0,1,{},{},{},{},{},{},1",
            self.name,
            self.font_name,
            self.font_size,
            self.primary_color,
            self.outline_color,
            self.back_color,
            if self.bold { -1 } else { 0 },
            self.outline,
            self.shadow,
            self.alignment,
            self.margin_h,
            self.margin_h,
            self.margin_v
        )
    }
}

/// Builds the ASS document for one segment's captions
#[derive(Debug, Clone)]
pub struct AssGenerator {
    pub resolution: Resolution,
    pub style: AssStyle,
    pub title: String,
}

impl AssGenerator {
    #[must_use]
    pub fn new(resolution: Resolution, style: AssStyle) -> Self {
        Self {
            resolution,
            style,
            title: "reelsmith captions".to_string(),
        }
    }

    fn header(&self) -> std::result::Result<String, std::fmt::Error> {
        let mut header = String::new();

        writeln!(header, "[Script Info]")?;
        writeln!(header, "Title: {}", self.title)?;
        writeln!(header, "ScriptType: v4.00+")?;
        writeln!(header, "PlayResX: {}", self.resolution.width)?;
        writeln!(header, "PlayResY: {}", self.resolution.height)?;
        writeln!(header, "WrapStyle: 0")?;
        writeln!(header, "ScaledBorderAndShadow: yes")?;
        writeln!(header)?;

        writeln!(header, "[V4+ Styles]")?;
        writeln!(
            header,
            "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
             OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, \
             ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, \
             MarginL, MarginR, MarginV, Encoding"
        )?;
        writeln!(header, "{}", self.style.to_ass_line())?;
        writeln!(header)?;

        writeln!(header, "[Events]")?;
        writeln!(
            header,
            "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
        )?;

        Ok(header)
    }

    /// Render cues as dialogue lines, one per cue, in cue order
    pub fn generate(&self, cues: &[Cue]) -> Result<String> {
        let mut output = self.header()?;

        for cue in cues {
            writeln!(
                output,
                "Dialogue: 0,{},{},{},,0,0,0,,{}",
                format_ass_time(cue.start),
                format_ass_time(cue.end),
                self.style.name,
                escape_ass_text(&cue.text)
            )?;
        }

        Ok(output)
    }

    pub async fn write_to_file(&self, cues: &[Cue], path: &Path) -> Result<()> {
        let content = self.generate(cues)?;
        fs::write(path, content)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Format a duration as an ASS timestamp (H:MM:SS.cc)
#[must_use]
pub fn format_ass_time(duration: Duration) -> String {
    let ms = duration.as_millis();
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let centis = (ms % 1000) / 10;
    format!("{hours}:{minutes:02}:{seconds:02}.{centis:02}")
}

fn escape_ass_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('\n', "\\N")
}

/// Font family name for a font file (`Lobster-Regular.ttf` -> `Lobster`)
#[must_use]
pub fn font_family(font: &Path) -> String {
    font.file_stem()
        .map(|stem| stem.to_string_lossy())
        .and_then(|stem| stem.split('-').next().map(str::to_string))
        .filter(|family| !family.is_empty())
        .unwrap_or_else(|| "Arial".to_string())
}
