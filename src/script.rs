//! Script plans: the validated input of the pipeline
//!
//! Generated scripts arrive as loosely shaped JSON. Each video kind has its
//! own wire schema; [`ScriptPlan::parse`] validates against it and yields an
//! immutable plan, or a [`ScriptError`] describing what is wrong.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Video kind produced from a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoKind {
    /// Portrait short with centered captions, several footage switches
    Short,
    /// Landscape long-form with lower-third captions
    Long,
    /// Portrait narrated story over a single background asset
    Story,
}

impl VideoKind {
    /// Final artifact file name
    #[must_use]
    pub fn output_file_name(&self) -> &'static str {
        match self {
            Self::Short => "shortVideo.mp4",
            Self::Long => "longVideo.mp4",
            Self::Story => "story.mp4",
        }
    }

    /// Intermediate segment file name for part `index`
    #[must_use]
    pub fn segment_file_name(&self, index: usize) -> String {
        match self {
            Self::Short => format!("segment_{index}.mp4"),
            Self::Long => format!("long_segment_{index}.mp4"),
            Self::Story => format!("story_segment_{index}.mp4"),
        }
    }

    /// File-name prefix for per-part temp files (audio, clips, captions)
    #[must_use]
    pub fn part_prefix(&self) -> &'static str {
        match self {
            Self::Short => "shortVideoPart",
            Self::Long => "longVideoPart",
            Self::Story => "storyPart",
        }
    }

    /// Which kind to make next given the last one produced.
    ///
    /// Stories alternate with shorts; with no history a short comes first.
    #[must_use]
    pub fn alternate_after(last: Option<VideoKind>) -> VideoKind {
        match last {
            Some(VideoKind::Story) | None => VideoKind::Short,
            Some(_) => VideoKind::Story,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
            Self::Story => "story",
        }
    }
}

impl fmt::Display for VideoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoKind {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" | "fact" => Ok(Self::Short),
            "long" | "topic" => Ok(Self::Long),
            "story" => Ok(Self::Story),
            other => Err(ScriptError::UnknownKind(other.to_string())),
        }
    }
}

/// One narrated section; drives exactly one segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPart {
    pub text: String,
    pub keywords: Vec<String>,
}

/// Descriptive fields carried alongside the parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptMetadata {
    /// The fact (short), topic (long) or title (story)
    pub headline: Option<String>,
    pub description: Option<String>,
}

/// Validated, immutable script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptPlan {
    kind: VideoKind,
    parts: Vec<ScriptPart>,
    metadata: ScriptMetadata,
}

/// Script validation errors
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown video kind `{0}` (expected short, long or story)")]
    UnknownKind(String),

    #[error("script is not a JSON object")]
    NotAnObject,

    #[error("missing `script` field")]
    MissingScript,

    #[error("{kind} scripts need {expected}, found {found}")]
    WrongShape {
        kind: VideoKind,
        expected: &'static str,
        found: &'static str,
    },

    #[error("script has no parts")]
    NoParts,

    #[error("part {index} has empty text")]
    EmptyText { index: usize },

    #[error("part {index}: {message}")]
    InvalidPart { index: usize, message: String },
}

/// Wire shape of one part in short/long scripts
#[derive(Debug, Deserialize)]
struct PartWire {
    text: String,
    #[serde(default, alias = "keywords")]
    keyword: KeywordWire,
}

/// `keyword` may be a list or a single string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeywordWire {
    Many(Vec<String>),
    One(String),
}

impl Default for KeywordWire {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl KeywordWire {
    fn into_keywords(self) -> Vec<String> {
        let raw = match self {
            Self::Many(list) => list,
            Self::One(single) => vec![single],
        };
        raw.into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn optional_string(object: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl ScriptPlan {
    /// Parse and validate a script of a known kind
    pub fn parse(kind: VideoKind, input: &str) -> Result<Self, ScriptError> {
        let value: Value = serde_json::from_str(input)?;
        Self::from_value(kind, value)
    }

    /// Parse a script, inferring its kind from the JSON shape.
    ///
    /// A string `script` means a story; otherwise `topic` marks a long video
    /// and anything else is treated as a short.
    pub fn parse_detect(input: &str) -> Result<Self, ScriptError> {
        let value: Value = serde_json::from_str(input)?;
        let kind = Self::detect_kind(&value)?;
        Self::from_value(kind, value)
    }

    fn detect_kind(value: &Value) -> Result<VideoKind, ScriptError> {
        let object = value.as_object().ok_or(ScriptError::NotAnObject)?;
        let script = object.get("script").ok_or(ScriptError::MissingScript)?;
        if script.is_string() {
            Ok(VideoKind::Story)
        } else if object.contains_key("topic") {
            Ok(VideoKind::Long)
        } else {
            Ok(VideoKind::Short)
        }
    }

    fn from_value(kind: VideoKind, value: Value) -> Result<Self, ScriptError> {
        let Value::Object(mut object) = value else {
            return Err(ScriptError::NotAnObject);
        };
        let script = object.remove("script").ok_or(ScriptError::MissingScript)?;

        let headline_key = match kind {
            VideoKind::Short => "fact",
            VideoKind::Long => "topic",
            VideoKind::Story => "title",
        };
        let metadata = ScriptMetadata {
            headline: optional_string(&object, headline_key),
            description: optional_string(&object, "description"),
        };

        let parts = match (kind, script) {
            (VideoKind::Story, Value::String(text)) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(ScriptError::EmptyText { index: 0 });
                }
                vec![ScriptPart {
                    text,
                    keywords: Vec::new(),
                }]
            }
            (VideoKind::Story, other) => {
                return Err(ScriptError::WrongShape {
                    kind,
                    expected: "a string `script`",
                    found: json_type_name(&other),
                })
            }
            (_, Value::Array(items)) => Self::parse_parts(items)?,
            (_, other) => {
                return Err(ScriptError::WrongShape {
                    kind,
                    expected: "an array `script`",
                    found: json_type_name(&other),
                })
            }
        };

        Ok(Self {
            kind,
            parts,
            metadata,
        })
    }

    fn parse_parts(items: Vec<Value>) -> Result<Vec<ScriptPart>, ScriptError> {
        if items.is_empty() {
            return Err(ScriptError::NoParts);
        }

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let wire: PartWire =
                    serde_json::from_value(item).map_err(|e| ScriptError::InvalidPart {
                        index,
                        message: e.to_string(),
                    })?;
                let text = wire.text.trim().to_string();
                if text.is_empty() {
                    return Err(ScriptError::EmptyText { index });
                }
                Ok(ScriptPart {
                    text,
                    keywords: wire.keyword.into_keywords(),
                })
            })
            .collect()
    }

    #[must_use]
    pub fn kind(&self) -> VideoKind {
        self.kind
    }

    #[must_use]
    pub fn parts(&self) -> &[ScriptPart] {
        &self.parts
    }

    #[must_use]
    pub fn metadata(&self) -> &ScriptMetadata {
        &self.metadata
    }
}
