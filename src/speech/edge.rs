//! Microsoft Edge read-aloud speech synthesis
//!
//! Protocol summary:
//!
//! 1. Connect to the read-aloud WebSocket with the trusted client token and a
//!    `Sec-MS-GEC` token (SHA-256 of the current 5-minute Windows file time
//!    window and the client token).
//! 2. Send a `speech.config` text message enabling word boundary metadata and
//!    selecting MP3 output.
//! 3. Send the SSML request.
//! 4. Receive `audio.metadata` text frames (word boundaries) and binary
//!    `audio` frames until `turn.end`.
//!
//! Binary frames carry a 2-byte big-endian header length, the headers, then
//! the audio payload.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use super::socket::{Frame, SpeechSocket};
use super::{SpeechChunk, SpeechStream, SpeechSynthesizer};
use crate::config::SpeechSettings;
use crate::timeline::BoundaryEvent;

const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";
const ENDPOINT: &str = "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";
const GEC_VERSION: &str = "1-130.0.2849.68";
const ORIGIN: &str = "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0";
const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Seconds between 1601-01-01 and 1970-01-01
const WIN_EPOCH_OFFSET: u64 = 11_644_473_600;
const RECV_TIMEOUT: Duration = Duration::from_secs(30);

/// Edge read-aloud client
#[derive(Debug, Clone)]
pub struct EdgeTts {
    voice: String,
    rate: String,
    volume: String,
    pitch: String,
}

impl EdgeTts {
    #[must_use]
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            rate: "+0%".to_string(),
            volume: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
        }
    }

    /// Client for the configured voice and rate
    #[must_use]
    pub fn from_settings(settings: &SpeechSettings) -> Self {
        Self::new(settings.voice.clone()).with_rate(settings.rate.clone())
    }

    /// Speaking rate adjustment such as `+10%`
    #[must_use]
    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = rate.into();
        self
    }

    #[must_use]
    pub fn voice(&self) -> &str {
        &self.voice
    }

    fn ssml(&self, text: &str) -> String {
        format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
             <voice name='{}'><prosody pitch='{}' rate='{}' volume='{}'>{}</prosody></voice></speak>",
            full_voice_name(&self.voice),
            self.pitch,
            self.rate,
            self.volume,
            escape_xml(text)
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTts {
    #[instrument(skip_all, fields(chars = text.len()))]
    async fn synthesize(&self, text: &str) -> Result<SpeechStream> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock before 1970")?;
        let url = format!(
            "{ENDPOINT}?TrustedClientToken={TRUSTED_CLIENT_TOKEN}&Sec-MS-GEC={}\
             &Sec-MS-GEC-Version={GEC_VERSION}&ConnectionId={}",
            sec_ms_gec(now.as_secs()),
            connection_id()
        );
        let headers = [
            ("Origin", ORIGIN.to_string()),
            ("User-Agent", USER_AGENT.to_string()),
            ("Pragma", "no-cache".to_string()),
            ("Cache-Control", "no-cache".to_string()),
            ("Accept-Encoding", "gzip, deflate, br".to_string()),
            ("Accept-Language", "en-US,en;q=0.9".to_string()),
        ];

        let mut socket = SpeechSocket::connect(&url, &headers).await?;
        let timestamp = js_timestamp();
        socket.send_text(config_message(&timestamp)).await?;
        socket
            .send_text(ssml_message(&connection_id(), &timestamp, &self.ssml(text)))
            .await?;
        info!("Speech request sent");

        let session = Session {
            socket,
            pending: VecDeque::new(),
            finished: false,
        };
        Ok(futures::stream::unfold(session, Session::next_chunk).boxed())
    }
}

struct Session {
    socket: SpeechSocket,
    pending: VecDeque<SpeechChunk>,
    finished: bool,
}

impl Session {
    async fn next_chunk(mut self) -> Option<(Result<SpeechChunk>, Self)> {
        loop {
            if let Some(chunk) = self.pending.pop_front() {
                return Some((Ok(chunk), self));
            }
            if self.finished {
                return None;
            }

            let frame = match self.socket.recv_timeout(RECV_TIMEOUT).await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.finished = true;
                    return Some((Err(anyhow!("speech stream ended before turn.end")), self));
                }
                Err(e) => {
                    self.finished = true;
                    return Some((Err(e), self));
                }
            };

            match parse_frame(frame) {
                Ok(Parsed::Chunks(chunks)) => self.pending.extend(chunks),
                Ok(Parsed::TurnEnd) => {
                    self.finished = true;
                    let _ = self.socket.close().await;
                }
                Ok(Parsed::Ignored) => {}
                Err(e) => {
                    self.finished = true;
                    return Some((Err(e), self));
                }
            }
        }
    }
}

/// What a received frame means for the stream
#[derive(Debug, PartialEq)]
enum Parsed {
    Chunks(Vec<SpeechChunk>),
    TurnEnd,
    Ignored,
}

#[derive(Debug, Deserialize)]
struct MetadataMessage {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Deserialize)]
struct MetadataEntry {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Data")]
    data: Option<MetadataData>,
}

#[derive(Debug, Deserialize)]
struct MetadataData {
    #[serde(rename = "Offset", default)]
    offset: u64,
    #[serde(rename = "Duration", default)]
    duration: u64,
    #[serde(default)]
    text: Option<MetadataText>,
}

#[derive(Debug, Deserialize)]
struct MetadataText {
    #[serde(rename = "Text")]
    text: String,
}

fn parse_frame(frame: Frame) -> Result<Parsed> {
    match frame {
        Frame::Text(text) => parse_text_frame(&text),
        Frame::Binary(data) => parse_binary_frame(&data),
        Frame::Close => bail!("speech service closed the connection before turn.end"),
    }
}

fn parse_text_frame(message: &str) -> Result<Parsed> {
    let (headers, body) = message.split_once("\r\n\r\n").unwrap_or((message, ""));
    let path = header_value(headers, "Path");

    match path {
        Some("audio.metadata") => {
            let meta: MetadataMessage =
                serde_json::from_str(body).context("invalid audio.metadata payload")?;
            let chunks = meta
                .metadata
                .into_iter()
                .filter(|entry| entry.kind == "WordBoundary")
                .filter_map(|entry| entry.data)
                .filter_map(|data| {
                    let text = data.text?.text;
                    Some(SpeechChunk::Boundary(BoundaryEvent::new(
                        data.offset,
                        data.duration,
                        text,
                    )))
                })
                .collect();
            Ok(Parsed::Chunks(chunks))
        }
        Some("turn.end") => Ok(Parsed::TurnEnd),
        Some(other) => {
            debug!("Ignoring speech message {other}");
            Ok(Parsed::Ignored)
        }
        None => bail!("speech message without Path header"),
    }
}

fn parse_binary_frame(data: &[u8]) -> Result<Parsed> {
    if data.len() < 2 {
        bail!("binary speech frame too short");
    }
    let header_len = usize::from(u16::from_be_bytes([data[0], data[1]]));
    let body_start = 2 + header_len;
    if data.len() < body_start {
        bail!("binary speech frame header exceeds frame length");
    }

    let headers = std::str::from_utf8(&data[2..body_start])
        .context("binary speech frame headers are not UTF-8")?;
    if header_value(headers, "Path") != Some("audio") {
        return Ok(Parsed::Ignored);
    }

    let body = &data[body_start..];
    if body.is_empty() {
        return Ok(Parsed::Ignored);
    }
    Ok(Parsed::Chunks(vec![SpeechChunk::Audio(Bytes::copy_from_slice(body))]))
}

fn header_value<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

/// `Sec-MS-GEC` token for the given Unix time
fn sec_ms_gec(unix_secs: u64) -> String {
    let mut window = unix_secs + WIN_EPOCH_OFFSET;
    window -= window % 300;
    let ticks = u128::from(window) * 10_000_000;

    let digest = Sha256::digest(format!("{ticks}{TRUSTED_CLIENT_TOKEN}").as_bytes());
    digest.iter().map(|b| format!("{b:02X}")).collect()
}

fn connection_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn js_timestamp() -> String {
    chrono::Utc::now()
        .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
        .to_string()
}

fn config_message(timestamp: &str) -> String {
    format!(
        "X-Timestamp:{timestamp}\r\n\
         Content-Type:application/json; charset=utf-8\r\n\
         Path:speech.config\r\n\r\n\
         {{\"context\":{{\"synthesis\":{{\"audio\":{{\"metadataoptions\":{{\
         \"sentenceBoundaryEnabled\":\"false\",\"wordBoundaryEnabled\":\"true\"}},\
         \"outputFormat\":\"{OUTPUT_FORMAT}\"}}}}}}}}\r\n"
    )
}

fn ssml_message(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\n\
         Content-Type:application/ssml+xml\r\n\
         X-Timestamp:{timestamp}Z\r\n\
         Path:ssml\r\n\r\n\
         {ssml}"
    )
}

/// Expand a short voice name (`en-US-AvaNeural`) to the service's long form
fn full_voice_name(voice: &str) -> String {
    if voice.starts_with("Microsoft Server Speech") {
        return voice.to_string();
    }
    let mut parts = voice.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(lang), Some(region), Some(name)) => format!(
            "Microsoft Server Speech Text to Speech Voice ({lang}-{region}, {name})"
        ),
        _ => voice.to_string(),
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // vertical tab and other control characters are rejected by the service
            c if c.is_control() && c != '\n' && c != '\t' => out.push(' '),
            c => out.push(c),
        }
    }
    out
}
