//! **SSML Annotator** — turn (text, emotion tag) into markup for the synthesizer.
//!
//! Pure and deterministic: a fixed preset table maps known tags to a prosody
//! envelope with one substitution point for the raw text. Unknown or missing
//! tags fall back to the neutral `<speak>` envelope.

use serde::{Deserialize, Serialize};

/// Opening tag of every document produced by [`annotate`].
pub const SPEAK_OPEN: &str = "<speak>";
const SPEAK_CLOSE: &str = "</speak>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rate {
    XSlow,
    Slow,
    Medium,
    Fast,
    XFast,
}

impl Rate {
    pub fn as_str(self) -> &'static str {
        match self {
            Rate::XSlow => "x-slow",
            Rate::Slow => "slow",
            Rate::Medium => "medium",
            Rate::Fast => "fast",
            Rate::XFast => "x-fast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pitch {
    XLow,
    Low,
    Medium,
    High,
    XHigh,
}

impl Pitch {
    pub fn as_str(self) -> &'static str {
        match self {
            Pitch::XLow => "x-low",
            Pitch::Low => "low",
            Pitch::Medium => "medium",
            Pitch::High => "high",
            Pitch::XHigh => "x-high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Volume {
    Silent,
    XSoft,
    Soft,
    Medium,
    Loud,
    XLoud,
}

impl Volume {
    pub fn as_str(self) -> &'static str {
        match self {
            Volume::Silent => "silent",
            Volume::XSoft => "x-soft",
            Volume::Soft => "soft",
            Volume::Medium => "medium",
            Volume::Loud => "loud",
            Volume::XLoud => "x-loud",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Emphasis {
    Strong,
    Moderate,
    Reduced,
}

impl Emphasis {
    pub fn as_str(self) -> &'static str {
        match self {
            Emphasis::Strong => "strong",
            Emphasis::Moderate => "moderate",
            Emphasis::Reduced => "reduced",
        }
    }
}

/// Prosody settings attached to an emotion tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProsodyPreset {
    pub rate: Option<Rate>,
    pub pitch: Option<Pitch>,
    pub volume: Option<Volume>,
    pub emphasis: Option<Emphasis>,
}

impl ProsodyPreset {
    const fn new(
        rate: Option<Rate>,
        pitch: Option<Pitch>,
        volume: Option<Volume>,
        emphasis: Option<Emphasis>,
    ) -> Self {
        Self {
            rate,
            pitch,
            volume,
            emphasis,
        }
    }

    fn prosody_attributes(&self) -> Vec<String> {
        let mut attrs = Vec::with_capacity(3);
        if let Some(rate) = self.rate {
            attrs.push(format!("rate=\"{}\"", rate.as_str()));
        }
        if let Some(pitch) = self.pitch {
            attrs.push(format!("pitch=\"{}\"", pitch.as_str()));
        }
        if let Some(volume) = self.volume {
            attrs.push(format!("volume=\"{}\"", volume.as_str()));
        }
        attrs
    }
}

/// Tags that have a preset, in table order.
pub const PRESET_TAGS: [&str; 10] = [
    "tease",
    "calm",
    "encourage",
    "whisper",
    "moan",
    "laugh",
    "gasp",
    "humiliate",
    "affirmation",
    "command",
];

/// Look up the preset for `tag` (ASCII case-insensitive).
pub fn preset(tag: &str) -> Option<ProsodyPreset> {
    use Emphasis::*;
    let p = match tag.to_ascii_lowercase().as_str() {
        "tease" => ProsodyPreset::new(Some(Rate::Slow), Some(Pitch::High), None, Some(Moderate)),
        "calm" => ProsodyPreset::new(Some(Rate::Slow), Some(Pitch::Low), Some(Volume::Soft), None),
        "encourage" => {
            ProsodyPreset::new(Some(Rate::Medium), Some(Pitch::Medium), None, Some(Strong))
        }
        "whisper" => {
            ProsodyPreset::new(Some(Rate::Slow), Some(Pitch::Low), Some(Volume::XSoft), None)
        }
        "moan" => ProsodyPreset::new(Some(Rate::XSlow), Some(Pitch::Low), Some(Volume::Soft), None),
        "laugh" => ProsodyPreset::new(Some(Rate::Fast), Some(Pitch::High), None, Some(Strong)),
        "gasp" => ProsodyPreset::new(Some(Rate::Fast), Some(Pitch::XHigh), None, Some(Strong)),
        "humiliate" => {
            ProsodyPreset::new(Some(Rate::Medium), Some(Pitch::High), None, Some(Moderate))
        }
        "affirmation" => {
            ProsodyPreset::new(Some(Rate::Slow), Some(Pitch::Medium), Some(Volume::Soft), None)
        }
        "command" => {
            ProsodyPreset::new(Some(Rate::Medium), Some(Pitch::Medium), None, Some(Strong))
        }
        _ => return None,
    };
    Some(p)
}

/// How raw text enters the markup. Currently verbatim: reserved characters
/// such as `<` and `&` are not escaped, so callers can embed their own tags.
pub fn substitute_text(text: &str) -> &str {
    text
}

/// Render `text` with the preset for `tag`, or the neutral envelope.
pub fn annotate(text: &str, tag: Option<&str>) -> String {
    let body = substitute_text(text);
    let Some(preset) = tag.and_then(preset) else {
        return neutral_envelope(body);
    };

    let attrs = preset.prosody_attributes();
    let mut ssml = String::from(SPEAK_OPEN);
    if !attrs.is_empty() {
        ssml.push_str("<prosody ");
        ssml.push_str(&attrs.join(" "));
        ssml.push('>');
    }
    if let Some(emphasis) = preset.emphasis {
        ssml.push_str(&format!("<emphasis level=\"{}\">", emphasis.as_str()));
    }
    ssml.push_str(body);
    if preset.emphasis.is_some() {
        ssml.push_str("</emphasis>");
    }
    if !attrs.is_empty() {
        ssml.push_str("</prosody>");
    }
    ssml.push_str(SPEAK_CLOSE);
    ssml
}

/// The default envelope used for untagged or unknown-tag text.
pub fn neutral_envelope(text: &str) -> String {
    format!("{SPEAK_OPEN}{text}{SPEAK_CLOSE}")
}

/// True when `s` is a document produced by [`annotate`].
pub fn is_markup(s: &str) -> bool {
    s.starts_with(SPEAK_OPEN)
}

/// Result of splitting an operator line into a slash tag and the text to speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub tag: Option<String>,
    pub remainder: String,
}

/// Split a leading `/word` token off `input`.
///
/// `"/tease go slow"` yields tag `tease` and remainder `go slow`. Anything that
/// is not a slash, one or more word characters, whitespace, then non-empty text
/// passes through unchanged with no tag. A tag followed only by whitespace
/// (`"/tease  "`) also passes through rather than speaking blank text.
pub fn parse_command(input: &str) -> ParsedCommand {
    let passthrough = || ParsedCommand {
        tag: None,
        remainder: input.to_string(),
    };

    let Some(rest) = input.strip_prefix('/') else {
        return passthrough();
    };
    let word_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if word_len == 0 {
        return passthrough();
    }
    let (word, after) = rest.split_at(word_len);
    if !after.starts_with(char::is_whitespace) {
        return passthrough();
    }
    let remainder = after.trim_start();
    if remainder.is_empty() {
        return passthrough();
    }

    ParsedCommand {
        tag: Some(word.to_string()),
        remainder: remainder.to_string(),
    }
}
