//! Operator command line parsing.
//!
//! Lines starting with `:` are console commands; anything else is spoken.
//! Panel buttons are numbered from 1 at the prompt.

use exposure_voice::EmotionDraft;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Say(String),
    Listen,
    Stop,
    Replay,
    Key(String),
    Click(String),
    Press(usize),
    Assign { button: usize, emotion_id: String },
    Clear(usize),
    Connect,
    Disconnect,
    Reload,
    Save,
    Add(EmotionDraft),
    Voices,
    Voice(String),
    Log,
    Stats,
    Export(Option<PathBuf>),
    Help,
    Quit,
}

pub const HELP: &str = "\
:listen                 start listening with the active voice
:stop                   stop listening
:replay                 play the last utterance again
:key <K>                press a hotkey (F1, KeyA, a, 1, ...)
:click <id>             fire an emotion by id
:press <n>              press panel button n
:assign <n> <id>        bind panel button n to an emotion
:clear <n>              unbind panel button n
:connect | :disconnect  open or close the panel
:reload | :save         load or store the panel mapping
:add name|phrase|tag|hotkey   create an emotion (tag and hotkey optional)
:voices | :voice <id>   list voices or pick one
:log | :stats           recent log entries or latency summary
:export [path]          session log as JSON, printed or written to path
:quit
anything else           spoken; a leading /tag applies a preset";

/// Every `:` command, for prompt completion.
pub const COMMAND_NAMES: &[&str] = &[
    ":listen", ":stop", ":replay", ":key", ":click", ":press", ":assign", ":clear",
    ":connect", ":disconnect", ":reload", ":save", ":add", ":voices", ":voice", ":log",
    ":stats", ":export", ":help", ":quit",
];

/// Command names starting with `prefix`.
pub fn command_candidates(prefix: &str) -> Vec<&'static str> {
    COMMAND_NAMES
        .iter()
        .copied()
        .filter(|name| name.starts_with(prefix))
        .collect()
}

pub fn parse_line(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let Some(body) = line.strip_prefix(':') else {
        return Ok(Command::Say(line.to_string()));
    };
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };

    let command = match name {
        "listen" => Command::Listen,
        "stop" => Command::Stop,
        "replay" => Command::Replay,
        "key" => Command::Key(required(rest, "key")?.to_string()),
        "click" => Command::Click(required(rest, "emotion id")?.to_string()),
        "press" => Command::Press(button(rest)?),
        "assign" => {
            let (n, id) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "usage: :assign <n> <id>".to_string())?;
            Command::Assign {
                button: button(n)?,
                emotion_id: id.trim().to_string(),
            }
        }
        "clear" => Command::Clear(button(rest)?),
        "connect" => Command::Connect,
        "disconnect" => Command::Disconnect,
        "reload" => Command::Reload,
        "save" => Command::Save,
        "add" => Command::Add(draft(rest)?),
        "voices" => Command::Voices,
        "voice" => Command::Voice(required(rest, "voice id")?.to_string()),
        "log" => Command::Log,
        "stats" => Command::Stats,
        "export" => Command::Export((!rest.is_empty()).then(|| PathBuf::from(rest))),
        "help" => Command::Help,
        "quit" | "q" => Command::Quit,
        other => return Err(format!("unknown command :{}", other)),
    };
    Ok(command)
}

fn required<'a>(rest: &'a str, what: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("missing {}", what))
    } else {
        Ok(rest)
    }
}

/// 1-based button number to slot index.
fn button(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("invalid button number {:?}", raw.trim())),
    }
}

fn draft(rest: &str) -> Result<EmotionDraft, String> {
    let mut fields = rest.split('|').map(str::trim);
    let name = fields.next().filter(|s| !s.is_empty());
    let phrase = fields.next().filter(|s| !s.is_empty());
    let (Some(name), Some(phrase)) = (name, phrase) else {
        return Err("usage: :add name|phrase|tag|hotkey".to_string());
    };
    let tag = fields.next().filter(|s| !s.is_empty()).map(str::to_string);
    let draft = EmotionDraft::synthesized(name, phrase, tag);
    Ok(match fields.next().filter(|s| !s.is_empty()) {
        Some(hotkey) => draft.with_hotkey(hotkey),
        None => draft,
    })
}
