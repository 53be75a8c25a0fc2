//! Interactive prompt: line editing, history and `:` command completion.
//!
//! rustyline blocks, so the editor lives on its own thread and hands each
//! entered line to the async loop over a channel.

use crate::commands::command_candidates;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::mpsc;

const PROMPT: &str = "exposure> ";

#[derive(Clone, Default)]
pub struct ConsoleHelper;

impl Helper for ConsoleHelper {}

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with(':') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = command_candidates(line)
            .into_iter()
            .map(|name| Pair {
                display: name.to_string(),
                replacement: name.to_string(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if !line.starts_with(':') || line.contains(' ') {
            return None;
        }
        command_candidates(line)
            .into_iter()
            .find(|name| name.len() > line.len())
            .map(|name| name[line.len()..].to_string())
    }
}

impl Highlighter for ConsoleHelper {}

impl Validator for ConsoleHelper {}

/// Start the prompt thread. The channel closes on end of input.
pub fn spawn(lines: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let mut editor: Editor<ConsoleHelper, DefaultHistory> = match Editor::new() {
            Ok(editor) => editor,
            Err(e) => {
                eprintln!("[exposure-console] prompt unavailable: {}", e);
                return;
            }
        };
        editor.set_helper(Some(ConsoleHelper));

        loop {
            match editor.readline(PROMPT) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = editor.add_history_entry(line.as_str());
                    if lines.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C detected. Type :quit to exit.");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("[exposure-console] prompt error: {:?}", e);
                    break;
                }
            }
        }
    });
}
