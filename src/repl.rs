//! Interactive text and voice sessions
//!
//! Reads utterances from a [`SpeechIo`], handles a few local commands, and
//! relays everything else through the conversation engine. Voice sessions
//! only act on utterances that contain the wake word.

use crate::conversation::{ConversationEngine, ConversationHistory};
use crate::memory::{MemoryStore, SharedMemory};
use crate::speech::SpeechIo;
use std::fmt::Write;
use std::time::Duration;

/// Turns kept for the lifetime of one session
const SESSION_RETENTION: usize = 200;

/// How long to wait for a command once the wake word was heard on its own
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const FAREWELL: &str = "Goodbye! Have a great day.";
const WAKE_ACK: &str = "Yes?";
const REMEMBER_USAGE: &str = "Format: remember <key>=<value>";
const PREFER_USAGE: &str = "Format: prefer <key>=<value>";
const MEMORY_UNAVAILABLE: &str = "My memory is unavailable right now.";
const COMMAND_HELP: &str =
    "Commands: exit, clear, memory, forget everything, remember <key>=<value>, prefer <key>=<value>";

/// A line of user input, classified
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Empty,
    Exit,
    Clear,
    Memory,
    /// Wipe every stored fact, preference and interaction
    Forget,
    Remember { key: &'a str, value: &'a str },
    Prefer { key: &'a str, value: &'a str },
    /// A recognised command with bad arguments; carries the usage hint
    Malformed(&'static str),
    Chat(&'a str),
}

pub fn parse_command(input: &str) -> Command<'_> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Command::Empty;
    }
    let lowered = trimmed.to_lowercase();
    match lowered.as_str() {
        "exit" | "quit" | "goodbye" | "bye" => return Command::Exit,
        "clear" => return Command::Clear,
        "memory" => return Command::Memory,
        "forget everything" => return Command::Forget,
        _ => {}
    }

    if let Some(rest) = strip_keyword(trimmed, "remember") {
        return match split_assignment(rest) {
            Some((key, value)) => Command::Remember { key, value },
            None => Command::Malformed(REMEMBER_USAGE),
        };
    }
    if let Some(rest) = strip_keyword(trimmed, "prefer") {
        return match split_assignment(rest) {
            Some((key, value)) => Command::Prefer { key, value },
            None => Command::Malformed(PREFER_USAGE),
        };
    }
    Command::Chat(trimmed)
}

/// `rest` if `input` starts with `keyword` followed by whitespace
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let head = input.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = input.get(keyword.len()..)?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim_start())
}

fn split_assignment(rest: &str) -> Option<(&str, &str)> {
    let (key, value) = rest.split_once('=')?;
    let key = key.trim();
    (!key.is_empty()).then_some((key, value.trim()))
}

/// Whatever follows the wake word in `utterance`, or `None` if it was not said.
///
/// Matching ignores ASCII case. The remainder may be empty when the wake word
/// was spoken on its own.
pub fn after_wake_word<'a>(utterance: &'a str, wake_word: &str) -> Option<&'a str> {
    if wake_word.is_empty() {
        return Some(utterance.trim());
    }
    let index = utterance.to_ascii_lowercase().find(wake_word)?;
    let rest = utterance.get(index + wake_word.len()..)?;
    let rest = rest.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, ',' | '.' | '!' | '?' | ':')
    });
    Some(rest.trim_end())
}

/// Whether the session keeps going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// State shared by the text and voice loops
struct Session<'a> {
    engine: &'a ConversationEngine,
    memory: &'a SharedMemory,
    history: ConversationHistory,
}

impl<'a> Session<'a> {
    fn new(engine: &'a ConversationEngine, memory: &'a SharedMemory) -> Self {
        Self {
            engine,
            memory,
            history: ConversationHistory::with_retention(SESSION_RETENTION),
        }
    }

    /// Act on one utterance and speak the outcome
    async fn dispatch<S: SpeechIo>(&mut self, io: &mut S, input: &str) -> Flow {
        let reply = match parse_command(input) {
            Command::Empty => return Flow::Continue,
            Command::Exit => {
                io.speak(FAREWELL).await;
                return Flow::Stop;
            }
            Command::Clear => {
                self.engine.reset(&mut self.history);
                "Conversation cleared.".to_string()
            }
            Command::Memory => with_memory(self.memory, |m| describe_memory(m))
                .unwrap_or_else(|| MEMORY_UNAVAILABLE.to_string()),
            Command::Forget => match with_memory(self.memory, MemoryStore::clear_all) {
                Some(Ok(())) => "Done. I've forgotten everything you told me.".to_string(),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Failed to clear memory");
                    "I couldn't clear my memory, sorry.".to_string()
                }
                None => MEMORY_UNAVAILABLE.to_string(),
            },
            Command::Remember { key, value } => {
                match with_memory(self.memory, |m| m.remember_fact(key, value)) {
                    Some(Ok(())) => format!("Got it. {key} is {value}."),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Failed to store fact");
                        "I couldn't save that, sorry.".to_string()
                    }
                    None => MEMORY_UNAVAILABLE.to_string(),
                }
            }
            Command::Prefer { key, value } => {
                match with_memory(self.memory, |m| m.set_preference(key, value)) {
                    Some(Ok(())) => format!("Noted, {key} set to {value}."),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Failed to store preference");
                        "I couldn't save that, sorry.".to_string()
                    }
                    None => MEMORY_UNAVAILABLE.to_string(),
                }
            }
            Command::Malformed(usage) => usage.to_string(),
            Command::Chat(text) => {
                if let Some(Err(e)) = with_memory(self.memory, |m| m.add_to_history(text)) {
                    tracing::warn!(error = %e, "Failed to record interaction");
                }
                self.engine.handle(&mut self.history, text).await
            }
        };
        io.speak(&reply).await;
        Flow::Continue
    }
}

/// Text session: every line is a command or a chat message.
/// Runs until the user says goodbye or input ends.
pub async fn run<S: SpeechIo>(
    io: &mut S,
    engine: &ConversationEngine,
    memory: &SharedMemory,
    wake_word: &str,
) {
    let mut session = Session::new(engine, memory);
    let banner = format!("Jarvis text mode (voice wake word: '{wake_word}').");
    io.speak(&greeting(memory, &banner)).await;

    loop {
        let Some(input) = io.capture(None).await else {
            if io.is_closed() {
                tracing::info!("Input closed, ending session");
                break;
            }
            continue;
        };

        if session.dispatch(io, &input).await == Flow::Stop {
            break;
        }
    }
}

/// Voice session: utterances without the wake word are ignored.
///
/// Text following the wake word in the same utterance is taken as the
/// command. A bare wake word is acknowledged and the next utterance, heard
/// within [`COMMAND_TIMEOUT`], becomes the command.
pub async fn run_voice<S: SpeechIo>(
    io: &mut S,
    engine: &ConversationEngine,
    memory: &SharedMemory,
    wake_word: &str,
) {
    let mut session = Session::new(engine, memory);
    let banner = format!("Jarvis voice mode. Say '{wake_word}' to activate.");
    io.speak(&greeting(memory, &banner)).await;

    loop {
        let Some(heard) = io.capture(None).await else {
            if io.is_closed() {
                tracing::info!("Input closed, ending voice session");
                break;
            }
            continue;
        };

        let Some(inline) = after_wake_word(&heard, wake_word) else {
            tracing::debug!("No wake word, ignoring utterance");
            continue;
        };
        tracing::info!(wake_word = %wake_word, "Wake word detected");

        let command = if inline.is_empty() {
            io.speak(WAKE_ACK).await;
            match io.capture(Some(COMMAND_TIMEOUT)).await {
                Some(command) => command,
                None if io.is_closed() => {
                    tracing::info!("Input closed, ending voice session");
                    break;
                }
                None => {
                    tracing::debug!("No command heard after wake word");
                    continue;
                }
            }
        } else {
            inline.to_string()
        };

        if session.dispatch(io, &command).await == Flow::Stop {
            break;
        }
    }
}

fn with_memory<T>(memory: &SharedMemory, f: impl FnOnce(&mut MemoryStore) -> T) -> Option<T> {
    match memory.lock() {
        Ok(mut guard) => Some(f(&mut guard)),
        Err(_) => {
            tracing::error!("Memory store lock poisoned");
            None
        }
    }
}

fn greeting(memory: &SharedMemory, banner: &str) -> String {
    let name = with_memory(memory, |m| m.get_preference("name").map(str::to_string)).flatten();
    let hello = match name {
        Some(name) => format!("Welcome back, {name}."),
        None => "Hello.".to_string(),
    };
    format!("{hello} {banner}\n{COMMAND_HELP}")
}

fn describe_memory(memory: &MemoryStore) -> String {
    let facts = memory.all_facts();
    let preferences = memory.all_preferences();
    if facts.is_empty() && preferences.is_empty() {
        return "I don't have anything stored yet.".to_string();
    }

    let mut out = String::from("Stored facts:");
    for (key, value) in &facts {
        let _ = write!(out, "\n  {key}: {value}");
    }
    out.push_str("\nPreferences:");
    for (key, value) in preferences {
        let _ = write!(out, "\n  {key}: {value}");
    }
    out
}
