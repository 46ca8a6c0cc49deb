//! Operator commands read from stdin.

use std::io::{self, BufRead};
use std::str::FromStr;
use std::sync::mpsc::Sender;
use std::thread;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `label <target> <name...>`
    Label { target: String, name: String },
    /// `train <target> on|off`
    Train { target: String, on: bool },
    /// `list`
    List,
    /// `stop`
    Stop,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?} (expected label, train, list or stop)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

const LABEL_USAGE: &str = "label <id|row> <name>";
const TRAIN_USAGE: &str = "train <id|row> on|off";

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));

        match verb.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "label" => {
                let (target, name) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::Usage(LABEL_USAGE))?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(CommandError::Usage(LABEL_USAGE));
                }
                Ok(Command::Label {
                    target: target.to_string(),
                    name: name.to_string(),
                })
            }
            "train" => {
                let mut words = rest.split_whitespace();
                let (Some(target), Some(mode), None) = (words.next(), words.next(), words.next())
                else {
                    return Err(CommandError::Usage(TRAIN_USAGE));
                };
                let on = match mode.to_ascii_lowercase().as_str() {
                    "on" => true,
                    "off" => false,
                    _ => return Err(CommandError::Usage(TRAIN_USAGE)),
                };
                Ok(Command::Train {
                    target: target.to_string(),
                    on,
                })
            }
            "list" => Ok(Command::List),
            "stop" | "quit" => Ok(Command::Stop),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Read stdin on a background thread and forward parsed commands.
///
/// The thread ends at EOF or once the receiving side is gone.
pub fn spawn_stdin_reader(commands: Sender<Command>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    log::warn!("stdin closed: {err}");
                    break;
                }
            };
            match line.parse::<Command>() {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        break;
                    }
                }
                Err(CommandError::Empty) => {}
                Err(err) => log::warn!("{err}"),
            }
        }
    });
}
