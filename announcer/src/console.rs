use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::announcement::ItemType;
use crate::engine::presenter::LinkOpener;
use crate::engine::runtime::SchedulerHandle;
use crate::engine::scheduler::{Frame, RenderedItem};

/// A line typed on the console.
///
/// Grammar: `COMMAND [channel]`, case-insensitive, e.g. `close modal`,
/// `click popup`, `status`, `quit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Close(ItemType),
    Click(ItemType),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    UnknownCommand(String),
    #[error("'{0}' needs a channel: banner, modal, popup or notification")]
    MissingChannel(String),
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),
    #[error("unexpected argument '{0}'")]
    TrailingArgument(String),
}

pub const HELP: &str = "commands: close <channel> | click <channel> | status | help | quit";

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Err(CommandError::Empty);
        };
        let command = command.to_lowercase();

        let parsed = match command.as_str() {
            "close" | "dismiss" | "x" => ConsoleCommand::Close(channel_arg(&command, words.next())?),
            "click" | "open" => ConsoleCommand::Click(channel_arg(&command, words.next())?),
            "status" | "s" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            _ => return Err(CommandError::UnknownCommand(command)),
        };

        match words.next() {
            Some(extra) => Err(CommandError::TrailingArgument(extra.to_string())),
            None => Ok(parsed),
        }
    }
}

fn channel_arg(command: &str, arg: Option<&str>) -> Result<ItemType, CommandError> {
    let arg = arg.ok_or_else(|| CommandError::MissingChannel(command.to_string()))?;
    ItemType::parse(arg).ok_or_else(|| CommandError::UnknownChannel(arg.to_string()))
}

/// Render a frame as console lines, one per visible announcement.
pub fn format_frame(frame: &Frame) -> Vec<String> {
    if frame.loading {
        return vec!["(loading announcements)".to_string()];
    }
    if frame.items.is_empty() {
        return vec!["(no announcements on screen)".to_string()];
    }
    frame.items.iter().map(format_item).collect()
}

fn format_item(item: &RenderedItem) -> String {
    let a = &item.announcement;
    let mut line = format!("[{}] #{} {}", item.channel, a.id, a.title);
    if let Some(style) = item.style {
        line.push_str(&format!(" <{} {}>", style.icon(), style.color()));
    }
    if !a.content.is_empty() {
        line.push_str(&format!(" - {}", a.content));
    }
    if item.has_action
        && let Some((text, _)) = a.action()
    {
        line.push_str(&format!(" [{text}]"));
    }
    line.push_str(&format!(" ({:?})", item.phase));
    line
}

/// Drive a scheduler session from line input, emitting every frame change.
///
/// Returns on `quit`, when `cancel` fires, or when the session ends. End of
/// input only stops command reading; frames keep being emitted.
pub async fn run_console<R>(
    handle: &SchedulerHandle,
    input: R,
    cancel: &CancellationToken,
    mut emit: impl FnMut(&str),
) where
    R: AsyncBufRead + Unpin,
{
    let mut frames = handle.frames();
    let mut lines = input.lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                for line in format_frame(&frame) {
                    emit(&line);
                }
            }
            line = lines.next_line(), if input_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("console input closed, presenting until interrupted");
                        input_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to read console input");
                        input_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match ConsoleCommand::parse(&line) {
                    Ok(ConsoleCommand::Close(channel)) => {
                        handle.close(channel);
                    }
                    Ok(ConsoleCommand::Click(channel)) => {
                        handle.click_action(channel);
                    }
                    Ok(ConsoleCommand::Status) => {
                        for line in format_frame(&handle.frame()) {
                            emit(&line);
                        }
                    }
                    Ok(ConsoleCommand::Help) => emit(HELP),
                    Ok(ConsoleCommand::Quit) => break,
                    Err(e) => emit(&format!("error: {e}")),
                }
            }
        }
    }
}

/// Link opener for terminal hosts: there is no browser to hand the URL to,
/// so it is logged for the user to follow.
pub struct LoggingLinkOpener;

impl LinkOpener for LoggingLinkOpener {
    fn open(&self, url: &str) {
        info!(%url, "open link");
        println!("-> {url}");
    }
}
