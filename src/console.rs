use crate::credential::ApprovalState;
use crate::error::Result;
use crate::session::{Command, SessionHandle, SessionState, SessionView};
use crossterm::style::{Color, Stylize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const HELP: &str = "commands: capture <store> <reference> | send | retake | retry | status | help | quit";

/// One parsed operator line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Session(Command),
    Help,
    Quit,
}

/// Parse a console line; blank lines yield `None`
pub fn parse_line(line: &str) -> std::result::Result<Option<ConsoleInput>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let input = match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
        ("capture" | "c", [store_code, reference_code]) => ConsoleInput::Session(Command::Capture {
            store_code: store_code.to_string(),
            reference_code: reference_code.to_string(),
        }),
        ("capture" | "c", _) => return Err("usage: capture <store> <reference>".to_string()),
        ("send" | "s", []) => ConsoleInput::Session(Command::Send),
        ("retake" | "r", []) => ConsoleInput::Session(Command::Retake),
        ("retry", []) => ConsoleInput::Session(Command::Retry),
        ("status", []) => ConsoleInput::Session(Command::RefreshStatus),
        ("help" | "?", _) => ConsoleInput::Help,
        ("quit" | "q" | "exit", _) => ConsoleInput::Quit,
        (other, _) => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(input))
}

/// Plain-text status line for a view
pub fn status_line(view: &SessionView) -> String {
    let mut line = format!("[{}] approval: {}", view.state, approval_label(view.approval));

    if let (Some(store), Some(reference)) = (&view.store_code, &view.reference_code) {
        line.push_str(&format!(" | {} / {}", store, reference));
    }

    let actions: Vec<&str> = [
        (view.capture_enabled, "capture"),
        (view.send_enabled, "send"),
        (view.retake_enabled, "retake"),
        (view.retry_enabled, "retry"),
    ]
    .iter()
    .filter(|(enabled, _)| *enabled)
    .map(|(_, name)| *name)
    .collect();
    if !actions.is_empty() {
        line.push_str(&format!(" | available: {}", actions.join(", ")));
    }

    if let Some(notice) = &view.notice {
        line.push_str(&format!(" | {}", notice));
    }
    if let Some(field) = view.focus {
        line.push_str(&format!(" (check the {})", field));
    }
    line
}

fn approval_label(approval: ApprovalState) -> &'static str {
    match approval {
        ApprovalState::Unknown => "unknown",
        ApprovalState::AwaitingApproval => "awaiting approval",
        ApprovalState::Approved => "approved",
        ApprovalState::Rejected => "not approved",
        ApprovalState::ConnectionError => "connection error",
    }
}

fn state_color(view: &SessionView) -> Color {
    match (view.state, view.approval) {
        (_, ApprovalState::Rejected | ApprovalState::ConnectionError) => Color::Red,
        (SessionState::Ready, _) => Color::Green,
        (SessionState::ReviewReady, _) => Color::Magenta,
        (SessionState::Capturing | SessionState::Processing | SessionState::Uploading, _) => {
            Color::Cyan
        }
        _ => Color::Yellow,
    }
}

fn paint(view: &SessionView) {
    println!("{}", status_line(view).with(state_color(view)).bold());
}

/// Line-oriented operator console driving a session controller
pub struct OperatorConsole {
    handle: SessionHandle,
    shutdown: CancellationToken,
}

impl OperatorConsole {
    pub fn new(handle: SessionHandle, shutdown: CancellationToken) -> Self {
        Self { handle, shutdown }
    }

    /// Read commands from stdin until quit, EOF or shutdown
    pub async fn run(self) -> Result<()> {
        info!("Operator console ready");
        println!("{}", HELP.dark_grey());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut views = self.handle.watch();
        paint(&views.borrow_and_update());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = views.changed() => {
                    if changed.is_err() {
                        debug!("Session view closed");
                        break;
                    }
                    paint(&views.borrow_and_update());
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        info!("Console input closed");
                        break;
                    };
                    match parse_line(&line) {
                        Ok(None) => {}
                        Ok(Some(ConsoleInput::Help)) => println!("{}", HELP),
                        Ok(Some(ConsoleInput::Quit)) => {
                            info!("Operator requested shutdown");
                            self.shutdown.cancel();
                            break;
                        }
                        Ok(Some(ConsoleInput::Session(command))) => {
                            if let Err(e) = self.handle.command(command).await {
                                warn!("Command not delivered: {}", e);
                                break;
                            }
                        }
                        Err(message) => println!("{}", message.red()),
                    }
                }
            }
        }
        Ok(())
    }
}
