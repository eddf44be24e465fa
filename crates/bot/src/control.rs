//! Manual control commands

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Command delivered to the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Submit on the next cycle regardless of profit
    ForceExecute,
    /// Unwind the position, accepting any output
    Revert,
    ToggleTrading,
    RotateToken,
    Stop,
}

impl ControlCommand {
    /// Hotkeys: `e`, `r`, `t`, `n`, `q`
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "e" => Some(ControlCommand::ForceExecute),
            "r" => Some(ControlCommand::Revert),
            "t" => Some(ControlCommand::ToggleTrading),
            "n" => Some(ControlCommand::RotateToken),
            "q" => Some(ControlCommand::Stop),
            _ => None,
        }
    }
}

/// Read hotkeys from stdin, one per line, on a dedicated thread.
///
/// `q` goes straight to the shutdown channel so an in-flight confirmation
/// sees it; everything else is queued for the loop.
pub fn spawn_stdin_reader(
    commands: mpsc::Sender<ControlCommand>,
    shutdown: Arc<watch::Sender<bool>>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        return;
                    }
                };

                match ControlCommand::parse(&line) {
                    Some(ControlCommand::Stop) => {
                        info!("Stop requested from keyboard");
                        shutdown.send_replace(true);
                        return;
                    }
                    Some(command) => {
                        if commands.blocking_send(command).is_err() {
                            return;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => info!(
                        "Unknown command {:?} (e=execute r=revert t=toggle n=rotate q=quit)",
                        line.trim()
                    ),
                }
            }
            debug!("stdin closed, manual control disabled");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(ControlCommand::parse("e"), Some(ControlCommand::ForceExecute));
        assert_eq!(ControlCommand::parse(" R\n"), Some(ControlCommand::Revert));
        assert_eq!(ControlCommand::parse("t"), Some(ControlCommand::ToggleTrading));
        assert_eq!(ControlCommand::parse("n"), Some(ControlCommand::RotateToken));
        assert_eq!(ControlCommand::parse("q"), Some(ControlCommand::Stop));
        assert_eq!(ControlCommand::parse("quit"), None);
        assert_eq!(ControlCommand::parse(""), None);
    }
}
