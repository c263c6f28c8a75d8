//! Interactive serial console
//!
//! Talks to the controller directly over the serial port, without the
//! server, for bench testing the valve. Reads one score per line and prints
//! whatever the firmware answers.

use anyhow::Result;
use std::future::Future;
use std::io::{BufRead, Write};
use tokio::sync::mpsc;
use valve_core::Score;
use valve_hardware::DeviceSession;

/// Prompt shown before each entry
pub const PROMPT: &str = "Enter score (0-100): ";

const BANNER: &str = "\n=== Valve Controller Test Console ===\n\
Enter a score (0-100) to control the valve\n\
Score 100 = valve fully open\n\
Score 50 = valve half open\n\
Score 0 = valve closed\n\
Type 'quit' to exit\n";

/// How the prompt loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Quit,
    EndOfInput,
    Interrupted,
}

/// Read standard input line by line on a dedicated thread.
///
/// A blocked terminal read cannot be cancelled from async code, so it lives
/// on a plain thread that the process simply abandons at exit. The channel
/// closes at end of input.
pub fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    rx
}

/// Run the console until `quit`, end of input or `interrupt` resolves.
///
/// The session is closed (valve shut, port released) on every one of those
/// paths, and also when writing to `out` fails.
pub async fn run<W, I>(
    session: &DeviceSession,
    input: mpsc::Receiver<String>,
    out: &mut W,
    interrupt: I,
) -> Result<()>
where
    W: Write,
    I: Future<Output = ()>,
{
    let exit = tokio::select! {
        exit = prompt_loop(session, input, &mut *out) => exit,
        _ = interrupt => Ok(Exit::Interrupted),
    };

    let farewell: Result<()> = match exit {
        Ok(Exit::Quit) => writeln!(out, "Closing valve and exiting...").map_err(Into::into),
        Ok(Exit::EndOfInput) | Ok(Exit::Interrupted) => {
            writeln!(out, "\n\nClosing valve and exiting...").map_err(Into::into)
        }
        Err(e) => Err(e),
    };

    session.close().await;
    writeln!(out, "Serial connection closed.")?;
    farewell
}

async fn prompt_loop<W: Write>(
    session: &DeviceSession,
    mut input: mpsc::Receiver<String>,
    out: &mut W,
) -> Result<Exit> {
    writeln!(out, "{}", BANNER)?;

    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let Some(line) = input.recv().await else {
            return Ok(Exit::EndOfInput);
        };
        let entry = line.trim();

        if matches!(entry.to_lowercase().as_str(), "quit" | "exit" | "q") {
            return Ok(Exit::Quit);
        }

        match entry.parse::<i64>() {
            Ok(value) => match Score::new(value) {
                Ok(score) => {
                    let outcome = session.send_score(score).await;
                    if !outcome.success {
                        writeln!(out, "Error: {}", outcome.message)?;
                    }
                    for reply in &outcome.replies {
                        writeln!(out, "Arduino: {}", reply)?;
                    }
                }
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            Err(_) => writeln!(out, "Error: Please enter a valid number")?,
        }

        // Blank line between entries
        writeln!(out)?;
    }
}
