//! Support for piping serialized HTML through an external formatter (e.g.
//! `prettier --parser html`) before it's written back to disk. The formatter
//! reads the page on stdin and writes the formatted page on stdout.

use std::fmt;
use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use tracing::debug;

/// An optional external formatter command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Formatter {
    command: Option<Vec<String>>,
}

impl Formatter {
    /// A formatter that leaves text untouched.
    pub fn none() -> Formatter {
        Formatter { command: None }
    }

    /// A formatter running `command` (program followed by its arguments). An
    /// empty command is the same as [`Formatter::none`].
    pub fn new(command: Vec<String>) -> Formatter {
        match command.is_empty() {
            true => Formatter::none(),
            false => Formatter {
                command: Some(command),
            },
        }
    }

    /// Runs `text` through the formatter and returns its output. Blocks until
    /// the formatter exits.
    pub fn format(&self, text: String) -> Result<String> {
        let command = match &self.command {
            None => return Ok(text),
            Some(command) => command,
        };
        let program = &command[0];
        debug!(program = %program, "running formatter");

        let mut child = Command::new(program)
            .args(&command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::Spawn {
                program: program.clone(),
                err,
            })?;

        // Feed stdin from its own thread so a formatter that streams its
        // output can't deadlock against us.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "formatter stdin closed"))?;
        let writer = thread::spawn(move || stdin.write_all(text.as_bytes()));

        let output = child.wait_with_output()?;
        let written = writer.join();

        if !output.status.success() {
            return Err(Error::Failed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        written
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "formatter stdin writer panicked"))??;
        String::from_utf8(output.stdout).map_err(|err| Error::Output {
            program: program.clone(),
            err,
        })
    }
}

/// The result of running the formatter.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure of the external formatter.
#[derive(Debug)]
pub enum Error {
    /// Returned when the formatter can't be started (usually because it isn't
    /// installed).
    Spawn { program: String, err: io::Error },

    /// Returned when the formatter exits unsuccessfully.
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    /// Returned when the formatter's output isn't UTF-8.
    Output {
        program: String,
        err: std::string::FromUtf8Error,
    },

    /// Returned for I/O errors talking to the formatter.
    Io(io::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spawn { program, err } => {
                write!(f, "running formatter `{}`: {}", program, err)
            }
            Error::Failed {
                program,
                status,
                stderr,
            } => match stderr.is_empty() {
                true => write!(f, "formatter `{}` failed ({})", program, status),
                false => write!(f, "formatter `{}` failed ({}): {}", program, status, stderr),
            },
            Error::Output { program, err } => {
                write!(f, "formatter `{}` output: {}", program, err)
            }
            Error::Io(err) => write!(f, "talking to formatter: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Spawn { err, .. } => Some(err),
            Error::Failed { .. } => None,
            Error::Output { err, .. } => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
