use crate::error::{BridgeError, Result};
use std::io::{BufRead, BufReader, Lines, Read};
use std::process::{Child, ChildStderr, ChildStdout};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// The standard output of a running tool, one line at a time.
///
/// The child process is owned by this value. Call [`ToolLines::finish`] after
/// reading everything to collect the exit status, or [`ToolLines::cancel`] to
/// stop early. A child that is neither finished nor cancelled is killed when
/// the value is dropped.
///
/// Standard error is drained on a separate thread while stdout is read, so a
/// tool that writes a lot of diagnostics cannot block on a full pipe.
pub struct ToolLines {
	command: String,
	child: Child,
	stdout: Option<Lines<BufReader<ChildStdout>>>,
	stderr: Option<JoinHandle<Vec<u8>>>,
	state: State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Running,
	Finished,
	Cancelled,
}

impl ToolLines {
	pub(crate) fn new(command: String, mut child: Child) -> Self {
		let stdout = child.stdout.take().map(|out| BufReader::new(out).lines());
		let stderr = child.stderr.take().map(drain);
		ToolLines {
			command,
			child,
			stdout,
			stderr,
			state: State::Running,
		}
	}

	pub fn state(&self) -> State {
		self.state
	}

	/// Stop the tool without reading the rest of its output.
	pub fn cancel(&mut self) {
		if self.state != State::Running {
			return;
		}
		self.stdout = None;
		// The child may already have exited on its own.
		let _ = self.child.kill();
		let _ = self.child.wait();
		// Not joined: a grandchild may still hold the pipe open.
		self.stderr = None;
		self.state = State::Cancelled;
		info!(command = %self.command, "cancelled");
	}

	/// Wait for the tool to exit and report a non-zero exit as an error
	/// carrying the first line it wrote to stderr.
	pub fn finish(&mut self) -> Result<()> {
		if self.state != State::Running {
			return Ok(());
		}
		self.stdout = None;

		let status = self
			.child
			.wait()
			.map_err(|source| BridgeError::CommandFailed {
				command: self.command.clone(),
				source,
			})?;
		self.state = State::Finished;
		debug!(command = %self.command, %status, "exited");

		let stderr = match self.stderr.take().map(JoinHandle::join) {
			Some(Ok(bytes)) => bytes,
			Some(Err(_)) => {
				warn!(command = %self.command, "stderr reader panicked");
				Vec::new()
			}
			None => Vec::new(),
		};

		if status.success() {
			Ok(())
		} else {
			Err(tool_failed(
				&self.command,
				status.code(),
				&String::from_utf8_lossy(&stderr),
			))
		}
	}
}

impl Iterator for ToolLines {
	type Item = Result<String>;

	fn next(&mut self) -> Option<Self::Item> {
		let line = self.stdout.as_mut()?.next()?;
		Some(line.map_err(|source| BridgeError::LineRead {
			command: self.command.clone(),
			source,
		}))
	}
}

impl Drop for ToolLines {
	fn drop(&mut self) {
		self.cancel();
	}
}

/// Read `stderr` to its end on a background thread.
fn drain(mut stderr: ChildStderr) -> JoinHandle<Vec<u8>> {
	thread::spawn(move || {
		let mut buf = Vec::new();
		// Whatever was read before an error is still worth reporting.
		let _ = stderr.read_to_end(&mut buf);
		buf
	})
}

pub(crate) fn tool_failed(command: &str, code: Option<i32>, stderr: &str) -> BridgeError {
	BridgeError::ToolFailed {
		command: command.to_string(),
		exit_code: code.unwrap_or(-1),
		message: stderr.lines().next().unwrap_or("").trim().to_string(),
	}
}
