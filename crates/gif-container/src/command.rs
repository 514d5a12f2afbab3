use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use fitgif_types::QuantizedFrame;
use tracing::{info, warn};

use crate::{ContainerEncoder, ContainerError};

/// Pipes another encoder's artifact through an external program
/// (stdin → stdout), e.g. `gifsicle -O3`.
///
/// A spawn failure, a non-zero exit or an empty stdout is an error; the
/// inner artifact is never passed through silently.
pub struct CommandFilter {
    program: String,
    args: Vec<String>,
    inner: Arc<dyn ContainerEncoder>,
}

impl CommandFilter {
    pub fn new(program: impl Into<String>, inner: Arc<dyn ContainerEncoder>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            inner,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Parses a shell-like `"program arg1 arg2"` line (whitespace split, no
    /// quoting).
    pub fn from_command_line(line: &str, inner: Arc<dyn ContainerEncoder>) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, inner).with_args(parts))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, ContainerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ContainerError::ToolSpawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ContainerError::InvalidInput("child stdin unavailable".to_string()))?;

        // Feed stdin from a separate thread so a tool that streams output
        // before consuming all input cannot deadlock us.
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(&input));
            let output = child.wait_with_output();
            (output, writer.join())
        });
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                program = %self.program,
                status = %output.status,
                %stderr,
                "External encoder failed"
            );
            return Err(ContainerError::ToolFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr,
            });
        }

        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(ContainerError::Io(err)),
            Err(_) => {
                return Err(ContainerError::InvalidInput(
                    "stdin writer thread panicked".to_string(),
                ))
            }
        }

        if output.stdout.is_empty() {
            return Err(ContainerError::ToolFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: "no output produced".to_string(),
            });
        }

        Ok(output.stdout)
    }
}

impl ContainerEncoder for CommandFilter {
    fn name(&self) -> &'static str {
        "command"
    }

    fn encode(
        &self,
        frames: &[QuantizedFrame],
        loop_count: u16,
        progress: &mut dyn FnMut(usize, usize) -> bool,
    ) -> Result<Vec<u8>, ContainerError> {
        let artifact = self.inner.encode(frames, loop_count, progress)?;
        let before = artifact.len();
        let filtered = self.run(artifact)?;

        info!(
            stage = "encode",
            program = %self.program,
            before_bytes = before,
            after_bytes = filtered.len(),
            "External filter applied"
        );

        Ok(filtered)
    }
}
