//! Audio capture via an external recorder process.
//!
//! SoX's `rec` or ALSA's `arecord` is spawned with raw signed 16-bit LE mono
//! output on stdout; alternatively raw PCM is read from our own stdin, so any
//! recorder can be piped in.

use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Which capture path produces samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SoX `rec` on the default input.
    #[default]
    Sox,
    /// `arecord` on an ALSA device.
    Alsa,
    /// Raw PCM piped into stdin.
    Stdin,
}

impl Backend {
    /// Default variance threshold. Each recorder has its own noise floor;
    /// sox idles around 2 (occasionally 16), arecord noticeably higher.
    pub fn default_threshold(self) -> f64 {
        match self {
            Self::Sox | Self::Stdin => 1000.0,
            Self::Alsa => 3000.0,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sox => write!(f, "sox"),
            Self::Alsa => write!(f, "alsa"),
            Self::Stdin => write!(f, "stdin"),
        }
    }
}

/// Build the recorder invocation for `backend`. `None` for stdin.
pub fn recorder_command(
    backend: Backend,
    sample_rate: u32,
    alsa_device: Option<&str>,
) -> Option<Command> {
    let rate = sample_rate.to_string();
    match backend {
        Backend::Sox => {
            let mut cmd = Command::new("rec");
            cmd.args(["-q", "-t", "raw", "--endian", "little", "-r", rate.as_str()])
                .args(["-e", "signed", "-b", "16", "-c", "1", "-"]);
            Some(cmd)
        }
        Backend::Alsa => {
            let mut cmd = Command::new("arecord");
            cmd.arg("-q");
            if let Some(dev) = alsa_device {
                cmd.args(["-D", dev]);
            }
            cmd.args(["-f", "S16_LE", "-t", "raw", "-r", rate.as_str(), "-c", "1"]);
            Some(cmd)
        }
        Backend::Stdin => None,
    }
}

enum Source {
    Recorder(ChildStdout),
    Stdin(io::Stdin),
}

/// Raw PCM bytes from the capture path. Moves to the sampling thread.
pub struct Capture {
    source: Source,
}

impl Capture {
    /// Start capturing. The recorder handle, if any, stays with the caller
    /// so it can be stopped while the stream is blocked in a read.
    pub fn start(
        backend: Backend,
        sample_rate: u32,
        alsa_device: Option<&str>,
    ) -> anyhow::Result<(Self, Option<Recorder>)> {
        let Some(cmd) = recorder_command(backend, sample_rate, alsa_device) else {
            info!(sample_rate, "Reading raw PCM from stdin");
            let capture = Self {
                source: Source::Stdin(io::stdin()),
            };
            return Ok((capture, None));
        };

        let (capture, recorder) = Recorder::spawn(cmd)?;
        info!(
            %backend,
            program = %recorder.program,
            pid = recorder.pid,
            sample_rate,
            "Audio capture started"
        );
        Ok((capture, Some(recorder)))
    }
}

impl Read for Capture {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.source {
            Source::Recorder(stdout) => stdout.read(buf),
            Source::Stdin(stdin) => stdin.read(buf),
        }
    }
}

/// Handle on a spawned recorder process. Stopping it (or dropping it) kills
/// the process, which also ends the matching `Capture` stream.
pub struct Recorder {
    child: Option<Child>,
    program: String,
    pid: u32,
}

impl Recorder {
    fn spawn(mut cmd: Command) -> anyhow::Result<(Capture, Self)> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("error starting {program}"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("{program} has no stdout pipe"))?;

        let capture = Capture {
            source: Source::Recorder(stdout),
        };
        let pid = child.id();
        Ok((
            capture,
            Self {
                child: Some(child),
                program,
                pid,
            },
        ))
    }

    /// Kill the recorder and reap it.
    pub fn stop(mut self) -> io::Result<ExitStatus> {
        let mut child = self
            .child
            .take()
            .ok_or_else(|| io::Error::other("recorder already stopped"))?;
        terminate(&mut child)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            match terminate(&mut child) {
                Ok(status) => debug!(program = %self.program, %status, "Recorder stopped"),
                Err(e) => warn!(program = %self.program, "Failed to stop recorder: {}", e),
            }
        }
    }
}

fn terminate(child: &mut Child) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    child.kill()?;
    child.wait()
}
