//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use sclip_models::format_hhmmss;

use crate::error::{MediaError, MediaResult};

/// How many trailing stderr lines to keep for error reporting.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
///
/// Every operation in this pipeline is a stream-copy (the segmenter
/// produces segments with matching codecs and reset timestamps), so the
/// builder is biased toward `-c copy` invocations.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path (or `pipe:0`)
    input: PathBuf,
    /// Output file path (or segment pattern)
    output: PathBuf,
    /// Arguments placed before `-i`
    input_args: Vec<String>,
    /// Arguments placed after `-i`
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input argument (before `-i`).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add an output argument (after `-i`).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Seek to a position before reading the input (`-ss HH:MM:SS`).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format_hhmmss(seconds))
    }

    /// Limit output duration (`-t HH:MM:SS`).
    pub fn limit(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format_hhmmss(seconds))
    }

    /// Stream-copy all streams (`-c copy`).
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Read the input through the concat demuxer (`-f concat -safe 0`).
    pub fn concat_input(self) -> Self {
        self.input_arg("-f")
            .input_arg("concat")
            .input_arg("-safe")
            .input_arg("0")
    }

    /// Write fixed-length segments with per-segment timestamps
    /// (`-f segment -segment_time N -reset_timestamps 1`).
    pub fn segmented(self, segment_secs: u32) -> Self {
        self.output_arg("-map")
            .output_arg("0")
            .output_arg("-segment_time")
            .output_arg(segment_secs.to_string())
            .output_arg("-f")
            .output_arg("segment")
            .output_arg("-reset_timestamps")
            .output_arg("1")
    }

    /// Build the full argument list.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with cancellation support.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { cancel_rx: None }
    }

    /// Attach a cancellation signal; a `true` on the channel kills the
    /// child process and fails the run with [`MediaError::Cancelled`].
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Drain stderr concurrently so the child never blocks on the pipe.
        let stderr = child.stderr.take();
        let stderr_handle = tokio::spawn(async move {
            let mut tail: Vec<String> = Vec::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
            }
            tail
        });

        let status = match self.cancel_rx.clone() {
            Some(mut cancel_rx) => {
                tokio::select! {
                    status = child.wait() => status?,
                    _ = cancelled(&mut cancel_rx) => {
                        let _ = child.kill().await;
                        let _ = stderr_handle.await;
                        return Err(MediaError::Cancelled);
                    }
                }
            }
            None => child.wait().await?,
        };

        let tail = stderr_handle.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(tail.join("\n")),
                status.code(),
            ))
        }
    }
}

/// Resolve once the watch channel carries `true`.
pub async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            // Sender dropped without cancelling; never resolve.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_command_args() {
        let cmd = FfmpegCommand::new("merged.mp4", "clip.mp4")
            .seek(110.0)
            .limit(50.0)
            .stream_copy();

        let args = cmd.build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ss 00:01:50"));
        assert!(joined.contains("-t 00:00:50"));
        assert!(joined.contains("-c copy"));
        // Seek applies to the input, duration to the output.
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let i = args.iter().position(|a| a == "-i").unwrap();
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert!(ss < i && i < t);
    }

    #[test]
    fn test_concat_command_args() {
        let cmd = FfmpegCommand::new("list.txt", "merged.mp4")
            .concat_input()
            .stream_copy();

        let args = cmd.build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        let f = args.iter().position(|a| a == "-f").unwrap();
        assert!(f < i);
        assert_eq!(args[f + 1], "concat");
        assert!(args.contains(&"-safe".to_string()));
    }

    #[test]
    fn test_segment_command_args() {
        let cmd = FfmpegCommand::new("pipe:0", "out/output%03d.mp4")
            .stream_copy()
            .segmented(120);

        let joined = cmd.build_args().join(" ");
        assert!(joined.contains("-f segment"));
        assert!(joined.contains("-segment_time 120"));
        assert!(joined.contains("-reset_timestamps 1"));
        assert!(joined.ends_with("out/output%03d.mp4"));
    }
}
