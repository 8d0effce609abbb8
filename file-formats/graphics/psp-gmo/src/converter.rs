//! External texture conversion
//!
//! Proprietary PSP image blobs (TIM2, GIM) are turned into PNG files by an
//! external command-line converter. The import never fails because of the
//! converter: every failure is reported as a [`ConversionError`] that ends
//! up inside the scene.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::chunks::TextureSource;

/// Default wait for one conversion
pub const DEFAULT_CONVERTER_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Longest stderr excerpt kept in an error
const STDERR_EXCERPT: usize = 512;

/// Why a texture could not be converted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum ConversionError {
    /// No converter configured, or the configured executable does not exist
    #[error("texture converter unavailable: {0}")]
    ConverterUnavailable(String),

    /// The converter did not finish in time and was killed
    #[error("texture converter timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    /// The converter exited unsuccessfully
    #[error("texture converter exited with {}: {stderr}", exit_description(.code))]
    ExitStatus {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Tail of the converter's stderr
        stderr: String,
    },

    /// The converter reported success but wrote no output
    #[error("texture converter produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    /// Preparing the input or launching the converter failed
    #[error("texture conversion I/O error: {0}")]
    Io(String),

    /// An external texture file could not be found
    #[error("texture source not found: {0}")]
    SourceNotFound(String),
}

impl From<std::io::Error> for ConversionError {
    fn from(err: std::io::Error) -> Self {
        ConversionError::Io(err.to_string())
    }
}

/// Turns a raw texture into a file a renderer can load
pub trait TextureConverter: Send + Sync {
    /// Convert `source` and return the path of the written image
    fn convert(&self, name: &str, source: &TextureSource) -> Result<PathBuf, ConversionError>;
}

/// Runs the `GimConv` command-line tool as `<exe> <input> -o <output.png>`
#[derive(Debug, Clone)]
pub struct GimConv {
    executable: Option<PathBuf>,
    timeout: Duration,
    output_dir: PathBuf,
}

impl GimConv {
    pub fn new(executable: Option<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable,
            timeout: DEFAULT_CONVERTER_TIMEOUT,
            output_dir: output_dir.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn output_path(&self, name: &str, source: &TextureSource) -> PathBuf {
        let stem = Path::new(name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("texture");
        let file_name = match source {
            TextureSource::Embedded { offset, .. } => format!("{stem}_{offset:x}.png"),
            _ => format!("{stem}.png"),
        };
        self.output_dir.join(file_name)
    }

    fn run(&self, executable: &Path, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let stdout = tempfile::tempfile()?;
        let mut stderr = tempfile::tempfile()?;

        log::debug!(
            "Running {} {} -o {}",
            executable.display(),
            input.display(),
            output.display()
        );
        let mut child = Command::new(executable)
            .arg(input)
            .arg("-o")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr.try_clone()?))
            .spawn()?;

        let status = wait_with_timeout(&mut child, self.timeout)?;
        if !status.success() {
            return Err(ConversionError::ExitStatus {
                code: status.code(),
                stderr: read_excerpt(&mut stderr),
            });
        }
        if !output.is_file() {
            return Err(ConversionError::MissingOutput(output.to_path_buf()));
        }
        Ok(())
    }
}

impl TextureConverter for GimConv {
    fn convert(&self, name: &str, source: &TextureSource) -> Result<PathBuf, ConversionError> {
        let executable = self.executable.as_deref().ok_or_else(|| {
            ConversionError::ConverterUnavailable("no converter configured".to_string())
        })?;
        if !executable.is_file() {
            return Err(ConversionError::ConverterUnavailable(format!(
                "{} does not exist",
                executable.display()
            )));
        }

        fs::create_dir_all(&self.output_dir)?;
        let output = self.output_path(name, source);
        if output.exists() {
            fs::remove_file(&output)?;
        }

        match source {
            TextureSource::Embedded { data, .. } => {
                let extension = Path::new(name)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or_else(|| ".tm2".to_string(), |e| format!(".{e}"));
                let mut input = tempfile::Builder::new()
                    .prefix("psp-gmo-")
                    .suffix(&extension)
                    .tempfile()?;
                input.write_all(data)?;
                input.flush()?;
                self.run(executable, input.path(), &output)?;
            }
            TextureSource::File(path) => self.run(executable, path, &output)?,
            TextureSource::External { file_name } => {
                return Err(ConversionError::SourceNotFound(file_name.clone()));
            }
        }

        log::info!("Converted texture '{}' to {}", name, output.display());
        Ok(output)
    }
}

fn exit_description(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, ConversionError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                log::warn!("Failed to kill timed out converter: {e}");
            }
            let _ = child.wait();
            return Err(ConversionError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn read_excerpt(file: &mut File) -> String {
    let mut text = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = file.read_to_string(&mut text);
    }
    let text = text.trim();
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_EXCERPT)
        .map_or(0, |(i, _)| i);
    text[start..].to_string()
}
