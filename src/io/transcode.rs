//! Converting proprietary files into a peak list format before reading them.
//!
//! A [`Transcoder`] is registered for file names the registry has no reader for.
//! It writes an intermediate file into a scratch directory, which is then read
//! through the registry and deleted when the reader is closed.
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{PeakListError, Result};
use crate::io::compression::{CompressedPeakListReader, Envelope, ScratchSpace};
use crate::io::infer_format::{FormatDescriptor, FormatRegistry, TranscoderFactory};
use crate::io::traits::BoxedPeakListReader;

pub trait Transcoder: Send + Sync {
    /// Convert `input` into a file inside `scratch_dir` and return its path. The
    /// file name must resolve to a registered reader.
    fn transcode(&self, input: &Path, scratch_dir: &Path) -> Result<PathBuf>;
}

impl<F> Transcoder for F
where
    F: Fn(&Path, &Path) -> Result<PathBuf> + Send + Sync,
{
    fn transcode(&self, input: &Path, scratch_dir: &Path) -> Result<PathBuf> {
        (self)(input, scratch_dir)
    }
}

/// Runs an external program to do the conversion.
///
/// The arguments may contain `{input}` and `{output}` placeholders, which are
/// replaced by the source path and by a path in the scratch directory named
/// after the source with `output_extension`.
#[derive(Debug, Clone)]
pub struct CommandTranscoder {
    pub program: String,
    pub args: Vec<String>,
    pub output_extension: String,
}

impl CommandTranscoder {
    pub fn new(program: impl Into<String>, output_extension: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec!["{input}".to_string(), "{output}".to_string()],
            output_extension: output_extension.into(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    pub fn output_path(&self, input: &Path, scratch_dir: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcoded".to_string());
        scratch_dir.join(format!(
            "{stem}.{}",
            self.output_extension.trim_start_matches('.')
        ))
    }

    fn failed(&self, status: impl Into<String>) -> PeakListError {
        PeakListError::TranscoderFailed {
            program: self.program.clone(),
            status: status.into(),
        }
    }
}

impl Transcoder for CommandTranscoder {
    fn transcode(&self, input: &Path, scratch_dir: &Path) -> Result<PathBuf> {
        let output = self.output_path(input, scratch_dir);
        let input_arg = input.to_string_lossy();
        let output_arg = output.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                a.replace("{input}", &input_arg)
                    .replace("{output}", &output_arg)
            })
            .collect();
        debug!("Running {} {}", self.program, args.join(" "));
        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(self.failed(format!("{} {}", result.status, stderr.trim())));
        }
        if !output.exists() {
            return Err(self.failed(format!("no output was written to {}", output.display())));
        }
        Ok(output)
    }
}

/// Transcode `path` into `scratch` and open the result with the registry's plain
/// readers. The scratch space is deleted when the returned reader is closed.
pub(crate) fn open_transcoded_reader(
    registry: &FormatRegistry,
    path: &Path,
    descriptor: &FormatDescriptor<TranscoderFactory>,
    mut scratch: ScratchSpace,
) -> Result<BoxedPeakListReader> {
    let dir = scratch.create_dir()?;
    let output = descriptor.factory.transcode(path, &dir)?;
    if !output.starts_with(&dir) {
        scratch.adopt_path(output.clone());
    }
    debug!(
        "Transcoded {} into {} with {}",
        path.display(),
        output.display(),
        descriptor.name
    );
    let inner = registry.open_plain_reader(&output)?;
    Ok(Box::new(CompressedPeakListReader::new(
        inner,
        Envelope::Transcoded(descriptor.name.clone()),
        scratch,
    )))
}
