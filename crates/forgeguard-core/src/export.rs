//! Weights export before cloud sync.
//!
//! The serving Space loads plain weights rather than the full model file so
//! it stays compatible across framework versions. Deriving those weights
//! needs the training framework, so it runs as an external program.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hf_space_sync::WEIGHTS_FILE_NAME;
use tokio::process::Command;
use tracing::debug;

use crate::sync::SyncError;

/// Produces the weights file uploaded alongside a production model.
#[async_trait]
pub trait WeightsExporter: Send + Sync {
    /// Export weights of `model` into `out_dir`, returning the written file.
    async fn export(&self, model: &Path, out_dir: &Path) -> Result<PathBuf, SyncError>;
}

/// Uploads the model file itself as the weights file.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughExporter;

#[async_trait]
impl WeightsExporter for PassthroughExporter {
    async fn export(&self, model: &Path, out_dir: &Path) -> Result<PathBuf, SyncError> {
        let output = out_dir.join(WEIGHTS_FILE_NAME);
        tokio::fs::copy(model, &output)
            .await
            .map_err(|e| SyncError::Export(format!("copy {}: {e}", model.display())))?;
        Ok(output)
    }
}

/// Runs an external program to export weights.
///
/// `{model}` and `{output}` in the arguments are replaced with the model path
/// and the weights path to write.
#[derive(Debug, Clone)]
pub struct CommandExporter {
    program: String,
    args: Vec<String>,
}

impl CommandExporter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Parse a whitespace-separated command line, e.g.
    /// `python scripts/export_weights.py {model} {output}`.
    pub fn from_command_line(line: &str) -> Result<Self, SyncError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SyncError::NotConfigured("empty export command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    fn render_args(&self, model: &Path, output: &Path) -> Vec<String> {
        let model = model.to_string_lossy();
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{model}", &model).replace("{output}", &output))
            .collect()
    }
}

#[async_trait]
impl WeightsExporter for CommandExporter {
    async fn export(&self, model: &Path, out_dir: &Path) -> Result<PathBuf, SyncError> {
        let output_path = out_dir.join(WEIGHTS_FILE_NAME);
        let args = self.render_args(model, &output_path);
        debug!(program = %self.program, ?args, "running weights export");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| SyncError::Export(format!("failed to spawn {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::Export(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if !output_path.is_file() {
            return Err(SyncError::Export(format!(
                "{} did not write {}",
                self.program,
                output_path.display()
            )));
        }
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_is_split_and_rendered() {
        let exporter =
            CommandExporter::from_command_line("python export.py --in {model} --out {output}")
                .unwrap();
        let args = exporter.render_args(Path::new("/m/model.keras"), Path::new("/x/w.h5"));
        assert_eq!(
            args,
            vec!["export.py", "--in", "/m/model.keras", "--out", "/x/w.h5"]
        );
    }

    #[test]
    fn empty_command_line_is_not_configured() {
        assert!(matches!(
            CommandExporter::from_command_line("   "),
            Err(SyncError::NotConfigured(_))
        ));
    }

    #[tokio::test]
    async fn passthrough_copies_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.keras");
        std::fs::write(&model, b"model-bytes").unwrap();

        let out = PassthroughExporter.export(&model, dir.path()).await.unwrap();
        assert!(out.ends_with(WEIGHTS_FILE_NAME));
        assert_eq!(std::fs::read(out).unwrap(), b"model-bytes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_exporter_runs_program() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("model.keras");
        std::fs::write(&model, b"model-bytes").unwrap();

        let exporter = CommandExporter::new("cp", vec!["{model}".into(), "{output}".into()]);
        let out = exporter.export(&model, dir.path()).await.unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"model-bytes");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_exporter_failure_is_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = CommandExporter::new("false", vec![]);
        let err = exporter
            .export(&dir.path().join("model.keras"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Export(_)));
    }
}
