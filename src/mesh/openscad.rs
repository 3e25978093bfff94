use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;
use super::GeneratedMesh;
use crate::config::AutoTowersConfig;
use crate::error::{AutoTowersError, Result};
use crate::gcode::format_number;
use crate::tower::MeshParameter;

/// Compiles CAD templates to STL with the OpenSCAD command line.
#[derive(Debug, Clone)]
pub struct OpenScadGenerator {
    binary: PathBuf,
    timeout: Duration,
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Render a template parameter as an OpenSCAD `-D` definition.
pub fn definition(name: &str, value: &MeshParameter) -> String {
    match value {
        MeshParameter::Number(n) => format!("{}={}", name, format_number(*n, 6)),
        MeshParameter::Text(s) => {
            format!("{}=\"{}\"", name, s.replace('\\', "\\\\").replace('"', "\\\""))
        }
    }
}

impl OpenScadGenerator {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &AutoTowersConfig) -> Self {
        Self::new(&config.openscad_path, config.generation_timeout())
    }

    /// Compile `template` into a mesh inside a private temp directory.
    ///
    /// The compiler is killed on timeout or cancellation, and the temp
    /// directory is removed on every error path.
    pub async fn compile(
        &self,
        template: &Path,
        parameters: &BTreeMap<String, MeshParameter>,
        cancel: &CancelSignal,
    ) -> Result<GeneratedMesh> {
        if cancel.is_cancelled() {
            return Err(AutoTowersError::Cancelled);
        }
        if !template.exists() {
            return Err(AutoTowersError::ExternalTool(format!(
                "Template not found: {:?}",
                template
            )));
        }

        let workdir = tempfile::Builder::new().prefix("autotowers-").tempdir()?;
        let output = workdir.path().join("tower.stl");

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-o").arg(&output);
        for (name, value) in parameters {
            cmd.arg("-D").arg(definition(name, value));
        }
        cmd.arg(template)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {:?} on {:?}", self.binary, template);
        let mut child = cmd.spawn().map_err(|e| {
            AutoTowersError::ExternalTool(format!("Failed to start {:?}: {}", self.binary, e))
        })?;

        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut cancel = cancel.clone();
        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status),
            _ = tokio::time::sleep(self.timeout) => Outcome::TimedOut,
            _ = cancel.cancelled() => Outcome::Cancelled,
        };

        let status = match outcome {
            Outcome::Exited(status) => status?,
            Outcome::TimedOut => {
                warn!("Mesh generation exceeded {:?}, stopping compiler", self.timeout);
                let _ = child.kill().await;
                return Err(AutoTowersError::TimedOut(self.timeout));
            }
            Outcome::Cancelled => {
                info!("Mesh generation cancelled");
                let _ = child.kill().await;
                return Err(AutoTowersError::Cancelled);
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            warn!("Compiler failed ({}): {}", status, stderr.trim());
            return Err(AutoTowersError::ExternalTool(format!(
                "{:?} exited with {}: {}",
                self.binary,
                status,
                stderr.trim()
            )));
        }

        let produced = std::fs::metadata(&output).map(|m| m.len() > 0).unwrap_or(false);
        if !produced {
            return Err(AutoTowersError::ExternalTool(format!(
                "{:?} produced no mesh for {:?}",
                self.binary, template
            )));
        }

        info!("Generated tower mesh from {:?}", template);
        Ok(GeneratedMesh::temporary(output, workdir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions() {
        assert_eq!(
            definition("Starting_Value", &MeshParameter::Number(220.0)),
            "Starting_Value=220"
        );
        assert_eq!(
            definition("Section_Height", &MeshParameter::Number(8.25)),
            "Section_Height=8.25"
        );
        assert_eq!(
            definition("Tower_Label", &MeshParameter::Text("PLA \"A\"".to_string())),
            "Tower_Label=\"PLA \\\"A\\\"\""
        );
    }

    #[tokio::test]
    async fn test_missing_template() {
        let generator = OpenScadGenerator::new("openscad", Duration::from_secs(1));
        let err = generator
            .compile(
                Path::new("/nonexistent/tower.scad"),
                &BTreeMap::new(),
                &CancelSignal::never(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AutoTowersError::ExternalTool(_)));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        use crate::mesh::cancel::cancel_pair;

        /// Write an executable stand-in for the compiler and a dummy template.
        fn fake_compiler(body: &str) -> (TempDir, PathBuf, PathBuf) {
            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("fake-openscad");
            std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            let template = dir.path().join("tower.scad");
            std::fs::write(&template, "cube(10);\n").unwrap();
            (dir, script, template)
        }

        const WRITES_OUTPUT: &str = r#"
while [ "$#" -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
echo "solid tower" > "$out""#;

        #[tokio::test]
        async fn test_successful_compile_and_cleanup() {
            let (_dir, script, template) = fake_compiler(WRITES_OUTPUT);
            let generator = OpenScadGenerator::new(&script, Duration::from_secs(10));
            let mesh = generator
                .compile(&template, &BTreeMap::new(), &CancelSignal::never())
                .await
                .unwrap();
            let path = mesh.path().to_path_buf();
            assert!(path.exists());
            drop(mesh);
            assert!(!path.exists(), "temp mesh should be removed with its handle");
        }

        #[tokio::test]
        async fn test_failure_reports_stderr() {
            let (_dir, script, template) = fake_compiler("echo 'Parser error' >&2\nexit 1");
            let generator = OpenScadGenerator::new(&script, Duration::from_secs(10));
            let err = generator
                .compile(&template, &BTreeMap::new(), &CancelSignal::never())
                .await
                .unwrap_err();
            match err {
                AutoTowersError::ExternalTool(msg) => assert!(msg.contains("Parser error"), "{}", msg),
                other => panic!("unexpected error {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_timeout_stops_compiler() {
            let (_dir, script, template) = fake_compiler("sleep 5");
            let generator = OpenScadGenerator::new(&script, Duration::from_millis(100));
            let err = generator
                .compile(&template, &BTreeMap::new(), &CancelSignal::never())
                .await
                .unwrap_err();
            assert!(matches!(err, AutoTowersError::TimedOut(_)));
        }

        #[tokio::test]
        async fn test_cancellation_stops_compiler() {
            let (_dir, script, template) = fake_compiler("sleep 5");
            let generator = OpenScadGenerator::new(&script, Duration::from_secs(10));
            let (handle, signal) = cancel_pair();
            let canceller = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                handle.cancel();
            });
            let err = generator
                .compile(&template, &BTreeMap::new(), &signal)
                .await
                .unwrap_err();
            canceller.await.unwrap();
            assert!(matches!(err, AutoTowersError::Cancelled));
        }

        #[tokio::test]
        async fn test_empty_output_is_a_failure() {
            let (_dir, script, template) = fake_compiler("exit 0");
            let generator = OpenScadGenerator::new(&script, Duration::from_secs(10));
            let err = generator
                .compile(&template, &BTreeMap::new(), &CancelSignal::never())
                .await
                .unwrap_err();
            assert!(matches!(err, AutoTowersError::ExternalTool(_)));
        }
    }
}
