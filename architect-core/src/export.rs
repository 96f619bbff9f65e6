//! Writing synthesized files to disk

use crate::config::ExportConfig;
use crate::pipeline::{FileImplementation, PipelineError, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

pub const MANIFEST_FILE: &str = "architect-manifest.json";

/// What an export wrote
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub output_dir: PathBuf,
    pub written: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry<'a> {
    path: &'a str,
    language: &'a str,
    implementation_order: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    test_path: Option<String>,
}

/// Writes Stage 3 artifacts under an output directory
pub struct ProjectExporter {
    overwrite: bool,
    write_manifest: bool,
}

impl ProjectExporter {
    pub fn new(config: &ExportConfig) -> Self {
        Self { overwrite: config.overwrite, write_manifest: config.write_manifest }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Write every file (and its tests) below `output_dir`
    ///
    /// All paths are checked before anything is written, so a bad path, two
    /// outputs for one file, or an existing file leaves the directory untouched.
    pub async fn export(&self, files: &[FileImplementation], output_dir: &Path) -> Result<ExportReport> {
        let mut planned: Vec<(PathBuf, &str)> = Vec::new();
        for file in files {
            planned.push((output_dir.join(safe_relative(file.key())?), file.code.as_str()));
            if let Some(tests) = &file.test_code {
                planned.push((output_dir.join(safe_relative(&test_file_path(file.key()))?), tests.as_str()));
            }
        }

        let mut seen = HashSet::new();
        let duplicates: BTreeSet<String> = planned
            .iter()
            .filter(|(path, _)| !seen.insert(path.as_path()))
            .map(|(path, _)| path.display().to_string())
            .collect();
        if !duplicates.is_empty() {
            return Err(PipelineError::InvalidInput(format!(
                "several outputs target the same file: {}",
                duplicates.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        if !self.overwrite {
            let mut existing = Vec::new();
            for (path, _) in &planned {
                if tokio::fs::try_exists(path).await? {
                    existing.push(path.display().to_string());
                }
            }
            if !existing.is_empty() {
                return Err(PipelineError::InvalidInput(format!(
                    "refusing to overwrite existing files: {}",
                    existing.join(", ")
                )));
            }
        }

        tokio::fs::create_dir_all(output_dir).await?;

        let mut report = ExportReport { output_dir: output_dir.to_path_buf(), ..Default::default() };
        for (path, content) in planned {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, content).await?;
            debug!("Wrote {}", path.display());
            report.written.push(path);
        }

        if self.write_manifest {
            let entries: Vec<ManifestEntry<'_>> = files
                .iter()
                .map(|file| ManifestEntry {
                    path: file.key(),
                    language: &file.language,
                    implementation_order: file.implementation_order,
                    test_path: file.test_code.as_ref().map(|_| test_file_path(file.key())),
                })
                .collect();
            let manifest = output_dir.join(MANIFEST_FILE);
            tokio::fs::write(&manifest, serde_json::to_string_pretty(&entries)?).await?;
            report.manifest = Some(manifest);
        }

        info!("Exported {} files to {}", report.written.len(), output_dir.display());
        Ok(report)
    }
}

/// Sibling test file for `path`, named the way each ecosystem expects
pub fn test_file_path(path: &str) -> String {
    let (dir, file) = match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    };
    let (stem, ext) = match file.rfind('.') {
        Some(i) if i > 0 => (&file[..i], Some(&file[i + 1..])),
        _ => (file, None),
    };

    let name = match ext {
        Some("go") => format!("{}_test.go", stem),
        Some("py") => format!("test_{}.py", stem),
        Some("rs") => format!("{}_test.rs", stem),
        Some(ext) => format!("{}.test.{}", stem, ext),
        None => format!("{}.test", stem),
    };
    format!("{}{}", dir, name)
}

/// Relative path with no root, prefix or `..` components
fn safe_relative(path: &str) -> Result<PathBuf> {
    let candidate = Path::new(path);
    if path.is_empty() || candidate.is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return Err(PipelineError::InvalidInput(format!("refusing to export to absolute path '{}'", path)));
    }

    let mut out = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PipelineError::InvalidInput(format!(
                    "refusing to export outside the output directory: '{}'",
                    path
                )));
            }
        }
    }

    if out.as_os_str().is_empty() {
        return Err(PipelineError::InvalidInput(format!("empty export path '{}'", path)));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(path: &str, code: &str, tests: Option<&str>) -> FileImplementation {
        FileImplementation {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            file_type: "module".to_string(),
            description: String::new(),
            purpose: String::new(),
            dependencies: Vec::new(),
            language: "javascript".to_string(),
            code: code.to_string(),
            test_code: tests.map(str::to_string),
            implementation_order: 1,
        }
    }

    fn exporter(overwrite: bool) -> ProjectExporter {
        ProjectExporter::new(&ExportConfig { overwrite, ..ExportConfig::default() })
    }

    #[test]
    fn test_test_file_names() {
        assert_eq!(test_file_path("src/app.js"), "src/app.test.js");
        assert_eq!(test_file_path("web/App.tsx"), "web/App.test.tsx");
        assert_eq!(test_file_path("pkg/util.go"), "pkg/util_test.go");
        assert_eq!(test_file_path("app/models.py"), "app/test_models.py");
        assert_eq!(test_file_path("src/parser.rs"), "src/parser_test.rs");
        assert_eq!(test_file_path("Makefile"), "Makefile.test");
    }

    #[test]
    fn test_unsafe_paths_are_rejected() {
        assert!(safe_relative("/etc/passwd").is_err());
        assert!(safe_relative("../outside.js").is_err());
        assert!(safe_relative("src/../../x").is_err());
        assert!(safe_relative("").is_err());
        assert_eq!(safe_relative("./src/a.js").unwrap(), PathBuf::from("src/a.js"));
    }

    #[tokio::test]
    async fn test_export_writes_files_tests_and_manifest() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("generated");
        let files = vec![
            artifact("src/db.js", "export const db = {};", None),
            artifact("src/api.js", "export function api() {}", Some("test('api', () => {});")),
        ];

        let report = exporter(false).export(&files, &out).await.unwrap();

        assert_eq!(report.written.len(), 3);
        assert_eq!(std::fs::read_to_string(out.join("src/db.js")).unwrap(), "export const db = {};");
        assert_eq!(
            std::fs::read_to_string(out.join("src/api.test.js")).unwrap(),
            "test('api', () => {});"
        );

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest[1]["path"], "src/api.js");
        assert_eq!(manifest[1]["testPath"], "src/api.test.js");
        assert!(manifest[0].get("testPath").is_none());
    }

    #[tokio::test]
    async fn test_existing_files_need_overwrite() {
        let dir = TempDir::new().unwrap();
        let files = vec![artifact("a.js", "new", None)];
        std::fs::write(dir.path().join("a.js"), "old").unwrap();

        let err = exporter(false).export(&files, dir.path()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.js")).unwrap(), "old");

        exporter(false).with_overwrite(true).export(&files, dir.path()).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.js")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_test_file_colliding_with_real_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let files = vec![
            artifact("app.test.js", "REAL FILE", None),
            artifact("app.js", "export {};", Some("GENERATED TEST")),
        ];

        let err = exporter(true).export(&files, &out).await.unwrap_err();
        match err {
            PipelineError::InvalidInput(message) => assert!(message.contains("app.test.js")),
            other => panic!("expected invalid input, got {other:?}"),
        }
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_bad_path_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");
        let files = vec![artifact("ok.js", "1", None), artifact("../escape.js", "2", None)];

        assert!(exporter(true).export(&files, &out).await.is_err());
        assert!(!out.exists());
    }
}
