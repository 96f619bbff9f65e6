//! Data model shared by the pipeline stages
//!
//! Field names follow the camelCase JSON the model is asked to produce, so
//! responses decode straight into these types.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Vision produced by one specialist during Stage 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialistVision {
    pub role: String,
    pub expertise: String,
    pub vision_text: String,
    pub proposed_tree: FolderNode,
}

/// Metadata for a file that has not been written yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub purpose: String,
}

/// A folder in a proposed project tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
    #[serde(default)]
    pub subfolders: Vec<FolderNode>,
}

impl FolderNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            purpose: String::new(),
            files: Vec::new(),
            subfolders: Vec::new(),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>) -> Self {
        self.files.push(FileDescriptor {
            name: name.into(),
            description: String::new(),
            purpose: String::new(),
        });
        self
    }

    pub fn with_subfolder(mut self, folder: FolderNode) -> Self {
        self.subfolders.push(folder);
        self
    }

    /// Project-relative paths of every file in the tree
    ///
    /// The node itself is the project root, so its own name is not a segment.
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_paths("", &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for file in &self.files {
            out.push(normalize_path(&join_path(prefix, &file.name)));
        }
        for folder in &self.subfolders {
            folder.collect_paths(&join_path(prefix, &folder.name), out);
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len() + self.subfolders.iter().map(FolderNode::file_count).sum::<usize>()
    }

    pub fn folder_count(&self) -> usize {
        1 + self.subfolders.iter().map(FolderNode::folder_count).sum::<usize>()
    }
}

/// A file in the integrated dependency graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyFile {
    #[serde(default)]
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(rename = "type", default)]
    pub file_type: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub dependents: Vec<String>,
    #[serde(default)]
    pub implementation_order: u32,
    /// Edges demoted because keeping them would have closed a cycle
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisory_dependencies: Vec<String>,
}

impl DependencyFile {
    pub fn new(path: impl Into<String>, implementation_order: u32) -> Self {
        let path = path.into();
        let name = file_name(&path).to_string();
        Self {
            name,
            path,
            description: String::new(),
            purpose: String::new(),
            file_type: String::new(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
            implementation_order,
            advisory_dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Canonical project-relative path of the file
    ///
    /// `path` may be the containing directory or the full file path; both
    /// conventions show up in model output.
    pub fn key(&self) -> String {
        let path = normalize_path(&self.path);
        let name = normalize_path(&self.name);

        if name.is_empty() {
            return path;
        }
        if path.is_empty() {
            return name;
        }
        if path == name || path.ends_with(&format!("/{}", name)) {
            path
        } else {
            format!("{}/{}", path, name)
        }
    }
}

/// One synthesized file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileImplementation {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub description: String,
    pub purpose: String,
    pub dependencies: Vec<String>,
    pub language: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_code: Option<String>,
    pub implementation_order: u32,
}

impl FileImplementation {
    /// Canonical project-relative path; `path` is always stored canonical
    pub fn key(&self) -> &str {
        &self.path
    }
}

/// Output of the integration stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratedDesign {
    pub integrated_vision: String,
    pub resolution_notes: Vec<String>,
    pub root_folder: FolderNode,
    pub dependency_tree: Vec<DependencyFile>,
}

impl IntegratedDesign {
    pub fn file(&self, key: &str) -> Option<&DependencyFile> {
        self.dependency_tree.iter().find(|f| f.key() == key)
    }
}

/// Normalize a project-relative path for comparison
///
/// Backslashes become `/`, leading `./` and `/` are dropped and empty or `.`
/// segments are removed.
pub fn normalize_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() { name.to_string() } else { format!("{}/{}", prefix, name) }
}

/// Last path segment
pub fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Guess a language tag from a file extension
pub fn language_from_path(path: &str) -> String {
    let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();

    match ext.as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "java" => "java",
        "kt" => "kotlin",
        "swift" => "swift",
        "rb" => "ruby",
        "php" => "php",
        "cs" => "csharp",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "sol" => "solidity",
        "html" => "html",
        "css" | "scss" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" => "markdown",
        "sql" => "sql",
        "sh" => "shell",
        _ => "text",
    }
    .to_string()
}
