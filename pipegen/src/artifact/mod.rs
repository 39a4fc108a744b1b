//! Generation artifact grammar
//!
//! The generator answers in a fixed textual layout:
//!
//! ```text
//! PIPELINE_YAML:
//! <document text, top-level key "pipeline">
//!
//! NOTEBOOKS:
//! # Notebook: <id>
//! <code>
//! # Notebook: <id>
//! <code>
//! ```
//!
//! Grammar, line oriented:
//! - the document starts after the first line beginning with `PIPELINE_YAML:`
//!   (anything after the label on that line belongs to the document); if the
//!   label is absent the whole text is the document
//! - the document ends at the first line beginning with `NOTEBOOKS:`
//! - delimiter lines (`---` or a code fence) inside the document are dropped
//! - each notebook section starts at a line beginning with `# Notebook:`;
//!   text between `NOTEBOOKS:` and the first header is ignored
//!
//! The same parse feeds the validator and whatever deploys the artifact.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const PIPELINE_LABEL: &str = "PIPELINE_YAML:";
pub const NOTEBOOKS_LABEL: &str = "NOTEBOOKS:";
pub const NOTEBOOK_HEADER: &str = "# Notebook:";

/// Artifact returned when every model fails and the run is configured to keep going
pub const PLACEHOLDER_ARTIFACT: &str = include_str!("placeholder.txt");

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact {0} is empty")]
    Empty(String),
}

/// One auxiliary code section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookSection {
    pub id: String,
    pub code: String,
}

/// A parsed generation artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    raw: String,
    document: String,
    line_map: Vec<usize>,
    notebooks: Vec<NotebookSection>,
}

impl Artifact {
    pub fn parse(text: &str) -> Self {
        debug!(text_len = text.len(), "Artifact::parse: called");
        let sections = split_sections(text);
        let notebooks = sections.notebooks.map(parse_notebooks).unwrap_or_default();
        debug!(
            document_len = sections.document.len(),
            notebook_count = notebooks.len(),
            "Artifact::parse: parsed"
        );
        Self {
            raw: text.to_string(),
            document: sections.document,
            line_map: sections.line_map,
            notebooks,
        }
    }

    /// Read and parse an artifact saved to disk
    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        debug!(?path, "Artifact::from_file: called");
        let text = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if text.trim().is_empty() {
            return Err(ArtifactError::Empty(path.display().to_string()));
        }
        Ok(Self::parse(&text))
    }

    /// The artifact exactly as generated
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The structured-document portion, ready for the YAML parser
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Raw artifact line (1-based) of a document line (1-based)
    pub fn raw_line(&self, document_line: usize) -> Option<usize> {
        document_line.checked_sub(1).and_then(|i| self.line_map.get(i).copied())
    }

    pub fn notebooks(&self) -> &[NotebookSection] {
        &self.notebooks
    }

    pub fn notebook(&self, id: &str) -> Option<&NotebookSection> {
        self.notebooks.iter().find(|n| n.id == id)
    }
}

fn is_delimiter(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("```") || (trimmed.starts_with("---") && trimmed.chars().all(|c| c == '-'))
}

/// Document portion of an artifact, with the raw line each document line came from
struct Sections<'a> {
    document: String,
    /// 1-based raw line number of each document line
    line_map: Vec<usize>,
    /// Raw text after the notebooks label
    notebooks: Option<&'a str>,
}

fn split_sections(text: &str) -> Sections<'_> {
    let mut lines = text.split_inclusive('\n');
    let mut offset = 0;
    let mut raw_line = 0;
    let mut document_lines: Vec<(usize, &str)> = Vec::new();

    let has_label = text.lines().any(|l| l.trim_start().starts_with(PIPELINE_LABEL));
    if has_label {
        for line in lines.by_ref() {
            offset += line.len();
            raw_line += 1;
            if let Some(rest) = line.trim_start().strip_prefix(PIPELINE_LABEL) {
                if !rest.trim().is_empty() {
                    document_lines.push((raw_line, rest.trim()));
                }
                break;
            }
        }
    }

    let mut notebooks = None;
    for line in lines {
        offset += line.len();
        raw_line += 1;
        if line.trim_start().starts_with(NOTEBOOKS_LABEL) {
            notebooks = Some(&text[offset..]);
            break;
        }
        let line = line.trim_end_matches(['\n', '\r']);
        if !is_delimiter(line) {
            document_lines.push((raw_line, line));
        }
    }
    debug!(has_notebooks = notebooks.is_some(), "split_sections: done");

    let joined = document_lines.iter().map(|(_, l)| *l).collect::<Vec<_>>().join("\n");
    let leading = joined.len() - joined.trim_start().len();
    let skipped = joined[..leading].matches('\n').count();
    Sections {
        document: joined.trim().to_string(),
        line_map: document_lines.into_iter().skip(skipped).map(|(n, _)| n).collect(),
        notebooks,
    }
}

fn parse_notebooks(text: &str) -> Vec<NotebookSection> {
    let mut sections: Vec<NotebookSection> = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some(id) = line.trim_start().strip_prefix(NOTEBOOK_HEADER) {
            if let Some((id, code)) = current.take() {
                sections.push(finish_section(id, code));
            }
            current = Some((id.trim().to_string(), Vec::new()));
        } else if let Some((_, ref mut code)) = current {
            code.push(line);
        }
    }
    if let Some((id, code)) = current {
        sections.push(finish_section(id, code));
    }
    sections
}

fn finish_section(id: String, code: Vec<&str>) -> NotebookSection {
    let code: Vec<&str> = code.into_iter().filter(|l| !l.trim().starts_with("```")).collect();
    NotebookSection {
        id,
        code: code.join("\n").trim().to_string(),
    }
}
