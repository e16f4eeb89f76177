//! Combined document assembly
//!
//! Turns the per-panel (header, input, output) triples into one Markdown
//! document, and into the three-column results CSV.

pub mod flat;
pub mod html;

pub use flat::{decode_flat, encode_flat, FlatDecodeError};
pub use html::render_preview_html;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::groups::GroupArena;
use crate::texts;

pub const RESULTS_CSV_HEADER: [&str; 3] = ["Header", "Input Value", "Output Value"];

/// Everything needed to assemble a document, one list entry per panel.
///
/// `tail` carries extra context; its first entry is the uploaded file whose
/// base name titles the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputRequest {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub tail: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum OutputError {
    #[error("no uploaded file to title the document")]
    MissingFileName,
}

impl OutputRequest {
    pub fn from_groups(groups: &GroupArena, tail: Vec<String>) -> Self {
        Self {
            headers: groups.headers(),
            inputs: groups.inputs(),
            outputs: groups.outputs(),
            tail,
        }
    }

    /// Panels as aligned triples; the shortest list decides the count.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.headers
            .iter()
            .zip(&self.inputs)
            .zip(&self.outputs)
            .map(|((h, i), o)| (h.as_str(), i.as_str(), o.as_str()))
    }
}

/// Build the Markdown document. Pure and deterministic.
pub fn assemble_markdown(request: &OutputRequest, corp_name: &str) -> Result<String, OutputError> {
    let source = request.tail.first().ok_or(OutputError::MissingFileName)?;
    let file_name = Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut doc = format!("# {}\n\n", file_name);
    for (idx, (header, input, output)) in request.sections().enumerate() {
        doc.push_str(&format!("## {}. {}\n\n{}: {}\n\n", idx + 1, header, input, output));
    }
    doc.push_str(&format!("\n_{}_", texts::doc_disclaimer(corp_name)));
    Ok(doc)
}

/// Like [`assemble_markdown`] but failures become the document text.
pub fn render_output(request: &OutputRequest, corp_name: &str) -> String {
    match assemble_markdown(request, corp_name) {
        Ok(doc) => doc,
        Err(e) => {
            let msg = format!("Error while generating output: {}", e);
            error!("{}", msg);
            msg
        }
    }
}

/// Write the `Header, Input Value, Output Value` results table.
pub fn write_results_csv(path: &Path, request: &OutputRequest) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(RESULTS_CSV_HEADER)?;
    for (header, input, output) in request.sections() {
        writer.write_record([header, input, output])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> OutputRequest {
        OutputRequest {
            headers: vec!["Q1".into()],
            inputs: vec!["What is X?".into()],
            outputs: vec!["X is Y.".into()],
            tail: vec!["/tmp/uploads/abc/data.csv".into()],
        }
    }

    #[test]
    fn test_assemble_example_document() {
        let doc = assemble_markdown(&request(), "ACME").unwrap();
        assert_eq!(
            doc,
            "# data.csv\n\n## 1. Q1\n\nWhat is X?: X is Y.\n\n\n_ACME @2025 No Warranty._"
        );
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let mut req = request();
        req.headers.push("Q2".into());
        req.inputs.push("Why?".into());
        req.outputs.push(String::new());
        let first = assemble_markdown(&req, "ACME").unwrap();
        let second = assemble_markdown(&req.clone(), "ACME").unwrap();
        assert_eq!(first, second);
        assert!(first.contains("## 2. Q2\n\nWhy?: \n\n"));
    }

    #[test]
    fn test_sections_stop_at_shortest_list() {
        let mut req = request();
        req.headers.push("orphan".into());
        let doc = assemble_markdown(&req, "ACME").unwrap();
        assert!(!doc.contains("orphan"));
    }

    #[test]
    fn test_empty_tail_is_reported() {
        let mut req = request();
        req.tail.clear();
        assert_eq!(assemble_markdown(&req, "ACME"), Err(OutputError::MissingFileName));
        assert!(render_output(&req, "ACME").starts_with("Error while generating output: "));
    }

    #[test]
    fn test_from_groups() {
        let mut arena = GroupArena::new(4);
        arena.seed(&["a".to_string(), "b".to_string()], &["1".to_string()]);
        let req = OutputRequest::from_groups(&arena, vec!["f.csv".into()]);
        assert_eq!(req.headers, vec!["a", "b"]);
        assert_eq!(req.inputs, vec!["1", ""]);
        assert_eq!(req.outputs, vec!["", ""]);
    }

    #[test]
    fn test_results_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Output_abcdef.csv");
        let mut req = request();
        req.outputs[0] = "X, clearly".into();
        write_results_csv(&path, &req).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec!["Header,Input Value,Output Value", "Q1,What is X?,\"X, clearly\""]
        );
    }
}
