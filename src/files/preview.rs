//! Table preview of the first usable upload
//!
//! Produces a rectangular, HTML-escaped table plus the first two columns
//! that seed the group panels. Every failure mode still yields a table with
//! a single placeholder row so the UI never has to special-case errors.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use serde::Serialize;
use tracing::{debug, warn};

use super::{file_extension, validate_path};
use crate::config::UploadConfig;
use crate::texts;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreviewTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilePreview {
    pub table: PreviewTable,
    /// Group titles, one per data row whose first cell is non-empty.
    pub first_column: Vec<String>,
    /// Group inputs, aligned with `first_column`.
    pub second_column: Vec<String>,
}

impl FilePreview {
    fn placeholder(message: &str) -> Self {
        Self {
            table: PreviewTable {
                headers: Vec::new(),
                rows: vec![vec![message.to_string()]],
            },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PreviewFailure {
    Encoding,
    Malformed,
    Unexpected,
}

impl PreviewFailure {
    fn message(self) -> &'static str {
        match self {
            PreviewFailure::Encoding => texts::PREVIEW_ENCODING_ERROR,
            PreviewFailure::Malformed => texts::PREVIEW_CSV_ERROR,
            PreviewFailure::Unexpected => texts::PREVIEW_UNEXPECTED_ERROR,
        }
    }
}

impl From<csv::Error> for PreviewFailure {
    fn from(err: csv::Error) -> Self {
        match err.kind() {
            csv::ErrorKind::Utf8 { .. } => PreviewFailure::Encoding,
            csv::ErrorKind::Io(_) => PreviewFailure::Unexpected,
            _ => PreviewFailure::Malformed,
        }
    }
}

/// Preview the first file of `files` that passes upload validation.
///
/// Blocking: call from `spawn_blocking` inside async handlers.
pub fn build_preview(files: &[PathBuf], has_headers: bool, limits: &UploadConfig) -> FilePreview {
    for path in files {
        if let Err(e) = validate_path(path, limits) {
            warn!(path = %path.display(), error = %e, "Skipping file in preview");
            continue;
        }

        let preview = match read_file(path, has_headers, limits.max_rows) {
            Ok(preview) => preview,
            Err(failure) => {
                warn!(path = %path.display(), ?failure, "Preview failed");
                FilePreview::placeholder(failure.message())
            }
        };
        if preview.table.rows.is_empty() {
            break;
        }
        debug!(
            path = %path.display(),
            rows = preview.table.rows.len(),
            columns = preview.table.headers.len(),
            "Built preview"
        );
        return preview;
    }

    FilePreview::placeholder(texts::PREVIEW_NO_VALID_FILES)
}

fn read_file(path: &Path, has_headers: bool, max_rows: usize) -> Result<FilePreview, PreviewFailure> {
    let name = path.to_string_lossy();
    match file_extension(&name).as_deref() {
        Some(".xlsx") => read_spreadsheet(path, has_headers, max_rows),
        Some(".tsv") => read_delimited(path, b'\t', has_headers, max_rows),
        _ => read_delimited(path, b',', has_headers, max_rows),
    }
}

fn read_delimited(
    path: &Path,
    delimiter: u8,
    has_headers: bool,
    max_rows: usize,
) -> Result<FilePreview, PreviewFailure> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)?;
    let rows = reader.into_records().map(|record| {
        record
            .map(|r| r.iter().map(str::to_string).collect())
            .map_err(PreviewFailure::from)
    });
    normalize_rows(rows, has_headers, max_rows)
}

fn read_spreadsheet(path: &Path, has_headers: bool, max_rows: usize) -> Result<FilePreview, PreviewFailure> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Cannot open workbook");
        PreviewFailure::Unexpected
    })?;
    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            warn!(path = %path.display(), error = %e, "Cannot read first sheet");
            return Err(PreviewFailure::Unexpected);
        }
        None => return Ok(FilePreview::default()),
    };
    let rows = range
        .rows()
        .map(|row| Ok(row.iter().map(cell_text).collect()));
    normalize_rows(rows, has_headers, max_rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn normalize_rows<I>(rows: I, has_headers: bool, max_rows: usize) -> Result<FilePreview, PreviewFailure>
where
    I: Iterator<Item = Result<Vec<String>, PreviewFailure>>,
{
    let mut preview = FilePreview::default();
    let mut headers: Vec<String> = Vec::new();
    let mut width = 0;
    let mut data_rows = 0;

    for (idx, row) in rows.enumerate() {
        let row: Vec<String> = row?
            .iter()
            .map(|cell| html_escape::encode_quoted_attribute(cell).into_owned())
            .collect();

        if idx == 0 && has_headers {
            width = row.len();
            headers = row;
            continue;
        }
        if data_rows >= max_rows {
            preview.table.rows.push(vec![texts::PREVIEW_TRUNCATED.to_string()]);
            break;
        }

        if let Some(first) = row.first().filter(|cell| !cell.is_empty()) {
            preview.first_column.push(first.clone());
            preview.second_column.push(
                row.get(1)
                    .cloned()
                    .unwrap_or_else(|| texts::GROUP_MISSING_INPUT.to_string()),
            );
        }
        width = width.max(row.len());
        preview.table.rows.push(row);
        data_rows += 1;
    }

    preview.table.headers = if has_headers {
        headers.resize(width, String::new());
        headers
    } else {
        (1..=width).map(|n| n.to_string()).collect()
    };
    for row in &mut preview.table.rows {
        row.resize(width, String::new());
    }
    Ok(preview)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body).unwrap();
        path
    }

    fn limits(max_rows: usize) -> UploadConfig {
        UploadConfig {
            max_rows,
            ..UploadConfig::default()
        }
    }

    #[test]
    fn test_rows_and_headers_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "q.csv", b"title,prompt\nA,ask a,extra\nB\n");
        let preview = build_preview(&[path], true, &limits(10));

        assert_eq!(preview.table.headers, vec!["title", "prompt", ""]);
        assert_eq!(
            preview.table.rows,
            vec![vec!["A", "ask a", "extra"], vec!["B", "", ""]]
        );
        assert_eq!(preview.first_column, vec!["A", "B"]);
        assert_eq!(preview.second_column, vec!["ask a", texts::GROUP_MISSING_INPUT]);
    }

    #[test]
    fn test_synthetic_headers_without_header_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "q.csv", b"A,1\nB,2,3\n");
        let preview = build_preview(&[path], false, &limits(10));

        assert_eq!(preview.table.headers, vec!["1", "2", "3"]);
        assert_eq!(preview.table.rows.len(), 2);
        assert_eq!(preview.first_column, vec!["A", "B"]);
    }

    #[test]
    fn test_truncation_adds_single_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let body: String = (0..8).map(|i| format!("t{},p{}\n", i, i)).collect();
        let path = write_file(&dir, "many.csv", body.as_bytes());
        let preview = build_preview(&[path], false, &limits(3));

        assert_eq!(preview.table.rows.len(), 4);
        assert_eq!(preview.table.rows[3], vec![texts::PREVIEW_TRUNCATED, ""]);
        let sentinels = preview
            .table
            .rows
            .iter()
            .filter(|r| r[0] == texts::PREVIEW_TRUNCATED)
            .count();
        assert_eq!(sentinels, 1);
        assert_eq!(preview.first_column.len(), 3);
    }

    #[test]
    fn test_exact_row_count_has_no_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "few.csv", b"h1,h2\na,1\nb,2\n");
        let preview = build_preview(&[path], true, &limits(2));
        assert_eq!(preview.table.rows.len(), 2);
    }

    #[test]
    fn test_cells_are_html_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "x.csv", b"<b>bold</b>,\"Tom & 'Jerry'\"\n");
        let preview = build_preview(&[path], false, &limits(10));

        assert_eq!(preview.table.rows[0][0], "&lt;b&gt;bold&lt;/b&gt;");
        let quoted = &preview.second_column[0];
        assert!(quoted.starts_with("Tom &amp; "));
        assert!(!quoted.contains('\''));
        assert!(!quoted.contains('"'));
    }

    #[test]
    fn test_empty_first_cell_not_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "gaps.csv", b"a,1\n,2\nc,3\n");
        let preview = build_preview(&[path], false, &limits(10));

        assert_eq!(preview.table.rows.len(), 3);
        assert_eq!(preview.first_column, vec!["a", "c"]);
        assert_eq!(preview.second_column, vec!["1", "3"]);
    }

    #[test]
    fn test_tsv_uses_tab() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "q.tsv", b"a,b\tc\n");
        let preview = build_preview(&[path], false, &limits(10));
        assert_eq!(preview.table.rows, vec![vec!["a,b", "c"]]);
    }

    #[test]
    fn test_invalid_utf8_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "latin.txt", &[b'a', b',', 0xe9, 0xff, b'\n']);
        let preview = build_preview(&[path], false, &limits(10));

        assert_eq!(preview.table.rows, vec![vec![texts::PREVIEW_ENCODING_ERROR]]);
        assert!(preview.first_column.is_empty());
    }

    #[test]
    fn test_no_valid_files() {
        let dir = tempfile::tempdir().unwrap();
        let empty = write_file(&dir, "empty.csv", b"");
        let wrong = write_file(&dir, "notes.md", b"# hi");
        let missing = dir.path().join("missing.csv");

        let preview = build_preview(&[empty, wrong, missing], true, &limits(10));
        assert_eq!(preview.table.rows, vec![vec![texts::PREVIEW_NO_VALID_FILES]]);

        let preview = build_preview(&[], true, &limits(10));
        assert_eq!(preview.table.rows, vec![vec![texts::PREVIEW_NO_VALID_FILES]]);
    }

    #[test]
    fn test_only_first_valid_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_file(&dir, "bad.exe", b"MZ");
        let first = write_file(&dir, "one.csv", b"one,1\n");
        let second = write_file(&dir, "two.csv", b"two,2\n");

        let preview = build_preview(&[bad, first, second], false, &limits(10));
        assert_eq!(preview.first_column, vec!["one"]);
    }

    #[test]
    fn test_header_only_file_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "h.csv", b"title,prompt\n");
        let preview = build_preview(&[path], true, &limits(10));
        assert_eq!(preview.table.rows, vec![vec![texts::PREVIEW_NO_VALID_FILES]]);
    }

    #[test]
    fn test_xlsx_first_sheet_is_previewed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "title").unwrap();
        sheet.write_string(0, 1, "prompt").unwrap();
        sheet.write_string(1, 0, "Rates").unwrap();
        sheet.write_string(1, 1, "Is 3 < 4?").unwrap();
        sheet.write_string(2, 0, "Count").unwrap();
        sheet.write_number(2, 1, 42).unwrap();
        workbook.save(&path).unwrap();

        let preview = build_preview(&[path], true, &limits(10));
        assert_eq!(preview.table.headers, vec!["title", "prompt"]);
        assert_eq!(
            preview.table.rows,
            vec![vec!["Rates", "Is 3 &lt; 4?"], vec!["Count", "42"]]
        );
        assert_eq!(preview.first_column, vec!["Rates", "Count"]);
    }

    #[test]
    fn test_corrupt_xlsx_is_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "broken.xlsx", b"not a zip archive");
        let preview = build_preview(&[path], true, &limits(10));
        assert_eq!(preview.table.rows, vec![vec![texts::PREVIEW_UNEXPECTED_ERROR]]);
        assert!(preview.first_column.is_empty());
    }
}
