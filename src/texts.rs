// User-facing strings (English)

pub const PROJECT_NAME: &str = "Chat-MVP";
pub const PROJECT_SHORT_DESCRIPTION: &str = "GPT-4.1 PWA";

pub const GROUP_DEFAULT_TITLE: &str = "Input your query";
pub const GROUP_MISSING_INPUT: &str = "no column input found";

pub const PREVIEW_TRUNCATED: &str = "...";
pub const PREVIEW_ENCODING_ERROR: &str = "Preview unavailable (encoding issue)";
pub const PREVIEW_CSV_ERROR: &str = "Preview unavailable (CSV error)";
pub const PREVIEW_UNEXPECTED_ERROR: &str = "Preview unavailable (unexpected error)";
pub const PREVIEW_NO_VALID_FILES: &str = "Preview unavailable (no valid files)";

pub const UPLOAD_REJECTED: &str = "Error: Invalid file, session ID or upload path";

pub const HTML_DEFAULT_TITLE: &str = "Document";

pub const CHAT_NO_PROMPT: &str = "No prompt provided";
pub const CHAT_DRY_RUN_INFO: &str = "Chat dry run mode enabled. No environment variables loaded.";
pub const CHAT_SCHEMA_ANNOUNCE: &str = "\n\nStructured JSON response output schema:\n\n";

pub const DEFAULT_SYSTEM_MESSAGE: &str =
    "You are a helpful assistant. Please answer the user's questions as best as you can.";

pub fn doc_disclaimer(corp_name: &str) -> String {
    format!("{} @2025 No Warranty.", corp_name)
}
