//! HTML rendering of the editable document for the in-page preview

use pulldown_cmark::{html, Event, Options, Parser};

/// Render Markdown to an HTML fragment.
///
/// Raw HTML in the source is shown as text, never passed through, since the
/// document mixes user edits with model answers.
pub fn render_preview_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let events = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}
