//! Evidence inspection over scraped homepage HTML.
//!
//! A probe post carries tokens around the fragment under test; these
//! functions pull the fragment back out of the rendered page and decide what
//! the server did to it.

use regex::Regex;

/// The exact substring between the two markers, non-greedy, newlines
/// included. `None` when the markers never made it into the page.
pub fn extract_between(html: &str, open: &str, close: &str) -> Option<String> {
    let pattern = format!(
        "(?s){}(.*?){}",
        regex::escape(open),
        regex::escape(close)
    );
    let re = Regex::new(&pattern).unwrap();
    re.captures(html).map(|caps| caps[1].to_string())
}

/// Case-insensitive check that an opening tag survived the round trip.
pub fn tag_survived(content: &str, tag: &str) -> bool {
    content
        .to_ascii_lowercase()
        .contains(&format!("<{}", tag.to_ascii_lowercase()))
}

/// The entity-looking fragment published inside a probe title to tell apart
/// blogs that expect HTML titles from blogs that escape titles themselves.
pub const TITLE_PROBE_PATTERN: &str = "<b>&amp;&amp;amp;</b>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleEncoding {
    /// The page carried the single-escaped form: the blog expects titles to
    /// arrive already HTML-encoded.
    HtmlTitles,
    /// The page carried the double-escaped form: the blog escapes plain-text
    /// titles itself.
    PlainTitles,
    /// The markers were found but the fragment between them matched neither
    /// reference form.
    Unexpected(String),
}

/// Walk the text nodes of the parsed page for the one containing the opening
/// marker and classify the fragment between the markers.
///
/// Text nodes arrive entity-decoded from the parser, so the single-escaped
/// page form reads back as [`TITLE_PROBE_PATTERN`] itself and the
/// double-escaped form reads back as the pattern escaped once. Returns
/// `None` when no text node carries the opening marker at all, which callers
/// treat as an infrastructure failure rather than a detection outcome.
pub fn detect_title_encoding(html: &str, open: &str, close: &str) -> Option<TitleEncoding> {
    let document = scraper::Html::parse_document(html);
    for node_text in document.root_element().text() {
        let Some(start) = node_text.find(open) else {
            continue;
        };
        let after = &node_text[start + open.len()..];
        let observed = match after.find(close) {
            Some(end) => &after[..end],
            None => after,
        };
        let once_escaped = html_escape::encode_text(TITLE_PROBE_PATTERN);
        return Some(if observed == TITLE_PROBE_PATTERN {
            TitleEncoding::HtmlTitles
        } else if observed == once_escaped.as_ref() {
            TitleEncoding::PlainTitles
        } else {
            TitleEncoding::Unexpected(observed.to_string())
        });
    }
    None
}
