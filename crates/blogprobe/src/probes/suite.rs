//! The concrete capability probes. Each one is a small policy plugged into
//! the shared publish/poll/cleanup skeleton; the option keys they emit are
//! the public contract of the provider catalog.

use super::{BlogTarget, BodyContent, BodyHooks, CompositePost, DirectHooks, PostHooks, Probe,
            RoundtripHooks, RunOptions};
use crate::client::BlogClient;
use crate::prelude::*;
use async_trait::async_trait;
use blogprobe_core::blog::BlogPost;
use blogprobe_core::content::{self, TitleEncoding, TITLE_PROBE_PATTERN};
use blogprobe_core::results::{ProbeResults, NO, YES};
use blogprobe_core::token::Token;

/// Assign two existing categories and count how many come back through the
/// API.
pub struct MultipleCategories;

#[async_trait]
impl RoundtripHooks for MultipleCategories {
    fn name(&self) -> &'static str {
        "multiple-categories"
    }

    async fn prepare(
        &self,
        client: &dyn BlogClient,
        target: &BlogTarget,
        post: &mut BlogPost,
    ) -> Result<()> {
        let categories = client.get_categories(&target.blog_id).await?;
        if categories.len() < 2 {
            return Err(eyre!(
                "blog has {} categories; at least two are needed to probe multi-category support",
                categories.len()
            ));
        }
        post.title = "category probe".to_string();
        post.body = "Checking how many categories survive the round trip.".to_string();
        post.categories = categories
            .into_iter()
            .take(2)
            .map(|category| category.name)
            .collect();
        Ok(())
    }

    fn interpret(&self, roundtripped: &BlogPost, results: &mut ProbeResults) -> Result<()> {
        results.add(
            "supportsMultipleCategories",
            if roundtripped.categories.len() == 2 {
                YES
            } else {
                NO
            },
        );
        Ok(())
    }
}

/// Publish with the publish flag off; a draft must never reach the homepage.
pub struct PostAsDraft;

impl PostHooks for PostAsDraft {
    fn name(&self) -> &'static str {
        "post-as-draft"
    }

    fn prepare(&self, post: &mut BlogPost, publish: &mut bool) {
        post.title = "draft probe".to_string();
        post.body = "This post was published with the publish flag off.".to_string();
        *publish = false;
    }

    fn interpret(&self, _html: &str, results: &mut ProbeResults) -> Result<()> {
        // The draft showed up anyway: the flag was ignored.
        results.add("supportsPostAsDraft", NO);
        Ok(())
    }

    fn on_timeout(&self, results: &mut ProbeResults) -> bool {
        results.add("supportsPostAsDraft", YES);
        true
    }
}

/// Publish dated well into the future; a server that honors scheduling holds
/// the post back, one that ignores the date publishes immediately and the
/// operator deserves a warning.
pub struct FuturePost;

impl PostHooks for FuturePost {
    fn name(&self) -> &'static str {
        "future-post"
    }

    fn prepare(&self, post: &mut BlogPost, _publish: &mut bool) {
        post.title = "future-dated probe".to_string();
        post.body = "This post is dated twelve days from now.".to_string();
        post.date_published = Some(chrono::Utc::now() + chrono::Duration::days(12));
    }

    fn interpret(&self, _html: &str, results: &mut ProbeResults) -> Result<()> {
        results.add("futurePublishDateWarning", YES);
        Ok(())
    }

    fn on_timeout(&self, results: &mut ProbeResults) -> bool {
        results.add("futurePublishDateWarning", NO);
        true
    }
}

/// Try publishing with an empty title; the API either takes it or throws.
pub struct EmptyTitles;

#[async_trait]
impl DirectHooks for EmptyTitles {
    fn name(&self) -> &'static str {
        "empty-titles"
    }

    async fn run(
        &self,
        client: &dyn BlogClient,
        target: &BlogTarget,
        results: &mut ProbeResults,
        options: &RunOptions,
    ) -> Result<()> {
        let post = BlogPost {
            title: String::new(),
            body: f!("Empty-title probe {}", Token::random()),
            ..Default::default()
        };
        match client.new_post(&target.blog_id, &post, true).await {
            Ok(post_id) => {
                results.add("supportsEmptyTitles", YES);
                if options.cleanup {
                    let _ = client.delete_post(&target.blog_id, &post_id).await;
                }
            }
            Err(_) => {
                results.add("supportsEmptyTitles", NO);
            }
        }
        Ok(())
    }
}

/// Publish a title full of markup and entities, then read how the homepage
/// rendered it to learn whether the blog expects pre-escaped HTML titles.
pub struct TitleEncodingProbe {
    open: Token,
    close: Token,
}

impl TitleEncodingProbe {
    pub fn new() -> Self {
        TitleEncodingProbe {
            open: Token::random(),
            close: Token::random(),
        }
    }
}

impl PostHooks for TitleEncodingProbe {
    fn name(&self) -> &'static str {
        "title-encoding"
    }

    fn prepare(&self, post: &mut BlogPost, _publish: &mut bool) {
        post.title = f!("{}{}{}", self.open, TITLE_PROBE_PATTERN, self.close);
        post.body = "Title-encoding probe.".to_string();
    }

    fn interpret(&self, html: &str, results: &mut ProbeResults) -> Result<()> {
        match content::detect_title_encoding(html, self.open.as_str(), self.close.as_str()) {
            Some(TitleEncoding::HtmlTitles) => results.add("requiresHtmlTitles", YES),
            Some(TitleEncoding::PlainTitles) => results.add("requiresHtmlTitles", NO),
            Some(TitleEncoding::Unexpected(observed)) => results.add(
                "requiresHtmlTitles",
                f!("[ERROR] unexpected title rendering: {observed}"),
            ),
            None => return Err(Error::MissingEvidence.into()),
        }
        Ok(())
    }
}

/// Does an `<embed>` tag survive the body round trip?
pub struct Embeds;

impl BodyHooks for Embeds {
    fn name(&self) -> &'static str {
        "embeds"
    }

    fn fragment(&self) -> String {
        "<embed src=\"http://www.example.com/movie.swf\" width=\"320\" height=\"240\">"
            .to_string()
    }

    fn interpret_content(&self, content: &str, results: &mut ProbeResults) -> Result<()> {
        results.add(
            "supportsEmbeds",
            if content::tag_survived(content, "embed") {
                YES
            } else {
                NO
            },
        );
        Ok(())
    }
}

/// Does a `<script>` tag survive the body round trip?
pub struct Scripts;

impl BodyHooks for Scripts {
    fn name(&self) -> &'static str {
        "scripts"
    }

    fn fragment(&self) -> String {
        "<script type=\"text/javascript\">document.write(\"probe\");</script>".to_string()
    }

    fn interpret_content(&self, content: &str, results: &mut ProbeResults) -> Result<()> {
        results.add(
            "supportsScripts",
            if content::tag_survived(content, "script") {
                YES
            } else {
                NO
            },
        );
        Ok(())
    }
}

/// The full ordered suite, minus any probes the provider excludes by name.
/// The body-content probes share one composite publish/poll cycle so a run
/// costs the remote server as few posts as possible.
pub fn default_suite(excluded: &[String]) -> Vec<Probe> {
    let enabled =
        |name: &str| !excluded.iter().any(|excl| excl.eq_ignore_ascii_case(name));

    let mut probes = Vec::new();
    if enabled("multiple-categories") {
        probes.push(Probe::Roundtrip(Box::new(MultipleCategories)));
    }
    if enabled("post-as-draft") {
        probes.push(Probe::Post(Box::new(PostAsDraft)));
    }
    if enabled("future-post") {
        probes.push(Probe::Post(Box::new(FuturePost)));
    }
    if enabled("empty-titles") {
        probes.push(Probe::Direct(Box::new(EmptyTitles)));
    }
    if enabled("title-encoding") {
        probes.push(Probe::Post(Box::new(TitleEncodingProbe::new())));
    }

    let mut body: Vec<Box<dyn PostHooks>> = Vec::new();
    if enabled("embeds") {
        body.push(Box::new(BodyContent::new(Embeds)));
    }
    if enabled("scripts") {
        body.push(Box::new(BodyContent::new(Scripts)));
    }
    match body.len() {
        0 => {}
        1 => probes.push(Probe::Post(body.remove(0))),
        _ => probes.push(Probe::Post(Box::new(CompositePost::new(
            "body-content",
            body,
        )))),
    }

    probes
}
