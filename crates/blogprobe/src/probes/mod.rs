use crate::client::{fetch_page, BlogClient};
use crate::prelude::*;
use async_trait::async_trait;
use blogprobe_core::blog::BlogPost;
use blogprobe_core::content;
use blogprobe_core::results::ProbeResults;
use blogprobe_core::token::Token;
use std::future::Future;
use std::time::Duration;

pub mod suite;

/// What the homepage poll produced. A timeout is a value, not an error:
/// several probes read "the evidence never appeared" as their success signal.
#[derive(Debug)]
pub enum PollOutcome {
    Found(String),
    TimedOut,
}

/// Per-run knobs, threaded explicitly into every probe invocation.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Delete probe posts after each cycle. Best-effort; failures ignored.
    pub cleanup: bool,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            cleanup: true,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// The blog a probe publishes into.
#[derive(Debug, Clone)]
pub struct BlogTarget {
    pub blog_id: String,
    pub homepage_url: String,
}

/// Serially call `fetch` until it yields evidence or the deadline passes,
/// sleeping `interval` between attempts. Strictly sequential; the deadline is
/// a wall-clock check between attempts, never an abort of an in-flight
/// request.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    interval: Duration,
    mut fetch: F,
) -> Result<PollOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(html) = fetch().await? {
            return Ok(PollOutcome::Found(html));
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(PollOutcome::TimedOut);
        }
        tokio::time::sleep(interval).await;
    }
}

/// A probe that publishes a post and reads the rendered homepage back.
pub trait PostHooks: Send + Sync {
    fn name(&self) -> &'static str;

    /// Contribute content and the publish flag to the outgoing post.
    fn prepare(&self, post: &mut BlogPost, publish: &mut bool);

    /// The homepage showed the probe token; decide what the server did.
    fn interpret(&self, html: &str, results: &mut ProbeResults) -> Result<()>;

    /// The token never appeared. Return true when that silence is itself the
    /// verdict and has been recorded; false lets the timeout surface as a
    /// probe failure.
    fn on_timeout(&self, results: &mut ProbeResults) -> bool {
        let _ = results;
        false
    }
}

/// A probe that verifies API fidelity by re-fetching the post through the
/// API instead of scraping rendered output.
#[async_trait]
pub trait RoundtripHooks: Send + Sync {
    fn name(&self) -> &'static str;

    /// Build the outgoing post; may consult the API (e.g. to pick existing
    /// categories).
    async fn prepare(
        &self,
        client: &dyn BlogClient,
        target: &BlogTarget,
        post: &mut BlogPost,
    ) -> Result<()>;

    fn interpret(&self, roundtripped: &BlogPost, results: &mut ProbeResults) -> Result<()>;
}

/// A probe that drives the API directly, outside the publish/poll skeleton.
#[async_trait]
pub trait DirectHooks: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(
        &self,
        client: &dyn BlogClient,
        target: &BlogTarget,
        results: &mut ProbeResults,
        options: &RunOptions,
    ) -> Result<()>;
}

/// The closed set of probe shapes.
pub enum Probe {
    Post(Box<dyn PostHooks>),
    Roundtrip(Box<dyn RoundtripHooks>),
    Direct(Box<dyn DirectHooks>),
}

impl Probe {
    pub fn name(&self) -> &'static str {
        match self {
            Probe::Post(hooks) => hooks.name(),
            Probe::Roundtrip(hooks) => hooks.name(),
            Probe::Direct(hooks) => hooks.name(),
        }
    }
}

pub async fn run_probe(
    probe: &Probe,
    client: &dyn BlogClient,
    http: &reqwest::Client,
    target: &BlogTarget,
    results: &mut ProbeResults,
    options: &RunOptions,
) -> Result<()> {
    match probe {
        Probe::Post(hooks) => {
            run_post_probe(hooks.as_ref(), client, http, target, results, options).await
        }
        Probe::Roundtrip(hooks) => {
            run_roundtrip_probe(hooks.as_ref(), client, target, results, options).await
        }
        Probe::Direct(hooks) => hooks.run(client, target, results, options).await,
    }
}

/// The publish → poll → interpret → cleanup skeleton shared by every
/// post-shaped probe.
async fn run_post_probe(
    hooks: &dyn PostHooks,
    client: &dyn BlogClient,
    http: &reqwest::Client,
    target: &BlogTarget,
    results: &mut ProbeResults,
    options: &RunOptions,
) -> Result<()> {
    let mut post = BlogPost::default();
    let mut publish = true;
    hooks.prepare(&mut post, &mut publish);

    let token = Token::random();
    post.title = f!("{token}:{}", post.title);

    let post_id = client.new_post(&target.blog_id, &post, publish).await?;

    let outcome = poll_until(options.timeout, options.poll_interval, || {
        let http = http.clone();
        let url = target.homepage_url.clone();
        let token = token.clone();
        async move {
            let html = fetch_page(&http, &url).await?;
            Ok(html.contains(token.as_str()).then_some(html))
        }
    })
    .await;

    let verdict = match outcome {
        Ok(PollOutcome::Found(html)) => hooks.interpret(&html, results),
        Ok(PollOutcome::TimedOut) => {
            if hooks.on_timeout(results) {
                Ok(())
            } else {
                Err(Error::Timeout.into())
            }
        }
        Err(err) => Err(err),
    };

    if options.cleanup {
        let _ = client.delete_post(&target.blog_id, &post_id).await;
    }

    verdict
}

async fn run_roundtrip_probe(
    hooks: &dyn RoundtripHooks,
    client: &dyn BlogClient,
    target: &BlogTarget,
    results: &mut ProbeResults,
    options: &RunOptions,
) -> Result<()> {
    let mut post = BlogPost::default();
    hooks.prepare(client, target, &mut post).await?;

    let token = Token::random();
    post.title = f!("{token}:{}", post.title);

    let post_id = client.new_post(&target.blog_id, &post, true).await?;

    let verdict = match client.get_post(&target.blog_id, &post_id).await {
        Ok(roundtripped) => hooks.interpret(&roundtripped, results),
        Err(err) => Err(err),
    };

    if options.cleanup {
        let _ = client.delete_post(&target.blog_id, &post_id).await;
    }

    verdict
}

/// Body-fragment specialization: flank a fragment with two fresh tokens so
/// the substring between them can be cut out of the homepage regardless of
/// surrounding template HTML.
pub trait BodyHooks: Send + Sync {
    fn name(&self) -> &'static str;
    fn fragment(&self) -> String;
    fn interpret_content(&self, content: &str, results: &mut ProbeResults) -> Result<()>;
}

pub struct BodyContent<H> {
    hooks: H,
    open: Token,
    close: Token,
}

impl<H: BodyHooks> BodyContent<H> {
    pub fn new(hooks: H) -> Self {
        BodyContent {
            hooks,
            open: Token::random(),
            close: Token::random(),
        }
    }
}

impl<H: BodyHooks> PostHooks for BodyContent<H> {
    fn name(&self) -> &'static str {
        self.hooks.name()
    }

    fn prepare(&self, post: &mut BlogPost, _publish: &mut bool) {
        post.body
            .push_str(&f!("{}{}{}", self.open, self.hooks.fragment(), self.close));
    }

    fn interpret(&self, html: &str, results: &mut ProbeResults) -> Result<()> {
        match content::extract_between(html, self.open.as_str(), self.close.as_str()) {
            Some(fragment) => self.hooks.interpret_content(&fragment, results),
            // The post is up (its title token was found) but the body markers
            // are gone: infrastructure failure, not a feature-negative.
            None => Err(Error::MissingEvidence.into()),
        }
    }
}

/// Several post probes sharing a single publish/poll/cleanup cycle. Member
/// hooks run in order on one shared post and one shared homepage snapshot.
pub struct CompositePost {
    name: &'static str,
    members: Vec<Box<dyn PostHooks>>,
}

impl CompositePost {
    pub fn new(name: &'static str, members: Vec<Box<dyn PostHooks>>) -> Self {
        CompositePost { name, members }
    }
}

impl PostHooks for CompositePost {
    fn name(&self) -> &'static str {
        self.name
    }

    fn prepare(&self, post: &mut BlogPost, publish: &mut bool) {
        for member in &self.members {
            member.prepare(post, publish);
        }
    }

    fn interpret(&self, html: &str, results: &mut ProbeResults) -> Result<()> {
        // Every member gets to interpret even when an earlier one fails; the
        // first failure is still reported.
        let mut first_error = None;
        for member in &self.members {
            if let Err(err) = member.interpret(html, results) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn on_timeout(&self, results: &mut ProbeResults) -> bool {
        let mut handled = true;
        for member in &self.members {
            handled = member.on_timeout(results) && handled;
        }
        handled
    }
}
