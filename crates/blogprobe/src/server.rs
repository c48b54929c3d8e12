//! A minimal MetaWeblog/Blogger XML-RPC server used as a local stand-in blog
//! for exercising the harness. Handler failures become `<fault>` envelopes
//! with HTTP 200, never HTTP errors, so clients always get a well-formed
//! XML-RPC response.

use crate::prelude::{eprintln, *};
use axum::{
    extract::State,
    http::header,
    response::Html,
    routing::{get, post},
    Router,
};
use blogprobe_core::blog::{BlogInfo, BlogPost, Category};
use blogprobe_core::xmlrpc::{Fault, MethodCall, MethodResponse, Value};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tower_http::cors::{Any, CorsLayer};

#[derive(Debug, clap::Args)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind
    #[arg(long, default_value = "8087")]
    pub port: u16,

    /// Persist the post store to this file
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Expected account username
    #[arg(long, default_value = "probe")]
    pub username: String,

    /// Expected account password
    #[arg(long, default_value = "probe")]
    pub password: String,

    /// Blog display name
    #[arg(long, default_value = "Probe Blog")]
    pub blog_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPost {
    id: String,
    post: BlogPost,
    published: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Store {
    next_id: u64,
    posts: Vec<StoredPost>,
}

pub struct ServerState {
    // Many concurrent readers, one writer. Mutations persist to disk while
    // still holding the write lock, so readers never observe a state that
    // has not reached the store file.
    store: RwLock<Store>,
    store_path: Option<PathBuf>,
    username: String,
    password: String,
    blog_name: String,
    public_url: String,
}

impl ServerState {
    fn new(
        username: &str,
        password: &str,
        blog_name: &str,
        public_url: &str,
        store_path: Option<PathBuf>,
    ) -> Result<Self> {
        let store = match &store_path {
            Some(path) if path.exists() => {
                let json = std::fs::read_to_string(path)
                    .map_err(|e| eyre!("Failed to read store {}: {}", path.display(), e))?;
                serde_json::from_str(&json)
                    .map_err(|e| eyre!("Malformed store {}: {}", path.display(), e))?
            }
            _ => Store::default(),
        };
        Ok(ServerState {
            store: RwLock::new(store),
            store_path,
            username: username.to_string(),
            password: password.to_string(),
            blog_name: blog_name.to_string(),
            public_url: public_url.to_string(),
        })
    }

    fn persist(&self, store: &Store) {
        let Some(path) = &self.store_path else {
            return;
        };
        let json = match serde_json::to_string_pretty(store) {
            Ok(json) => json,
            Err(err) => {
                eprintln!("failed to serialize store: {err}");
                return;
            }
        };
        if let Err(err) = std::fs::write(path, json) {
            eprintln!("failed to persist store to {}: {err}", path.display());
        }
    }

    fn categories(&self) -> Vec<Category> {
        ["General", "Rust", "Protocols"]
            .into_iter()
            .map(|name| Category {
                name: name.to_string(),
            })
            .collect()
    }
}

pub async fn run(args: ServeArgs, global: crate::Global) -> Result<()> {
    let addr = f!("{}:{}", args.host, args.port);
    let public_url = f!("http://{addr}/");
    let state = Arc::new(ServerState::new(
        &args.username,
        &args.password,
        &args.blog_name,
        &public_url,
        args.store,
    )?);

    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| eyre!("Failed to bind to {}: {}", addr, e))?;

    if global.verbose {
        eprintln!("stub blog listening on http://{addr}");
        eprintln!("XML-RPC endpoint: http://{addr}/xmlrpc");
    }

    axum::serve(listener, router)
        .await
        .map_err(|e| eyre!("Server error: {e}"))?;

    Ok(())
}

fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(homepage))
        .route("/xmlrpc", post(xmlrpc))
        .layer(cors)
        .with_state(state)
}

async fn homepage(State(state): State<Arc<ServerState>>) -> Html<String> {
    let store = state.store.read().unwrap_or_else(PoisonError::into_inner);
    Html(render_homepage(&state.blog_name, &store.posts))
}

/// Render the public page the harness scrapes. Drafts and future-dated posts
/// never appear; titles are escaped once, bodies are emitted raw.
fn render_homepage(blog_name: &str, posts: &[StoredPost]) -> String {
    let now = Utc::now();
    let title = html_escape::encode_text(blog_name);
    let mut html = f!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head><body>\n<h1>{title}</h1>\n"
    );
    for stored in posts {
        if !stored.published {
            continue;
        }
        if stored.post.date_published.is_some_and(|date| date > now) {
            continue;
        }
        html.push_str(&f!(
            "<div class=\"post\">\n<h2>{}</h2>\n<div>{}</div>\n</div>\n",
            html_escape::encode_text(&stored.post.title),
            stored.post.body
        ));
    }
    html.push_str("</body></html>\n");
    html
}

async fn xmlrpc(
    State(state): State<Arc<ServerState>>,
    body: String,
) -> ([(header::HeaderName, &'static str); 1], String) {
    let response = match MethodCall::parse(&body) {
        Ok(call) => dispatch(&state, &call),
        Err(err) => MethodResponse::Fault(Fault::new(400, f!("malformed method call: {err}"))),
    };
    ([(header::CONTENT_TYPE, "text/xml")], response.to_xml())
}

/// Explicit wire-name dispatch table. Anything not listed answers with the
/// standard unknown-method fault.
fn dispatch(state: &ServerState, call: &MethodCall) -> MethodResponse {
    let result = match call.name.as_str() {
        "blogger.getUsersBlogs" => get_users_blogs(state, &call.params),
        "metaWeblog.newPost" => new_post(state, &call.params),
        "metaWeblog.getPost" => get_post(state, &call.params),
        "metaWeblog.getCategories" => get_categories(state, &call.params),
        "blogger.deletePost" => delete_post(state, &call.params),
        method => Err(Fault::new(405, f!("unknown method: {method}"))),
    };
    match result {
        Ok(value) => MethodResponse::Success(value),
        Err(fault) => MethodResponse::Fault(fault),
    }
}

/// Username/password sit at a method-specific offset in the parameter list.
fn check_credentials(
    state: &ServerState,
    params: &[Value],
    user_index: usize,
) -> Result<(), Fault> {
    let username = params
        .get(user_index)
        .and_then(Value::as_str)
        .unwrap_or_default();
    let password = params
        .get(user_index + 1)
        .and_then(Value::as_str)
        .unwrap_or_default();
    if username == state.username && password == state.password {
        Ok(())
    } else {
        Err(Fault::new(403, "bad credentials"))
    }
}

fn get_users_blogs(state: &ServerState, params: &[Value]) -> Result<Value, Fault> {
    check_credentials(state, params, 1)?;
    let info = BlogInfo {
        id: "1".to_string(),
        name: state.blog_name.clone(),
        url: state.public_url.clone(),
    };
    Ok(Value::Array(vec![info.to_value()]))
}

fn new_post(state: &ServerState, params: &[Value]) -> Result<Value, Fault> {
    check_credentials(state, params, 1)?;
    let post = params
        .get(3)
        .ok_or_else(|| Fault::new(400, "missing post struct"))
        .and_then(|value| {
            BlogPost::from_value(value).map_err(|e| Fault::new(400, f!("bad post struct: {e}")))
        })?;
    let published = params.get(4).and_then(Value::as_bool).unwrap_or(true);

    let mut store = state.store.write().unwrap_or_else(PoisonError::into_inner);
    store.next_id += 1;
    let id = store.next_id.to_string();
    store.posts.push(StoredPost {
        id: id.clone(),
        post,
        published,
    });
    state.persist(&store);
    Ok(Value::string(id))
}

fn get_post(state: &ServerState, params: &[Value]) -> Result<Value, Fault> {
    check_credentials(state, params, 1)?;
    let post_id = params
        .get(0)
        .and_then(Value::as_str)
        .ok_or_else(|| Fault::new(400, "missing post id"))?;

    let store = state.store.read().unwrap_or_else(PoisonError::into_inner);
    let stored = store
        .posts
        .iter()
        .find(|stored| stored.id == post_id)
        .ok_or_else(|| Fault::new(404, f!("no such post: {post_id}")))?;

    let mut value = stored.post.to_value();
    if let Value::Struct(members) = &mut value {
        members.push(("postid".to_string(), Value::string(&stored.id)));
    }
    Ok(value)
}

fn get_categories(state: &ServerState, params: &[Value]) -> Result<Value, Fault> {
    check_credentials(state, params, 1)?;
    Ok(Value::Array(
        state
            .categories()
            .iter()
            .map(Category::to_value)
            .collect(),
    ))
}

fn delete_post(state: &ServerState, params: &[Value]) -> Result<Value, Fault> {
    check_credentials(state, params, 2)?;
    let post_id = params
        .get(1)
        .and_then(Value::as_str)
        .ok_or_else(|| Fault::new(400, "missing post id"))?;

    let mut store = state.store.write().unwrap_or_else(PoisonError::into_inner);
    let index = store
        .posts
        .iter()
        .position(|stored| stored.id == post_id)
        .ok_or_else(|| Fault::new(404, f!("no such post: {post_id}")))?;
    store.posts.remove(index);
    state.persist(&store);
    Ok(Value::Bool(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{fetch_page, BlogClient, XmlRpcClient};
    use crate::probes::suite::{self, PostAsDraft};
    use crate::probes::{run_probe, BlogTarget, BodyContent, Probe, RunOptions};
    use blogprobe_core::results::{ProbeResults, YES};
    use std::time::Duration;

    fn state() -> ServerState {
        ServerState::new("probe", "secret", "Probe Blog", "http://127.0.0.1:8087/", None)
            .unwrap()
    }

    fn call(name: &str, params: Vec<Value>) -> MethodCall {
        MethodCall::new(name, params)
    }

    fn creds() -> (Value, Value) {
        (Value::string("probe"), Value::string("secret"))
    }

    #[test]
    fn test_unknown_method_answers_fault_405() {
        let response = dispatch(&state(), &call("mt.bogus", vec![]));
        match response {
            MethodResponse::Fault(fault) => {
                assert_eq!(fault.code, 405);
                assert!(fault.message.contains("mt.bogus"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_bad_credentials_answer_fault_403() {
        let (user, _) = creds();
        let response = dispatch(
            &state(),
            &call(
                "blogger.getUsersBlogs",
                vec![Value::string(""), user, Value::string("wrong")],
            ),
        );
        assert!(matches!(
            response,
            MethodResponse::Fault(Fault { code: 403, .. })
        ));
    }

    #[test]
    fn test_new_post_then_get_post_round_trips() {
        let state = state();
        let (user, pass) = creds();
        let post = BlogPost {
            title: "hello".to_string(),
            body: "<p>body</p>".to_string(),
            categories: vec!["General".to_string()],
            date_published: None,
        };
        let response = dispatch(
            &state,
            &call(
                "metaWeblog.newPost",
                vec![
                    Value::string("1"),
                    user.clone(),
                    pass.clone(),
                    post.to_value(),
                    Value::Bool(true),
                ],
            ),
        );
        let id = match response {
            MethodResponse::Success(value) => value.as_str().unwrap().to_string(),
            other => panic!("unexpected: {other:?}"),
        };

        let response = dispatch(
            &state,
            &call("metaWeblog.getPost", vec![Value::string(&id), user, pass]),
        );
        match response {
            MethodResponse::Success(value) => {
                assert_eq!(BlogPost::from_value(&value).unwrap(), post);
                assert_eq!(value.get("postid").and_then(Value::as_str), Some(id.as_str()));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_homepage_hides_drafts_and_future_posts() {
        let published = StoredPost {
            id: "1".to_string(),
            post: BlogPost {
                title: "visible <now>".to_string(),
                body: "<em>raw body</em>".to_string(),
                ..Default::default()
            },
            published: true,
        };
        let draft = StoredPost {
            id: "2".to_string(),
            post: BlogPost {
                title: "draft".to_string(),
                ..Default::default()
            },
            published: false,
        };
        let scheduled = StoredPost {
            id: "3".to_string(),
            post: BlogPost {
                title: "scheduled".to_string(),
                date_published: Some(Utc::now() + chrono::Duration::days(12)),
                ..Default::default()
            },
            published: true,
        };
        let html = render_homepage("Probe Blog", &[published, draft, scheduled]);
        // Title escaped once, body raw.
        assert!(html.contains("visible &lt;now&gt;"), "{html}");
        assert!(html.contains("<em>raw body</em>"), "{html}");
        assert!(!html.contains("draft"), "{html}");
        assert!(!html.contains("scheduled"), "{html}");
    }

    #[test]
    fn test_store_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let (user, pass) = creds();

        let state =
            ServerState::new("probe", "secret", "Probe Blog", "http://x/", Some(path.clone()))
                .unwrap();
        dispatch(
            &state,
            &call(
                "metaWeblog.newPost",
                vec![
                    Value::string("1"),
                    user.clone(),
                    pass.clone(),
                    BlogPost {
                        title: "persisted".to_string(),
                        ..Default::default()
                    }
                    .to_value(),
                    Value::Bool(true),
                ],
            ),
        );
        drop(state);

        let reloaded =
            ServerState::new("probe", "secret", "Probe Blog", "http://x/", Some(path)).unwrap();
        let response = dispatch(
            &reloaded,
            &call("metaWeblog.getPost", vec![Value::string("1"), user, pass]),
        );
        match response {
            MethodResponse::Success(value) => {
                assert_eq!(value.get("title").and_then(Value::as_str), Some("persisted"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    async fn spawn_stub() -> std::net::SocketAddr {
        let state = Arc::new(state());
        let router = build_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_client_speaks_to_the_stub_over_http() {
        let addr = spawn_stub().await;
        let client = XmlRpcClient::new(&f!("http://{addr}/xmlrpc"), "probe", "secret").unwrap();

        let blogs = client.get_users_blogs().await.unwrap();
        assert_eq!(blogs.len(), 1);
        assert_eq!(blogs[0].id, "1");

        let categories = client.get_categories("1").await.unwrap();
        assert!(categories.len() >= 2);

        let post = BlogPost {
            title: "wire test".to_string(),
            body: "over http".to_string(),
            ..Default::default()
        };
        let id = client.new_post("1", &post, true).await.unwrap();
        assert_eq!(client.get_post("1", &id).await.unwrap().title, "wire test");

        client.delete_post("1", &id).await.unwrap();
        assert!(client.get_post("1", &id).await.is_err());

        let impostor =
            XmlRpcClient::new(&f!("http://{addr}/xmlrpc"), "probe", "wrong").unwrap();
        let err = impostor.get_users_blogs().await.unwrap_err();
        assert!(err.to_string().contains("403"), "{err}");
    }

    #[tokio::test]
    async fn test_embeds_probe_end_to_end_against_the_stub() {
        let addr = spawn_stub().await;
        let client = XmlRpcClient::new(&f!("http://{addr}/xmlrpc"), "probe", "secret").unwrap();
        let http = reqwest::Client::new();
        let target = BlogTarget {
            blog_id: "1".to_string(),
            homepage_url: f!("http://{addr}/"),
        };
        let options = RunOptions {
            cleanup: true,
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        };

        let probe = Probe::Post(Box::new(BodyContent::new(suite::Embeds)));
        let mut results = ProbeResults::new();
        run_probe(&probe, &client, &http, &target, &mut results, &options)
            .await
            .unwrap();

        // The stub emits bodies raw, so the embed survives.
        assert_eq!(results.get("supportsEmbeds"), Some(YES));

        // And the probe post was cleaned up afterwards.
        let html = fetch_page(&http, &target.homepage_url).await.unwrap();
        assert!(!html.contains("movie.swf"), "{html}");
    }

    #[tokio::test]
    async fn test_draft_probe_reads_stub_silence_as_support() {
        let addr = spawn_stub().await;
        let client = XmlRpcClient::new(&f!("http://{addr}/xmlrpc"), "probe", "secret").unwrap();
        let http = reqwest::Client::new();
        let target = BlogTarget {
            blog_id: "1".to_string(),
            homepage_url: f!("http://{addr}/"),
        };
        // The stub hides drafts, so the poll runs into its (short) timeout
        // and the probe records that silence as draft support.
        let options = RunOptions {
            cleanup: true,
            timeout: Duration::from_millis(400),
            poll_interval: Duration::from_millis(50),
        };

        let probe = Probe::Post(Box::new(PostAsDraft));
        let mut results = ProbeResults::new();
        run_probe(&probe, &client, &http, &target, &mut results, &options)
            .await
            .unwrap();
        assert_eq!(results.get("supportsPostAsDraft"), Some(YES));
    }
}
