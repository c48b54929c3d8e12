use crate::prelude::*;
use async_trait::async_trait;
use blogprobe_core::blog::{BlogInfo, BlogPost, Category};
use blogprobe_core::xmlrpc::{MethodCall, MethodResponse, Value};

/// The blog API surface a probe drives. Implemented over XML-RPC for real
/// blogs and the stub server; test doubles implement it in memory.
#[async_trait]
pub trait BlogClient: Send + Sync {
    /// Publish a post and return the new post id.
    async fn new_post(&self, blog_id: &str, post: &BlogPost, publish: bool) -> Result<String>;
    async fn get_post(&self, blog_id: &str, post_id: &str) -> Result<BlogPost>;
    async fn delete_post(&self, blog_id: &str, post_id: &str) -> Result<()>;
    async fn get_categories(&self, blog_id: &str) -> Result<Vec<Category>>;
    async fn get_users_blogs(&self) -> Result<Vec<BlogInfo>>;
}

/// MetaWeblog/Blogger dialect client speaking XML-RPC over HTTP POST.
pub struct XmlRpcClient {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
}

impl XmlRpcClient {
    pub fn new(endpoint: &str, username: &str, password: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;
        Ok(XmlRpcClient {
            http,
            endpoint: endpoint.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let body = MethodCall::new(method, params).to_xml();
        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(|e| eyre!("Failed to call {}: {}", method, e))?;

        if !response.status().is_success() {
            return Err(eyre!("{} failed: HTTP {}", method, response.status()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| eyre!("Failed to read {} response: {}", method, e))?;
        match MethodResponse::parse(&text)
            .map_err(|e| eyre!("Malformed {} response: {}", method, e))?
        {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault(fault) => Err(Error::Fault {
                code: fault.code,
                message: fault.message,
            }
            .into()),
        }
    }

    fn credentials(&self) -> (Value, Value) {
        (
            Value::string(&self.username),
            Value::string(&self.password),
        )
    }
}

#[async_trait]
impl BlogClient for XmlRpcClient {
    async fn new_post(&self, blog_id: &str, post: &BlogPost, publish: bool) -> Result<String> {
        let (user, pass) = self.credentials();
        let value = self
            .call(
                "metaWeblog.newPost",
                vec![
                    Value::string(blog_id),
                    user,
                    pass,
                    post.to_value(),
                    Value::Bool(publish),
                ],
            )
            .await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| eyre!("metaWeblog.newPost did not return a post id string"))
    }

    async fn get_post(&self, _blog_id: &str, post_id: &str) -> Result<BlogPost> {
        let (user, pass) = self.credentials();
        let value = self
            .call(
                "metaWeblog.getPost",
                vec![Value::string(post_id), user, pass],
            )
            .await?;
        BlogPost::from_value(&value).map_err(|e| eyre!("Malformed post struct: {}", e))
    }

    async fn delete_post(&self, _blog_id: &str, post_id: &str) -> Result<()> {
        let (user, pass) = self.credentials();
        self.call(
            "blogger.deletePost",
            vec![
                // First parameter is the legacy app key, ignored by servers.
                Value::string(""),
                Value::string(post_id),
                user,
                pass,
                Value::Bool(true),
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_categories(&self, blog_id: &str) -> Result<Vec<Category>> {
        let (user, pass) = self.credentials();
        let value = self
            .call(
                "metaWeblog.getCategories",
                vec![Value::string(blog_id), user, pass],
            )
            .await?;
        let items = value
            .as_array()
            .ok_or_else(|| eyre!("metaWeblog.getCategories did not return an array"))?;
        Ok(items.iter().filter_map(Category::from_value).collect())
    }

    async fn get_users_blogs(&self) -> Result<Vec<BlogInfo>> {
        let (user, pass) = self.credentials();
        let value = self
            .call(
                "blogger.getUsersBlogs",
                vec![Value::string(""), user, pass],
            )
            .await?;
        let items = value
            .as_array()
            .ok_or_else(|| eyre!("blogger.getUsersBlogs did not return an array"))?;
        items
            .iter()
            .map(|item| BlogInfo::from_value(item).map_err(|e| eyre!("Malformed blog info: {}", e)))
            .collect()
    }
}

/// Plain GET of a rendered page, decoded as text.
pub async fn fetch_page(http: &reqwest::Client, url: &str) -> Result<String> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;
    if !response.status().is_success() {
        return Err(eyre!("Failed to fetch {}: HTTP {}", url, response.status()));
    }
    response
        .text()
        .await
        .map_err(|e| eyre!("Failed to read {}: {}", url, e))
}
