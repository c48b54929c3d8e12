//! The run configuration document: provider id → blog account credentials.
//!
//! Credentials live apart from the shareable provider catalog so the catalog
//! can be committed while the config stays local to the operator.

use crate::xml::{Element, XmlError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Xml(#[from] XmlError),
    #[error("document root must be <config>, found <{0}>")]
    WrongRoot(String),
    #[error("blog entry for provider {provider} is missing <{field}>")]
    MissingField {
        provider: String,
        field: &'static str,
    },
}

/// Credentials and endpoints for one blog account under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogCredentials {
    pub provider_id: String,
    pub homepage_url: String,
    pub api_url: String,
    pub username: String,
    pub password: String,
    /// Resolved via `blogger.getUsersBlogs` when absent.
    pub blog_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    pub blogs: Vec<BlogCredentials>,
}

impl RunConfig {
    pub fn parse(xml: &str) -> Result<RunConfig, ConfigError> {
        let root = Element::parse(xml)?;
        if root.name != "config" {
            return Err(ConfigError::WrongRoot(root.name));
        }
        let mut blogs = Vec::new();
        for blog in root.children_named("blog") {
            let provider_id = required(blog, "<unknown>", "providerId")?;
            let required_field =
                |field: &'static str| required(blog, &provider_id, field);
            blogs.push(BlogCredentials {
                homepage_url: required_field("homepageUrl")?,
                api_url: required_field("apiUrl")?,
                username: required_field("username")?,
                password: required_field("password")?,
                blog_id: blog.child_text("blogId").filter(|id| !id.is_empty()),
                provider_id,
            });
        }
        Ok(RunConfig { blogs })
    }

    pub fn blog_for(&self, provider_id: &str) -> Option<&BlogCredentials> {
        self.blogs.iter().find(|b| b.provider_id == provider_id)
    }
}

fn required(blog: &Element, provider: &str, field: &'static str) -> Result<String, ConfigError> {
    blog.child_text(field)
        .filter(|text| !text.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            provider: provider.to_string(),
            field,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"<config>
        <blog>
          <providerId>wordpress</providerId>
          <homepageUrl>http://127.0.0.1:8087/</homepageUrl>
          <apiUrl>http://127.0.0.1:8087/xmlrpc</apiUrl>
          <username>probe</username>
          <password>secret</password>
          <blogId>1</blogId>
        </blog>
        <blog>
          <providerId>lazy</providerId>
          <homepageUrl>http://blog.example.com/</homepageUrl>
          <apiUrl>http://blog.example.com/xmlrpc.php</apiUrl>
          <username>u</username>
          <password>p</password>
        </blog>
      </config>"#;

    #[test]
    fn test_parse_config() {
        let config = RunConfig::parse(CONFIG).unwrap();
        assert_eq!(config.blogs.len(), 2);
        let wp = config.blog_for("wordpress").unwrap();
        assert_eq!(wp.blog_id.as_deref(), Some("1"));
        assert_eq!(wp.username, "probe");
        // Absent blog id stays unresolved until the run looks it up.
        assert_eq!(config.blog_for("lazy").unwrap().blog_id, None);
        assert_eq!(config.blog_for("unknown"), None);
    }

    #[test]
    fn test_missing_field_is_an_error() {
        let source = r#"<config><blog>
            <providerId>p</providerId>
            <homepageUrl>http://x/</homepageUrl>
            <username>u</username>
            <password>p</password>
          </blog></config>"#;
        match RunConfig::parse(source) {
            Err(ConfigError::MissingField { provider, field }) => {
                assert_eq!(provider, "p");
                assert_eq!(field, "apiUrl");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_root_is_an_error() {
        assert!(matches!(
            RunConfig::parse("<settings/>"),
            Err(ConfigError::WrongRoot(_))
        ));
    }
}
