//! Blog data model and its MetaWeblog XML-RPC marshalling.
//!
//! The conversions are tolerant on the inbound side: real servers disagree
//! about which optional struct members they return, so anything missing
//! simply stays at its default.

use crate::xmlrpc::{RpcError, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post as sent to or read back from a blog API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub body: String,
    pub categories: Vec<String>,
    pub date_published: Option<DateTime<Utc>>,
}

impl BlogPost {
    /// Encode as a MetaWeblog post struct.
    pub fn to_value(&self) -> Value {
        let mut members = vec![
            ("title".to_string(), Value::string(&self.title)),
            ("description".to_string(), Value::string(&self.body)),
            (
                "categories".to_string(),
                Value::Array(self.categories.iter().map(Value::string).collect()),
            ),
        ];
        if let Some(date) = self.date_published {
            members.push((
                "dateCreated".to_string(),
                Value::DateTime(date.naive_utc()),
            ));
        }
        Value::Struct(members)
    }

    /// Decode a MetaWeblog post struct.
    pub fn from_value(value: &Value) -> Result<BlogPost, RpcError> {
        if value.as_struct().is_none() {
            return Err(RpcError::Invalid("post is not a struct".to_string()));
        }
        let text = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let categories = value
            .get("categories")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let date_published = value.get("dateCreated").and_then(|v| match v {
            Value::DateTime(dt) => Some(DateTime::from_naive_utc_and_offset(*dt, Utc)),
            _ => None,
        });
        Ok(BlogPost {
            title: text("title"),
            body: text("description"),
            categories,
            date_published,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
}

impl Category {
    pub fn to_value(&self) -> Value {
        Value::Struct(vec![
            ("categoryId".to_string(), Value::string(&self.name)),
            ("categoryName".to_string(), Value::string(&self.name)),
            ("description".to_string(), Value::string(&self.name)),
        ])
    }

    /// Dialects disagree on the member name; take the first one present.
    pub fn from_value(value: &Value) -> Option<Category> {
        for member in ["categoryName", "description", "title"] {
            if let Some(name) = value.get(member).and_then(Value::as_str) {
                if !name.is_empty() {
                    return Some(Category {
                        name: name.to_string(),
                    });
                }
            }
        }
        None
    }
}

/// One blog of a user account, as reported by `blogger.getUsersBlogs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogInfo {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl BlogInfo {
    pub fn to_value(&self) -> Value {
        Value::Struct(vec![
            ("blogid".to_string(), Value::string(&self.id)),
            ("blogName".to_string(), Value::string(&self.name)),
            ("url".to_string(), Value::string(&self.url)),
        ])
    }

    pub fn from_value(value: &Value) -> Result<BlogInfo, RpcError> {
        let id = value
            .get("blogid")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::Invalid("blog info without blogid".to_string()))?;
        Ok(BlogInfo {
            id: id.to_string(),
            name: value
                .get("blogName")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            url: value
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }
}
