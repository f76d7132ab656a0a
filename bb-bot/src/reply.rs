//! Chat replies
//!
//! A reply is either plain text or an embed (title, link, fields). Rendering
//! is left to the chat gateway.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub title: Option<String>,
    pub url: Option<String>,
    /// Embed color as `#rrggbb`
    pub color: Option<String>,
    pub body: Option<String>,
    pub fields: Vec<Field>,
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    pub fn embed(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Append an inline field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value: value.into(),
            inline: true,
        });
        self
    }

    pub fn is_embed(&self) -> bool {
        self.title.is_some()
    }
}

/// Plain-text rendering for console output
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        if let Some(title) = &self.title {
            match &self.url {
                Some(url) => lines.push(format!("{} <{}>", title, url)),
                None => lines.push(title.clone()),
            }
        }
        if let Some(body) = &self.body {
            lines.push(body.clone());
        }
        for field in &self.fields {
            lines.push(format!("  {}: {}", field.name, field.value));
        }
        f.write_str(&lines.join("\n"))
    }
}
