//! Document body rendering.
//!
//! Templates use minijinja syntax: `{{ client.name }}` for plain and nested
//! variables, `{% if ... %}` for conditional blocks and `{% for ... %}` for
//! loops. Output is HTML-escaped.

pub mod context;
pub mod fallback;

use async_trait::async_trait;
use minijinja::{AutoEscape, Environment};
use std::sync::Arc;
use thiserror::Error;

use crate::ports::{Renderer, StoredTemplate, TemplateSource};

pub use context::RenderContext;
pub use fallback::{
    render_with_fallback, RenderRequest, RenderStrategy, RenderedBody, FALLBACK_MARKER,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template is empty: {0}")]
    EmptyTemplate(String),

    #[error("Agency profile not found for tenant {0}")]
    MissingAgencyProfile(uuid::Uuid),

    #[error("Template source error: {0}")]
    Source(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// HTML environment shared by stored and built-in templates.
pub(crate) fn html_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::Html);
    env
}

/// Inlines stylesheet text right after `<head>`, or in front of the markup
/// when there is no head element.
pub fn inject_css(html: &str, css: &str) -> String {
    let block = format!("<style>\n{}\n</style>", css);
    if html.contains("<head>") {
        html.replacen("<head>", &format!("<head>\n{}", block), 1)
    } else {
        format!("{}\n{}", block, html)
    }
}

impl StoredTemplate {
    /// Full template source with any stylesheet inlined.
    pub fn into_source(self) -> String {
        match self.css.as_deref().filter(|css| !css.trim().is_empty()) {
            Some(css) => inject_css(&self.html, css),
            None => self.html,
        }
    }
}

/// Renders stored templates looked up by key.
pub struct TemplateRenderer {
    templates: Arc<dyn TemplateSource>,
    env: Environment<'static>,
}

impl TemplateRenderer {
    pub fn new(templates: Arc<dyn TemplateSource>) -> Self {
        Self {
            templates,
            env: html_environment(),
        }
    }
}

#[async_trait]
impl Renderer for TemplateRenderer {
    async fn render(
        &self,
        template_key: &str,
        data: &serde_json::Value,
    ) -> Result<String, RenderError> {
        let template = self
            .templates
            .template(template_key)
            .await
            .map_err(|e| RenderError::Source(e.to_string()))?
            .ok_or_else(|| RenderError::TemplateNotFound(template_key.to_string()))?;

        if template.html.trim().is_empty() {
            return Err(RenderError::EmptyTemplate(template_key.to_string()));
        }

        let source = template.into_source();
        let html = self.env.render_str(&source, data)?;

        if html.contains("{{") {
            tracing::warn!(template_key, "Rendered body still contains unfilled placeholders");
        }

        Ok(html)
    }
}
