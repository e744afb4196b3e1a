//! Ordered rendering strategies. Each attempt yields a typed result; the
//! first success wins and the last strategy cannot fail.

use minijinja::HtmlEscape;
use serde_json::Value;

use super::{html_environment, RenderError};
use crate::domain::DocumentKind;
use crate::ports::Renderer;

/// Attribute present on every body produced by a fallback strategy.
pub const FALLBACK_MARKER: &str = "data-render-fallback";

const DEFAULT_INVOICE_TEMPLATE: &str = r#"<div class="document" data-render-fallback="default">
  <header>
    <h1>INVOICE - {{ agency.name }}</h1>
    <p>Reference: {{ document.reference }}</p>
    <p>Date: {{ document.issued_on }}</p>
    <p>Due: {{ document.due_on }}</p>
  </header>
  <section>
    <h2>Client</h2>
    <p>{{ client.name }}</p>
    {% if client.email %}<p>{{ client.email }}</p>{% endif %}
  </section>
  <section>
    <h2>Amounts</h2>
    <p>Total excl. tax: {{ totals.excluding_tax }} {{ document.currency }}</p>
    <p>Tax: {{ totals.tax }} {{ document.currency }}</p>
    <p><strong>Total incl. tax: {{ totals.including_tax }} {{ document.currency }}</strong></p>
  </section>
  <section>
    <h2>Terms</h2>
    <p>Payment: {{ payment.terms }}</p>
    <p>Method: {{ payment.method }}</p>
  </section>
  <footer>
    {% if source %}<p>Invoice generated from quote: {{ source.reference }}</p>{% endif %}
    <p class="render-error">Rendering fallback: {{ error }}</p>
  </footer>
</div>"#;

const DEFAULT_GENERIC_TEMPLATE: &str = r#"<div class="document" data-render-fallback="default">
  <header>
    <h1>{{ document.title }} - {{ agency.name }}</h1>
    <p>Reference: {{ document.reference }}</p>
  </header>
  <section>
    <h2>Client</h2>
    <p>{{ client.name }}</p>
  </section>
  <footer>
    <p class="render-error">Rendering fallback: {{ error }}</p>
  </footer>
</div>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Tenant template looked up through the renderer.
    Stored,
    /// Built-in template for the document kind.
    Default,
    /// Minimal body assembled without a template engine.
    Inline,
}

impl RenderStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStrategy::Stored => "stored",
            RenderStrategy::Default => "default",
            RenderStrategy::Inline => "inline",
        }
    }
}

/// Strategies that may fail. `Inline` always closes the chain.
const CHAIN: [RenderStrategy; 2] = [RenderStrategy::Stored, RenderStrategy::Default];

pub struct RenderRequest<'a> {
    pub template_key: String,
    pub kind: &'a DocumentKind,
    pub data: &'a Value,
    /// Set when the stored strategy cannot run, e.g. no agency profile.
    pub precondition: Option<RenderError>,
}

#[derive(Debug, Clone)]
pub struct RenderedBody {
    pub body: String,
    pub strategy: RenderStrategy,
    /// Messages of the strategies that failed before this one, in order.
    pub errors: Vec<String>,
}

impl RenderedBody {
    pub fn is_fallback(&self) -> bool {
        self.strategy != RenderStrategy::Stored
    }
}

/// Walks the strategy chain until one produces a body.
pub async fn render_with_fallback(
    renderer: &dyn Renderer,
    request: RenderRequest<'_>,
) -> RenderedBody {
    let mut errors: Vec<String> = Vec::new();
    let mut precondition = request.precondition;

    for strategy in CHAIN {
        let attempt = match strategy {
            RenderStrategy::Stored => match precondition.take() {
                Some(err) => Err(err),
                None => renderer.render(&request.template_key, request.data).await,
            },
            RenderStrategy::Default | RenderStrategy::Inline => {
                render_default(request.kind, request.data, first_error(&errors))
            }
        };

        match attempt {
            Ok(body) => {
                if strategy != RenderStrategy::Stored {
                    tracing::warn!(
                        template_key = %request.template_key,
                        strategy = strategy.as_str(),
                        "Rendered document with fallback strategy"
                    );
                }
                return RenderedBody { body, strategy, errors };
            }
            Err(err) => {
                tracing::warn!(
                    template_key = %request.template_key,
                    strategy = strategy.as_str(),
                    error = %err,
                    "Rendering strategy failed"
                );
                errors.push(err.to_string());
            }
        }
    }

    tracing::warn!(
        template_key = %request.template_key,
        strategy = RenderStrategy::Inline.as_str(),
        "Rendered document with fallback strategy"
    );
    RenderedBody {
        body: render_inline(request.data, first_error(&errors)),
        strategy: RenderStrategy::Inline,
        errors,
    }
}

fn first_error(errors: &[String]) -> &str {
    errors.first().map(String::as_str).unwrap_or("unknown error")
}

fn render_default(kind: &DocumentKind, data: &Value, error: &str) -> Result<String, RenderError> {
    let template = match kind {
        DocumentKind::Invoice => DEFAULT_INVOICE_TEMPLATE,
        _ => DEFAULT_GENERIC_TEMPLATE,
    };

    let mut bag = match data {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    bag.insert("error".into(), Value::String(error.to_string()));

    Ok(html_environment().render_str(template, Value::Object(bag))?)
}

fn render_inline(data: &Value, error: &str) -> String {
    let field = |pointer: &str| data.pointer(pointer).and_then(Value::as_str).unwrap_or("N/A");

    format!(
        concat!(
            r#"<div class="document" {marker}="inline">"#,
            "<h1>{title}</h1><p>Reference: {reference}</p><p>Client: {client}</p>",
            r#"<p class="render-error">Rendering fallback: {error}</p></div>"#,
        ),
        marker = FALLBACK_MARKER,
        title = HtmlEscape(field("/document/title")),
        reference = HtmlEscape(field("/document/reference")),
        client = HtmlEscape(field("/client/name")),
        error = HtmlEscape(error),
    )
}
