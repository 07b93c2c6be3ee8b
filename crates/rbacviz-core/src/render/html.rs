//! Self-contained HTML page around the DOT text
//!
//! The page lays the graph out client-side with d3-graphviz. The DOT text is
//! embedded twice: once as a JavaScript string literal for the renderer and
//! once HTML-escaped in a collapsible source view.

use minijinja::{context, Environment};

use crate::pipeline::Summary;
use crate::Result;

/// Page template loaded at compile time
const PAGE_TEMPLATE: &str = include_str!("../../templates/rbac.html");

/// The `.html` suffix turns on minijinja's HTML auto-escaping
const TEMPLATE_NAME: &str = "rbac.html";

const TITLE: &str = "Kubernetes RBAC";

/// Wrap `dot` in an HTML page
pub fn render(dot: &str, summary: &Summary) -> Result<String> {
    let mut env = Environment::new();
    env.add_template(TEMPLATE_NAME, PAGE_TEMPLATE)?;
    let page = env.get_template(TEMPLATE_NAME)?.render(context! {
        title => TITLE,
        summary => summary,
        dot => dot,
        dot_json => script_literal(dot)?,
    })?;
    Ok(page)
}

/// JSON string literal that is safe inside a `<script>` element
///
/// Every `<` is written as `\u003c`, so the text can never close the script
/// element or open an HTML comment.
fn script_literal(s: &str) -> Result<String> {
    let json = serde_json::to_string(s)
        .map_err(|e| crate::Error::render(format!("failed to encode DOT: {}", e)))?;
    Ok(json.replace('<', "\\u003c"))
}
