//! Shared stylesheet assembly and inline style conversion

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Route of the stylesheet shared by every converted page
pub const GLOBAL_STYLESHEET_PATH: &str = "/styles/global.css";

/// The single stylesheet asset of a converted site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedStylesheet {
    pub path: String,
    /// Where each block came from: a stylesheet asset path or `inline:<page path>`
    pub sources: Vec<String>,
    pub content: String,
}

/// Collects CSS blocks in a fixed order, skipping repeated blocks
#[derive(Debug, Default)]
pub struct StyleCollector {
    blocks: Vec<(String, String)>,
    seen: HashSet<String>,
}

impl StyleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stored stylesheet asset
    pub fn add_linked(&mut self, asset_path: &str, css: &str) {
        self.add(asset_path.to_string(), css);
    }

    /// Adds an inline `<style>` block found on a page
    pub fn add_inline(&mut self, page_path: &str, css: &str) {
        self.add(format!("inline:{}", page_path), css);
    }

    fn add(&mut self, source: String, css: &str) {
        let css = css.trim();
        if css.is_empty() || !self.seen.insert(css.to_string()) {
            return;
        }
        self.blocks.push((source, css.to_string()));
    }

    /// Joins the blocks into the shared stylesheet; `None` if nothing was collected
    pub fn finish(self) -> Option<SharedStylesheet> {
        if self.blocks.is_empty() {
            return None;
        }

        let mut content = String::new();
        let mut sources = Vec::with_capacity(self.blocks.len());
        for (source, css) in self.blocks {
            content.push_str(&format!("/* {} */\n{}\n\n", source, css));
            sources.push(source);
        }

        Some(SharedStylesheet {
            path: GLOBAL_STYLESHEET_PATH.to_string(),
            sources,
            content,
        })
    }
}

/// Converts a `style` attribute into a JSX style object literal
///
/// ```
/// use site_ferry::converter::style_object;
///
/// assert_eq!(
///     style_object("background-color: #fff; --gap: 4px"),
///     r##"{ backgroundColor: "#fff", "--gap": "4px" }"##
/// );
/// ```
pub fn style_object(declarations: &str) -> String {
    let entries: Vec<String> = declarations
        .split(';')
        .filter_map(|decl| {
            let (property, value) = decl.split_once(':')?;
            let property = property.trim();
            let value = value.trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }

            let key = if property.starts_with("--") {
                format!("\"{}\"", property)
            } else {
                camel_case(&property.to_ascii_lowercase())
            };
            Some(format!(
                "{}: \"{}\"",
                key,
                value.replace('\\', "\\\\").replace('"', "\\\"")
            ))
        })
        .collect();

    if entries.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", entries.join(", "))
    }
}

fn camel_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len());
    let mut upper = false;
    for c in property.chars() {
        if c == '-' {
            upper = !out.is_empty();
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
