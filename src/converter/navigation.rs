//! Shared navigation extraction
//!
//! Navigation entries come from links inside `<nav>` elements, falling back
//! to `<header>` links on pages without a `<nav>`. Only links into the
//! crawled origin become entries.

use crate::converter::tree::DocumentTree;
use crate::crawler::resolve_link;
use crate::url::{page_path, same_origin};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use url::Url;

/// One navigation link, unique by (label, target path)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavEntry {
    pub label: String,
    pub target_path: String,
}

/// Navigation links of one page, in document order
pub fn extract_navigation(tree: &DocumentTree, page_url: &Url, seed: &Url) -> Vec<NavEntry> {
    let root = tree.root();
    let mut containers = tree.find_all(root, "nav");
    if containers.is_empty() {
        containers = tree.find_all(root, "header");
    }

    let mut entries = Vec::new();
    for container in containers {
        for anchor in tree.find_all(container, "a") {
            let Some(href) = tree.attr(anchor, "href") else {
                continue;
            };
            let Some(target) = resolve_link(href, page_url) else {
                continue;
            };
            if !same_origin(&target, seed) {
                continue;
            }

            let label = tree.text(anchor);
            if label.is_empty() {
                continue;
            }
            entries.push(NavEntry {
                label,
                target_path: page_path(&target),
            });
        }
    }
    entries
}

/// JSX for the shared Navigation component
pub fn render_navigation(entries: &BTreeSet<NavEntry>) -> String {
    let mut out = String::from("<nav><ul>");
    for entry in entries {
        out.push_str(&format!(
            "<li><Link to=\"{}\">{{t(\"{}\")}}</Link></li>",
            entry.target_path.replace('"', "&quot;"),
            message_key(&entry.label)
        ));
    }
    out.push_str("</ul></nav>");
    out
}

/// i18n key of a navigation label
pub fn message_key(label: &str) -> String {
    format!("nav.{}", slug(label))
}

/// Lower-case ASCII slug: alphanumeric runs joined by `-`
pub fn slug(text: &str) -> String {
    let slug = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_nav_links() {
        let tree = DocumentTree::parse(
            r#"<body><header><a href="/x">Header link</a></header>
            <nav><a href="/">Home</a> <a href="/about/">About   us</a>
            <a href="https://other.example/">Elsewhere</a><a href="/empty"></a></nav></body>"#,
        );
        let entries = extract_navigation(&tree, &seed(), &seed());

        assert_eq!(
            entries,
            vec![
                NavEntry {
                    label: "Home".into(),
                    target_path: "/".into()
                },
                NavEntry {
                    label: "About us".into(),
                    target_path: "/about".into()
                },
            ]
        );
    }

    #[test]
    fn test_header_fallback() {
        let tree = DocumentTree::parse(r#"<body><header><a href="docs">Docs</a></header></body>"#);
        let page = Url::parse("https://example.com/guide/").unwrap();
        let entries = extract_navigation(&tree, &page, &seed());

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target_path, "/guide/docs");
    }

    #[test]
    fn test_render_navigation_uses_message_keys() {
        let entries: BTreeSet<NavEntry> = [NavEntry {
            label: "About us".into(),
            target_path: "/about".into(),
        }]
        .into_iter()
        .collect();

        assert_eq!(
            render_navigation(&entries),
            r#"<nav><ul><li><Link to="/about">{t("nav.about-us")}</Link></li></ul></nav>"#
        );
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("  Über Uns! "), "ber-uns");
        assert_eq!(slug("FAQ & Help"), "faq-help");
        assert_eq!(slug("★"), "item");
    }
}
