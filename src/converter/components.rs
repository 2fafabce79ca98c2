//! Component descriptors and naming

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Layout,
    Header,
    Footer,
    Navigation,
    Page,
}

/// One framework component of a converted site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
    /// Route served by a page component
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub imports: Vec<String>,
    pub jsx: String,
}

impl Component {
    pub fn shared(kind: ComponentKind, name: &str, imports: &[&str], jsx: String) -> Self {
        Self {
            name: name.to_string(),
            kind,
            route: None,
            title: None,
            imports: imports.iter().map(|s| s.to_string()).collect(),
            jsx,
        }
    }

    /// Length of the serialized descriptor
    pub fn byte_size(&self) -> Result<u64> {
        Ok(serde_json::to_vec(self)?.len() as u64)
    }
}

/// The Layout/Header/Navigation/Footer set shared by every page
pub fn shared_components(header: Option<String>, navigation: String, footer: Option<String>) -> Vec<Component> {
    vec![
        Component::shared(
            ComponentKind::Layout,
            "Layout",
            &["Header", "Navigation", "Footer"],
            "<div className=\"layout\"><Header /><Navigation /><main>{children}</main><Footer /></div>"
                .to_string(),
        ),
        Component::shared(
            ComponentKind::Header,
            "Header",
            &["Link"],
            header.unwrap_or_else(|| "<header />".to_string()),
        ),
        Component::shared(ComponentKind::Navigation, "Navigation", &["Link"], navigation),
        Component::shared(
            ComponentKind::Footer,
            "Footer",
            &["Link"],
            footer.unwrap_or_else(|| "<footer />".to_string()),
        ),
    ]
}

/// Hands out unique PascalCase page component names
#[derive(Debug, Default)]
pub struct ComponentNamer {
    used: HashMap<String, u32>,
}

impl ComponentNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for the page at `path`; repeats get a numeric suffix
    pub fn name(&mut self, path: &str) -> String {
        let base = component_name(path);
        let count = self.used.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}{}", base, count)
        }
    }
}

/// PascalCase component name for a page path
///
/// ```
/// use site_ferry::converter::component_name;
///
/// assert_eq!(component_name("/"), "HomePage");
/// assert_eq!(component_name("/about-us"), "AboutUsPage");
/// assert_eq!(component_name("/docs/getting_started"), "DocsGettingStartedPage");
/// ```
pub fn component_name(path: &str) -> String {
    let words: String = path
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        "HomePage".to_string()
    } else if words.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Route{}Page", words)
    } else {
        format!("{}Page", words)
    }
}
