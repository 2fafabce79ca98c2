//! Converter from a completed crawl to a component model
//!
//! This module turns the stored pages and assets of a completed crawl into:
//! - One page component per page, routed by its canonical path
//! - Shared Layout, Header, Navigation and Footer components
//! - A shared navigation set and a shared stylesheet
//! - An i18n bundle of navigation labels and page titles
//!
//! The result is persisted as a converted site holding the serialized
//! manifest. Conversion reads an immutable snapshot of the crawl, so it
//! never coordinates with a running crawl.

mod components;
mod navigation;
mod styles;
mod tree;

pub use components::{component_name, Component, ComponentKind, ComponentNamer};
pub use navigation::{extract_navigation, NavEntry};
pub use styles::{style_object, SharedStylesheet, StyleCollector, GLOBAL_STYLESHEET_PATH};
pub use tree::{DocumentTree, Node, NodeId, NodeKind};

use crate::config::ConverterConfig;
use crate::crawler::resolve_link;
use crate::state::{CrawlOptions, CrawlStatus};
use crate::storage::{
    self, AssetRecord, AssetType, ConversionResult, ConversionStatus, CrawlRecord, PageRecord,
    SharedStorage, Storage, StorageError,
};
use crate::url::{asset_path, same_origin};
use crate::{FerryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use url::Url;

/// Locale used when pages declare no `<html lang>`
pub const DEFAULT_LOCALE: &str = "en";

/// Translatable strings of a converted site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I18nBundle {
    pub locale: String,
    pub messages: BTreeMap<String, String>,
}

/// Image asset referenced by the converted site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: String,
    pub url: String,
    pub bytes: u64,
}

/// Everything downstream code generation needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteManifest {
    pub framework: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub react_version: Option<String>,
    pub seed_url: String,
    pub page_count: u64,
    pub components: Vec<Component>,
    pub navigation: BTreeSet<NavEntry>,
    pub stylesheets: Vec<SharedStylesheet>,
    pub images: Vec<ImageRef>,
    pub i18n: I18nBundle,
    pub warnings: Vec<String>,
}

impl SiteManifest {
    /// Page components only
    pub fn pages(&self) -> impl Iterator<Item = &Component> {
        self.components
            .iter()
            .filter(|c| c.kind == ComponentKind::Page)
    }
}

/// Outcome of one conversion attempt
#[derive(Debug, Clone)]
pub struct ConvertedSite {
    pub id: i64,
    pub crawl_id: i64,
    pub status: ConversionStatus,
    pub page_count: u64,
    pub size: u64,
    pub error: Option<String>,
    pub manifest: SiteManifest,
}

/// Manifest plus the figures stored next to it
#[derive(Debug, Clone)]
pub struct SiteBuild {
    pub manifest: SiteManifest,
    pub size: u64,
    pub converted_pages: usize,
}

/// Converts a completed crawl and records the attempt
///
/// Fails with `InvalidState` unless the crawl is `completed`. A conversion
/// in which no page could be converted is stored as `failed` and still
/// returned.
pub fn convert(
    storage: &SharedStorage,
    crawl_id: i64,
    user_id: &str,
    config: &ConverterConfig,
) -> Result<ConvertedSite> {
    let (crawl, pages, stylesheets, images, site_id) = {
        let mut guard = storage::lock(storage)?;
        let crawl = guard.get_crawl(crawl_id).map_err(|e| match e {
            StorageError::CrawlNotFound(id) => FerryError::CrawlNotFound(id),
            other => other.into(),
        })?;
        if crawl.status != CrawlStatus::Completed {
            return Err(FerryError::InvalidState {
                crawl_id,
                status: crawl.status,
            });
        }

        let pages = guard.get_pages(crawl_id)?;
        let stylesheets = guard.get_assets(crawl_id, Some(AssetType::Stylesheet))?;
        let images = guard.get_assets(crawl_id, Some(AssetType::Image))?;
        let site_id = guard.create_converted_site(
            crawl_id,
            user_id,
            &config.framework,
            config.react_version.as_deref(),
        )?;
        (crawl, pages, stylesheets, images, site_id)
    };

    tracing::info!(
        "Converting crawl {} ({} pages) into converted site {}",
        crawl_id,
        pages.len(),
        site_id
    );

    let build = match build_site(&crawl, &pages, &stylesheets, &images, config) {
        Ok(build) => build,
        Err(e) => {
            let reason = e.to_string();
            storage::lock(storage)?.finish_converted_site(
                site_id,
                &ConversionResult {
                    status: ConversionStatus::Failed,
                    page_count: crawl.page_count,
                    size: 0,
                    error: Some(&reason),
                    manifest: None,
                },
            )?;
            return Err(e);
        }
    };
    let (status, error) = if build.converted_pages == 0 {
        (
            ConversionStatus::Failed,
            Some(format!("No page of crawl {} could be converted", crawl_id)),
        )
    } else {
        (ConversionStatus::Completed, None)
    };

    let manifest_json = serde_json::to_string(&build.manifest)?;
    storage::lock(storage)?.finish_converted_site(
        site_id,
        &ConversionResult {
            status,
            page_count: build.manifest.page_count,
            size: build.size,
            error: error.as_deref(),
            manifest: Some(&manifest_json),
        },
    )?;

    match &error {
        Some(reason) => tracing::warn!("Converted site {} failed: {}", site_id, reason),
        None => tracing::info!(
            "Converted site {}: {} components, {} bytes, {} warnings",
            site_id,
            build.manifest.components.len(),
            build.size,
            build.manifest.warnings.len()
        ),
    }

    Ok(ConvertedSite {
        id: site_id,
        crawl_id,
        status,
        page_count: build.manifest.page_count,
        size: build.size,
        error,
        manifest: build.manifest,
    })
}

/// A single page after conversion
struct PageOutput {
    component: Component,
    navigation: Vec<NavEntry>,
    inline_styles: Vec<String>,
    lang: Option<String>,
    header: Option<String>,
    footer: Option<String>,
}

/// Builds the manifest from a crawl snapshot
///
/// Deterministic: pages are processed in path order and every shared set
/// is ordered, so the same snapshot always yields the same manifest.
pub fn build_site(
    crawl: &CrawlRecord,
    pages: &[PageRecord],
    stylesheets: &[AssetRecord],
    images: &[AssetRecord],
    config: &ConverterConfig,
) -> Result<SiteBuild> {
    let seed = Url::parse(&crawl.seed_url).map_err(|e| {
        FerryError::ConversionFailure(format!("invalid seed URL {}: {}", crawl.seed_url, e))
    })?;
    let options = &crawl.options;
    let stored_images: HashSet<&str> = images.iter().map(|a| a.path.as_str()).collect();

    let mut namer = ComponentNamer::new();
    let mut page_components = Vec::new();
    let mut navigation = BTreeSet::new();
    let mut inline_styles = Vec::new();
    let mut warnings = Vec::new();
    let mut locale = None;
    let mut header = None;
    let mut footer = None;

    for page in pages {
        let name = namer.name(&page.path);
        match convert_page(page, &seed, options, &stored_images, name) {
            Ok(output) => {
                navigation.extend(output.navigation);
                inline_styles.extend(output.inline_styles.into_iter().map(|css| (page.path.clone(), css)));
                locale = locale.or(output.lang);
                header = header.or(output.header);
                footer = footer.or(output.footer);
                page_components.push(output.component);
            }
            Err(e) => {
                tracing::warn!("Skipping page {} of crawl {}: {}", page.path, crawl.id, e);
                warnings.push(format!("Skipped page {}: {}", page.path, e));
            }
        }
    }

    let stylesheet = if options.preserve_css {
        let mut collector = StyleCollector::new();
        for asset in stylesheets {
            collector.add_linked(&asset.path, &String::from_utf8_lossy(&asset.content));
        }
        for (path, css) in &inline_styles {
            collector.add_inline(path, css);
        }
        collector.finish()
    } else {
        None
    };

    let image_refs: Vec<ImageRef> = if options.download_images {
        images
            .iter()
            .map(|a| ImageRef {
                path: a.path.clone(),
                url: a.url.clone(),
                bytes: a.content.len() as u64,
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut messages = BTreeMap::new();
    for entry in &navigation {
        messages.insert(navigation::message_key(&entry.label), entry.label.clone());
    }
    for component in &page_components {
        if let Some(title) = &component.title {
            messages.insert(format!("pages.{}.title", component.name), title.clone());
        }
    }

    let converted_pages = page_components.len();
    let mut components = components::shared_components(
        header,
        navigation::render_navigation(&navigation),
        footer,
    );
    components.extend(page_components);

    let mut size = 0;
    for component in &components {
        size += component.byte_size()?;
    }
    size += stylesheet.iter().map(|s| s.content.len() as u64).sum::<u64>();
    size += image_refs.iter().map(|i| i.bytes).sum::<u64>();

    let manifest = SiteManifest {
        framework: config.framework.clone(),
        react_version: config.react_version.clone(),
        seed_url: crawl.seed_url.clone(),
        page_count: crawl.page_count,
        components,
        navigation,
        stylesheets: stylesheet.into_iter().collect(),
        images: image_refs,
        i18n: I18nBundle {
            locale: locale.unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            messages,
        },
        warnings,
    };

    Ok(SiteBuild {
        manifest,
        size,
        converted_pages,
    })
}

fn convert_page(
    page: &PageRecord,
    seed: &Url,
    options: &CrawlOptions,
    stored_images: &HashSet<&str>,
    name: String,
) -> Result<PageOutput> {
    if page.content.trim().is_empty() {
        return Err(FerryError::ConversionFailure("page has no content".into()));
    }
    let page_url = Url::parse(&page.url).map_err(|e| {
        FerryError::ConversionFailure(format!("invalid page URL {}: {}", page.url, e))
    })?;

    let mut tree = DocumentTree::parse(&page.content);
    let root = tree.root();
    let body = tree
        .find_first(root, "body")
        .ok_or_else(|| FerryError::ConversionFailure("document has no body".into()))?;

    let lang = tree
        .attr(root, "lang")
        .map(|l| l.trim().to_ascii_lowercase())
        .filter(|l| !l.is_empty());

    let inline_styles = if options.preserve_css {
        tree.find_all(root, "style")
            .into_iter()
            .map(|id| tree.raw_text(id))
            .collect()
    } else {
        Vec::new()
    };
    tree.remove_where(root, &|node: &Node| node.is_element("style") || node.is_element("link"));

    let navigation = if options.preserve_nav {
        let entries = extract_navigation(&tree, &page_url, seed);
        tree.remove_where(root, &|node: &Node| node.is_element("nav"));
        entries
    } else {
        Vec::new()
    };

    let mut uses_link = false;
    for anchor in tree.find_all(root, "a") {
        let Some(target) = tree
            .attr(anchor, "href")
            .and_then(|href| resolve_link(href, &page_url))
        else {
            continue;
        };

        if same_origin(&target, seed) {
            tree.rename(anchor, "Link");
            tree.remove_attr(anchor, "href");
            tree.set_attr(anchor, "to", &crate::url::page_path(&target));
            uses_link = true;
        } else {
            tree.set_attr(anchor, "href", target.as_str());
        }
    }

    for image in tree.find_all(root, "img") {
        let Some(source) = tree
            .attr(image, "src")
            .and_then(|src| resolve_link(src, &page_url))
        else {
            continue;
        };

        let path = asset_path(&source, seed);
        if stored_images.contains(path.as_str()) {
            tree.set_attr(image, "src", &path);
        } else {
            tree.set_attr(image, "src", source.as_str());
        }
    }

    let header = tree.find_first(body, "header").map(|id| tree.to_jsx(id));
    let footer = tree.find_first(body, "footer").map(|id| tree.to_jsx(id));

    let content = match tree.find_first(body, "main") {
        Some(main) => main,
        None => {
            tree.remove_where(body, &|node: &Node| {
                node.is_element("header") || node.is_element("footer")
            });
            body
        }
    };

    let title = page
        .title
        .clone()
        .or_else(|| tree.find_first(root, "title").map(|id| tree.text(id)))
        .filter(|t| !t.is_empty());

    Ok(PageOutput {
        component: Component {
            name,
            kind: ComponentKind::Page,
            route: Some(page.path.clone()),
            title,
            imports: if uses_link {
                vec!["Link".to_string()]
            } else {
                Vec::new()
            },
            jsx: tree.children_to_jsx(content),
        },
        navigation,
        inline_styles,
        lang,
        header,
        footer,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{NewPage, SqliteStorage};

    const HOME: &str = r#"<!DOCTYPE html><html lang="de"><head><title>Home</title>
        <style>h1 { color: red }</style><link rel="stylesheet" href="/site.css"></head>
        <body><header><a href="/">Logo</a></header>
        <nav><a href="/">Home</a><a href="/about">About</a></nav>
        <main><h1>Welcome</h1><a href="/about?x=1#top">More</a>
        <a href="https://other.example/page">Out</a><img src="/logo.png">
        <script>track()</script></main>
        <footer>(c) Example</footer></body></html>"#;

    const ABOUT: &str = r#"<html><head><title>About</title><style>h1 { color: red }</style></head>
        <body><nav><a href="/">Home</a><a href="/about">About</a><a href="/team">Team</a></nav>
        <p>About us</p></body></html>"#;

    fn seed_crawl(status: CrawlStatus, options: CrawlOptions) -> (SharedStorage, i64) {
        let mut backend = SqliteStorage::new_in_memory().unwrap();
        let crawl_id = backend
            .create_crawl("user-1", "https://example.com/", 1, &options)
            .unwrap();
        for (url, path, title, html) in [
            ("https://example.com/", "/", "Home", HOME),
            ("https://example.com/about", "/about", "About", ABOUT),
            ("https://example.com/empty", "/empty", "Empty", "   "),
        ] {
            backend
                .insert_page(
                    crawl_id,
                    &NewPage {
                        url,
                        path,
                        title: Some(title),
                        content: html,
                        depth: 0,
                    },
                )
                .unwrap();
        }
        backend.set_page_count(crawl_id, 3).unwrap();
        backend
            .insert_asset(
                crawl_id,
                "https://example.com/site.css",
                "/site.css",
                AssetType::Stylesheet,
                b"body { margin: 0 }",
            )
            .unwrap();
        backend
            .insert_asset(
                crawl_id,
                "https://example.com/logo.png",
                "/logo.png",
                AssetType::Image,
                &[1, 2, 3, 4],
            )
            .unwrap();
        backend.update_crawl_status(crawl_id, CrawlStatus::InProgress, None).unwrap();
        if status != CrawlStatus::InProgress {
            backend.update_crawl_status(crawl_id, status, None).unwrap();
        }
        (storage::shared(backend), crawl_id)
    }

    fn all_options() -> CrawlOptions {
        CrawlOptions {
            download_images: true,
            preserve_css: true,
            preserve_nav: true,
            respect_robots: false,
        }
    }

    #[test]
    fn test_requires_completed_crawl() {
        let (shared, crawl_id) = seed_crawl(CrawlStatus::InProgress, all_options());
        let err = convert(&shared, crawl_id, "user-1", &ConverterConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            FerryError::InvalidState {
                status: CrawlStatus::InProgress,
                ..
            }
        ));
    }

    #[test]
    fn test_converts_pages_and_shared_components() {
        let (shared, crawl_id) = seed_crawl(CrawlStatus::Completed, all_options());
        let site = convert(&shared, crawl_id, "user-1", &ConverterConfig::default()).unwrap();

        assert_eq!(site.status, ConversionStatus::Completed);
        assert_eq!(site.page_count, 3);
        let manifest = &site.manifest;
        assert_eq!(manifest.components.len(), 4 + 2);
        assert_eq!(manifest.warnings.len(), 1);
        assert!(manifest.warnings[0].contains("/empty"));

        let home = manifest.pages().find(|c| c.name == "HomePage").unwrap();
        assert_eq!(home.route.as_deref(), Some("/"));
        assert!(home.jsx.contains(r#"<Link to="/about?x=1">More</Link>"#));
        assert!(home.jsx.contains(r#"<a href="https://other.example/page">Out</a>"#));
        assert!(home.jsx.contains(r#"<img src="/logo.png" />"#));
        assert!(!home.jsx.contains("track()"));
        assert_eq!(home.imports, vec!["Link"]);

        let footer = manifest
            .components
            .iter()
            .find(|c| c.kind == ComponentKind::Footer)
            .unwrap();
        assert_eq!(footer.jsx, "<footer>(c) Example</footer>");

        let targets: Vec<&str> = manifest
            .navigation
            .iter()
            .map(|n| n.target_path.as_str())
            .collect();
        assert_eq!(targets, vec!["/about", "/", "/team"]);

        assert_eq!(manifest.stylesheets.len(), 1);
        assert_eq!(
            manifest.stylesheets[0].sources,
            vec!["/site.css", "inline:/"]
        );
        assert_eq!(manifest.images.len(), 1);
        assert_eq!(manifest.i18n.locale, "de");
        assert_eq!(manifest.i18n.messages["nav.team"], "Team");
        assert_eq!(manifest.i18n.messages["pages.AboutPage.title"], "About");
    }

    #[test]
    fn test_size_counts_components_and_assets() {
        let (shared, crawl_id) = seed_crawl(CrawlStatus::Completed, all_options());
        let site = convert(&shared, crawl_id, "user-1", &ConverterConfig::default()).unwrap();

        let component_bytes: u64 = site
            .manifest
            .components
            .iter()
            .map(|c| c.byte_size().unwrap())
            .sum();
        let stylesheet_bytes = site.manifest.stylesheets[0].content.len() as u64;
        assert_eq!(site.size, component_bytes + stylesheet_bytes + 4);
    }

    #[test]
    fn test_options_switch_off_css_and_nav() {
        let options = CrawlOptions {
            download_images: false,
            preserve_css: false,
            preserve_nav: false,
            respect_robots: false,
        };
        let (shared, crawl_id) = seed_crawl(CrawlStatus::Completed, options);
        let site = convert(&shared, crawl_id, "user-1", &ConverterConfig::default()).unwrap();

        assert!(site.manifest.navigation.is_empty());
        assert!(site.manifest.stylesheets.is_empty());
        assert!(site.manifest.images.is_empty());
        let about = site.manifest.pages().find(|c| c.name == "AboutPage").unwrap();
        assert!(about.jsx.contains("<nav>"));
    }

    #[test]
    fn test_conversion_is_repeatable() {
        let (shared, crawl_id) = seed_crawl(CrawlStatus::Completed, all_options());
        let config = ConverterConfig::default();
        let first = convert(&shared, crawl_id, "user-1", &config).unwrap();
        let second = convert(&shared, crawl_id, "user-1", &config).unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.manifest, second.manifest);
        assert_eq!(first.size, second.size);
    }

    #[test]
    fn test_no_convertible_pages_fails() {
        let mut backend = SqliteStorage::new_in_memory().unwrap();
        let crawl_id = backend
            .create_crawl("user-1", "https://example.com/", 0, &all_options())
            .unwrap();
        backend.update_crawl_status(crawl_id, CrawlStatus::InProgress, None).unwrap();
        backend.update_crawl_status(crawl_id, CrawlStatus::Completed, None).unwrap();
        let shared = storage::shared(backend);

        let site = convert(&shared, crawl_id, "user-1", &ConverterConfig::default()).unwrap();

        assert_eq!(site.status, ConversionStatus::Failed);
        assert!(site.error.is_some());
        let stored = storage::lock(&shared)
            .unwrap()
            .get_converted_site(site.id)
            .unwrap();
        assert_eq!(stored.status, ConversionStatus::Failed);
        assert!(stored.manifest.is_some());
    }

    #[test]
    fn test_deeply_nested_page_converts() {
        let depth = 20_000;
        let html = format!(
            "<html><body><main>{}<a href=\"/about\">About</a>{}</main></body></html>",
            "<div>".repeat(depth),
            "</div>".repeat(depth)
        );
        let mut backend = SqliteStorage::new_in_memory().unwrap();
        let crawl_id = backend
            .create_crawl("user-1", "https://example.com/", 0, &all_options())
            .unwrap();
        backend
            .insert_page(
                crawl_id,
                &NewPage {
                    url: "https://example.com/",
                    path: "/",
                    title: None,
                    content: &html,
                    depth: 0,
                },
            )
            .unwrap();
        backend.set_page_count(crawl_id, 1).unwrap();
        backend.update_crawl_status(crawl_id, CrawlStatus::InProgress, None).unwrap();
        backend.update_crawl_status(crawl_id, CrawlStatus::Completed, None).unwrap();
        let shared = storage::shared(backend);

        let site = convert(&shared, crawl_id, "user-1", &ConverterConfig::default()).unwrap();

        assert_eq!(site.status, ConversionStatus::Completed);
        let home = site.manifest.pages().next().unwrap();
        assert!(home.jsx.contains(r#"<Link to="/about">About</Link>"#));
        assert_eq!(home.jsx.matches("<div>").count(), depth);
    }
}
