//! Turns a chapter's html as served by the reader into a standalone xhtml page
//! whose links all point inside the book.

use std::sync::Arc;

use askama::Template;
use html5ever::{parse_document, tendril::TendrilSink, ParseOpts};
use log::{debug, info};
use markup5ever_rcdom::RcDom;

use crate::{
    epub::dom::{new_element, new_text, NodeExt},
    epub::styles::StylesheetRegistry,
    error::{Result, SboError},
    layout::IMAGES,
    models::Chapter,
    templates::ChapterXhtml,
    urls::{base_name, filename_from_url, is_absolute_url, resolve_url},
};

const CONTENT_ID: &str = "sbo-rt-content";
const LINK_ATTRS: [&str; 4] = ["href", "src", "data", "poster"];
const IMAGE_HINTS: [&str; 3] = ["cover", "images", "graphics"];
const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg"];

fn is_image_link(link: &str) -> bool {
    let lower = link.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Maps a link found in chapter content to its location inside the book.
pub fn rewrite_link(link: &str) -> String {
    let link = link.trim();
    if link.is_empty() || link.starts_with("mailto:") || is_absolute_url(link) {
        return link.to_string();
    }

    let lower = link.to_lowercase();
    if IMAGE_HINTS.iter().any(|hint| lower.contains(hint)) || is_image_link(link) {
        let name = match base_name(link) {
            "" => filename_from_url(link),
            name => name.to_string(),
        };
        if name.is_empty() {
            return link.to_string();
        }
        return format!("{}/{}", IMAGES, name);
    }

    link.replace(".html", ".xhtml")
}

/// Rewrites the url part of every `srcset` candidate, keeping descriptors.
pub fn rewrite_srcset(value: &str) -> String {
    value
        .split(',')
        .map(|part| {
            let mut fields = part.split_whitespace();
            match fields.next() {
                Some(url) => {
                    let mut candidate = rewrite_link(url);
                    for descriptor in fields {
                        candidate.push(' ');
                        candidate.push_str(descriptor);
                    }
                    candidate
                }
                None => part.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn stylesheet_link(idx: usize) -> String {
    format!(
        r#"<link href="{}" rel="stylesheet" type="text/css" />"#,
        StylesheetRegistry::href(idx)
    )
}

#[derive(Debug, Clone)]
pub struct TransformedChapter {
    /// Stylesheet links and inline styles collected for the page head.
    pub page_css: String,
    pub xhtml: String,
}

/// Chapter transformer, shared by all chapter workers of a book.
pub struct ChapterTransformer {
    book_url: String,
    kindle: bool,
    registry: Arc<StylesheetRegistry>,
}

impl ChapterTransformer {
    pub fn new(book_url: &str, kindle: bool, registry: Arc<StylesheetRegistry>) -> Self {
        Self {
            book_url: book_url.to_string(),
            kindle,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<StylesheetRegistry> {
        &self.registry
    }

    /// Transforms `html`, the fetched body of `chapter`.
    pub fn transform(&self, chapter: &Chapter, html: &str, is_first: bool) -> Result<TransformedChapter> {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        let document = dom.document.clone();
        let mut page_css: Vec<String> = Vec::new();

        let declared = chapter
            .stylesheets
            .iter()
            .map(|sheet| sheet.url.as_str())
            .chain(chapter.site_styles.iter().map(String::as_str))
            .filter(|url| !url.is_empty());
        for url in declared {
            let idx = self.registry.register(&resolve_url(&chapter.asset_base_url, url));
            page_css.push(stylesheet_link(idx));
        }

        for link in document.elements_named("link") {
            if link.attr("rel").as_deref() != Some("stylesheet") {
                continue;
            }
            if let Some(href) = link.attr("href") {
                let url = resolve_url(&self.book_url, &href);
                if !url.is_empty() {
                    page_css.push(stylesheet_link(self.registry.register(&url)));
                }
                link.detach();
            }
        }

        for style in document.elements_named("style") {
            if let Some(template) = style.attr("data-template") {
                style.clear_children();
                style.remove_attr("data-template");
                style.append(new_text(&template));
            }
            if let Some(css) = style.to_html() {
                page_css.push(css);
            }
        }

        for image in document.elements_named("image") {
            let Some(parent) = image.parent() else { continue };
            if parent.parent().is_none() {
                continue;
            }
            let Some(src) = image.find_attr(|key| key.to_lowercase().contains("href")) else {
                continue;
            };
            parent.insert_before(new_element("img", &[("src", &src)]));
            parent.detach();
        }

        let content = document
            .descendants()
            .into_iter()
            .find(|node| node.is_element("div") && node.attr("id").as_deref() == Some(CONTENT_ID))
            .ok_or_else(|| {
                SboError::ParseError(format!("book content missing for {}", chapter.title))
            })?;

        content.rewrite_attrs(|key, value| {
            if LINK_ATTRS.contains(&key) {
                Some(rewrite_link(value))
            } else if key == "srcset" {
                Some(rewrite_srcset(value))
            } else {
                None
            }
        });

        let body = content.to_xhtml();
        let styles: String = page_css.iter().map(|fragment| format!("{}\n", fragment)).collect();

        if is_first {
            info!(
                "First chapter '{}' declares {} style fragments",
                chapter.title,
                page_css.len()
            );
        } else {
            debug!("Transformed '{}' ({} style fragments)", chapter.title, page_css.len());
        }

        let xhtml = ChapterXhtml {
            styles: &styles,
            body: &body,
            should_support_kindle: self.kindle,
        }
        .render()
        .map_err(|err| {
            SboError::ParseError(format!("unable to serialize chapter {}: {}", chapter.title, err))
        })?;

        Ok(TransformedChapter {
            page_css: styles,
            xhtml,
        })
    }
}
