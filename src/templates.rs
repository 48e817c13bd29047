use askama::Template; // bring trait in scope

mod filters {
    /// Escapes the five xml special characters.
    pub fn xml<T: std::fmt::Display>(value: T) -> ::askama::Result<String> {
        Ok(quick_xml::escape::escape(&value.to_string()).into_owned())
    }
}

#[derive(Template)]
#[template(path = "chapter.xhtml", escape = "none")]
pub struct ChapterXhtml<'a> {
    pub styles: &'a str,
    pub body: &'a str,
    pub should_support_kindle: bool,
}

#[derive(Template)]
#[template(path = "container.xml", escape = "none")]
pub struct ContainerXml;

#[derive(Template)]
#[template(path = "cover.xhtml", escape = "none")]
pub struct CoverXhtml<'a> {
    pub image: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: &'static str,
}

#[derive(Template)]
#[template(path = "content.opf", escape = "none")]
pub struct ContentOpf<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub authors: &'a [&'a str],
    pub publisher: &'a str,
    pub subjects: &'a [&'a str],
    pub rights: &'a str,
    pub identifier: &'a str,
    pub issued: &'a str,
    pub has_cover_image: bool,
    pub manifest: &'a [ManifestItem],
    pub spine: &'a [String],
}

pub struct NavPoint<'a> {
    pub id: String,
    pub order: usize,
    pub label: &'a str,
    pub url: &'a str,
}

#[derive(Template)]
#[template(path = "toc.ncx", escape = "none")]
pub struct Toc<'a> {
    pub uid: &'a str,
    pub title: &'a str,
    pub author: &'a str,
    pub navpoints: &'a [NavPoint<'a>],
}
