use std::fs;
use std::path::{Path, PathBuf};

use askama::Template;
use log::{debug, info};

use crate::{
    client::{Authenticated, OreillyClient},
    epub::cover::download_cover,
    epub::zip::{zip_directory, EPUB_MIMETYPE, MIMETYPE},
    error::{Result, SboError},
    fetcher::resolve_image_url,
    layout::{BookLayout, IMAGES, STYLES},
    models::{BookInfo, Chapter},
    templates::{ContainerXml, ContentOpf, CoverXhtml, ManifestItem, NavPoint, Toc},
};

const XHTML_MEDIA_TYPE: &str = "application/xhtml+xml";
const COVER_PAGE: &str = "cover.xhtml";
const COVER_PAGE_FALLBACK: &str = "cover-page.xhtml";
const COVER_CHAPTER_SCAN: usize = 3;

pub fn image_media_type(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

fn first_non_empty<'a>(values: &[&'a str]) -> &'a str {
    values
        .iter()
        .copied()
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

/// Sorted names of the regular files in `dir`.
fn list_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Assembles the final epub from a populated book directory.
pub struct EpubBuilder<'a> {
    layout: &'a BookLayout,
    book: &'a BookInfo,
    book_id: &'a str,
    chapters: &'a [Chapter],
    chapter_names: Vec<String>,
    cover: Option<String>,
}

impl<'a> EpubBuilder<'a> {
    pub fn new(
        layout: &'a BookLayout,
        book: &'a BookInfo,
        book_id: &'a str,
        chapters: &'a [Chapter],
    ) -> Self {
        EpubBuilder {
            layout,
            book,
            book_id,
            chapters,
            chapter_names: chapters.iter().map(Chapter::xhtml_filename).collect(),
            cover: None,
        }
    }

    pub fn cover(&self) -> Option<&str> {
        self.cover.as_deref()
    }

    pub fn with_cover(&mut self, filename: Option<String>) -> &mut Self {
        self.cover = filename;
        self
    }

    /// Picks the cover from the book metadata, or from the first chapters
    /// that look like a cover.
    pub async fn resolve_cover(&mut self, client: &OreillyClient<Authenticated>) -> &mut Self {
        let images_dir = self.layout.images_dir();
        if !self.book.cover.is_empty() {
            info!("Original cover URL: {}", self.book.cover);
            self.cover = download_cover(client, &self.book.cover, &images_dir).await;
            return self;
        }

        info!("No cover URL in book info, checking chapters");
        for chapter in self.chapters.iter().take(COVER_CHAPTER_SCAN) {
            if !chapter.is_cover() {
                continue;
            }
            info!("Found cover chapter: {}", chapter.title);
            for image in &chapter.images {
                let url = resolve_image_url(client.base_url(), self.book_id, chapter, image);
                if url.is_empty() {
                    continue;
                }
                if let Some(filename) = download_cover(client, &url, &images_dir).await {
                    self.cover = Some(filename);
                    return self;
                }
            }
        }
        self
    }

    fn cover_page_name(&self) -> &'static str {
        if self.chapter_names.iter().any(|name| name == COVER_PAGE) {
            COVER_PAGE_FALLBACK
        } else {
            COVER_PAGE
        }
    }

    fn write_cover_page(&self) -> Result<()> {
        if let Some(cover) = &self.cover {
            let page = CoverXhtml { image: cover }.render()?;
            fs::write(self.layout.oebps().join(self.cover_page_name()), page)?;
        }
        Ok(())
    }

    fn write_container(&self) -> Result<()> {
        fs::write(self.layout.root().join(MIMETYPE), EPUB_MIMETYPE)?;
        let meta_inf = self.layout.root().join("META-INF");
        fs::create_dir_all(&meta_inf)?;
        fs::write(meta_inf.join("container.xml"), ContainerXml.render()?)?;
        Ok(())
    }

    fn manifest(&self) -> Result<(Vec<ManifestItem>, Vec<String>, bool)> {
        let mut manifest = vec![ManifestItem {
            id: "ncx".to_string(),
            href: "toc.ncx".to_string(),
            media_type: "application/x-dtbncx+xml",
        }];
        let mut spine = Vec::new();

        if self.cover.is_some() {
            manifest.push(ManifestItem {
                id: "cover".to_string(),
                href: self.cover_page_name().to_string(),
                media_type: XHTML_MEDIA_TYPE,
            });
            spine.push("cover".to_string());
        }

        for (idx, name) in self.chapter_names.iter().enumerate() {
            let id = format!("ch{}", idx);
            manifest.push(ManifestItem {
                id: id.clone(),
                href: name.clone(),
                media_type: XHTML_MEDIA_TYPE,
            });
            spine.push(id);
        }

        let mut has_cover_image = false;
        for (idx, name) in list_files(&self.layout.images_dir())?.into_iter().enumerate() {
            let id = if Some(name.as_str()) == self.cover.as_deref() {
                has_cover_image = true;
                "cover-image".to_string()
            } else {
                format!("img{}", idx)
            };
            manifest.push(ManifestItem {
                id,
                href: format!("{}/{}", IMAGES, name),
                media_type: image_media_type(&name),
            });
        }

        for (idx, name) in list_files(&self.layout.styles_dir())?.into_iter().enumerate() {
            manifest.push(ManifestItem {
                id: format!("style{:02}", idx),
                href: format!("{}/{}", STYLES, name),
                media_type: "text/css",
            });
        }

        Ok((manifest, spine, has_cover_image))
    }

    /// Render content.opf file
    pub fn render_opf(&self) -> Result<String> {
        let (manifest, spine, has_cover_image) = self.manifest()?;
        let authors = match self.book.author_names() {
            names if names.is_empty() => vec!["Unknown"],
            names => names,
        };
        let publisher = match first_non_empty(
            &self
                .book
                .publishers
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>(),
        ) {
            "" => "Unknown",
            name => name,
        };
        let description = match self.book.description.as_str() {
            "" => "No description available",
            description => description,
        };
        let subjects: Vec<&str> = self
            .book
            .subjects
            .iter()
            .map(|s| s.name.as_str())
            .filter(|name| !name.is_empty())
            .collect();

        Ok(ContentOpf {
            title: &self.book.title,
            description,
            authors: &authors,
            publisher,
            subjects: &subjects,
            rights: &self.book.rights,
            identifier: first_non_empty(&[self.book.isbn.as_str(), self.book.identifier.as_str(), self.book_id]),
            issued: &self.book.issued,
            has_cover_image,
            manifest: &manifest,
            spine: &spine,
        }
        .render()?)
    }

    // Render toc.ncx
    pub fn render_toc(&self) -> Result<String> {
        let navpoints: Vec<NavPoint> = self
            .chapters
            .iter()
            .zip(&self.chapter_names)
            .enumerate()
            .map(|(idx, (chapter, name))| NavPoint {
                id: format!("ch{}", idx),
                order: idx + 1,
                label: &chapter.title,
                url: name,
            })
            .collect();
        let author = match self.book.author_names().join(", ") {
            author if author.is_empty() => "Unknown".to_string(),
            author => author,
        };

        Ok(Toc {
            uid: first_non_empty(&[self.book.isbn.as_str(), self.book_id]),
            title: &self.book.title,
            author: &author,
            navpoints: &navpoints,
        }
        .render()?)
    }

    /// Writes the package files and zips the book root into its epub.
    pub fn package(&self) -> Result<PathBuf> {
        self.write_cover_page()?;
        self.write_container()?;

        let oebps = self.layout.oebps();
        fs::write(oebps.join("content.opf"), self.render_opf()?)?;
        fs::write(oebps.join("toc.ncx"), self.render_toc()?)?;
        debug!("Wrote content.opf and toc.ncx");

        let root = self.layout.root();
        let zip_path = root.with_file_name(format!("{}.zip", self.layout.root_name()));
        zip_directory(root, &zip_path)?;

        let epub_path = self.layout.epub_path();
        fs::rename(&zip_path, &epub_path).map_err(|err| {
            SboError::Io(std::io::Error::new(
                err.kind(),
                format!("unable to move epub into place: {}", err),
            ))
        })?;
        Ok(epub_path)
    }

    pub async fn generate(&mut self, client: &OreillyClient<Authenticated>) -> Result<PathBuf> {
        self.resolve_cover(client).await;
        info!("Rendering OPF and generating final EPUB");
        self.package()
    }
}
