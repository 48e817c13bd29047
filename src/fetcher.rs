use std::collections::HashSet;
use std::sync::Arc;

use futures::{
    future,
    stream::{self, StreamExt},
};
use log::{debug, info, warn};
use tokio::fs;
use url::Url;

use crate::{
    client::{Authenticated, OreillyClient},
    epub::{styles::StylesheetRegistry, xhtml::ChapterTransformer},
    error::{Result, SboError},
    layout::BookLayout,
    models::Chapter,
    urls::{filename_from_url, resolve_url},
};

const CONCURRENT_REQUESTS: usize = 5;

/// Absolute url of a chapter image. Chapters served through the v2 epub api
/// keep their assets under the book's file listing instead of the asset base.
pub(crate) fn resolve_image_url(base_url: &Url, book_id: &str, chapter: &Chapter, image: &str) -> String {
    if chapter.api_v2_assets {
        return format!(
            "{}/api/v2/epubs/urn:orm:book:{}/files/{}",
            base_url.as_str().trim_end_matches('/'),
            book_id,
            image.strip_prefix('/').unwrap_or(image)
        );
    }
    resolve_url(&chapter.asset_base_url, image)
}

pub(crate) fn ensure_unique_filenames(chapters: &[Chapter]) -> Result<()> {
    let mut seen = HashSet::with_capacity(chapters.len());
    for chapter in chapters {
        let name = chapter.xhtml_filename();
        if !seen.insert(name) {
            return Err(SboError::Upstream(format!(
                "duplicate chapter filename: {}",
                chapter.filename
            )));
        }
    }
    Ok(())
}

/// Downloads chapters and their assets into a book layout.
pub struct Downloader<'a> {
    client: &'a OreillyClient<Authenticated>,
    layout: &'a BookLayout,
    book_id: &'a str,
    transformer: ChapterTransformer,
}

impl<'a> Downloader<'a> {
    pub fn new(
        client: &'a OreillyClient<Authenticated>,
        layout: &'a BookLayout,
        book_id: &'a str,
        kindle: bool,
    ) -> Self {
        let transformer = ChapterTransformer::new(
            client.base_url().as_str(),
            kindle,
            Arc::new(StylesheetRegistry::new()),
        );
        Self {
            client,
            layout,
            book_id,
            transformer,
        }
    }

    pub fn registry(&self) -> &StylesheetRegistry {
        self.transformer.registry()
    }

    async fn process_chapter(&self, idx: usize, mut chapter: Chapter) -> Result<Chapter> {
        let response = self.client.get(&chapter.content).await?;
        if !response.is_success() {
            return Err(SboError::Upstream(format!(
                "status {} for chapter {}",
                response.status, chapter.title
            )));
        }

        let html = response.text();
        chapter.api_v2_assets = html.contains("/api/v2/");
        let page = self.transformer.transform(&chapter, &html, idx == 0)?;

        let filename = chapter.xhtml_filename();
        if !filename.ends_with(".xhtml") {
            warn!("Chapter '{}' is saved as {}", chapter.title, filename);
        }
        let path = self.layout.oebps().join(&filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, page.xhtml).await?;
        debug!("Saved {}", filename);
        chapter.filename = filename;

        self.download_images(&chapter).await;
        Ok(chapter)
    }

    async fn download_images(&self, chapter: &Chapter) {
        if !chapter.images.is_empty() {
            debug!("Chapter '{}' has {} images", chapter.title, chapter.images.len());
        }

        let images_dir = self.layout.images_dir();
        for image in &chapter.images {
            let url = resolve_image_url(self.client.base_url(), self.book_id, chapter, image);
            if url.is_empty() {
                warn!("Skipping empty image url from: {}", image);
                continue;
            }
            let filename = filename_from_url(&url);
            if filename.is_empty() {
                warn!("Could not get filename from url: {}", url);
                continue;
            }

            let path = images_dir.join(&filename);
            if fs::try_exists(&path).await.unwrap_or(false) {
                debug!("Image already exists: {}", filename);
                continue;
            }

            match self.client.get(&url).await {
                Ok(response) if response.is_success() => {
                    if let Err(err) = fs::write(&path, &response.body).await {
                        warn!("Failed to save {}: {}", filename, err);
                    }
                }
                Ok(response) => warn!("Failed to download {}: status {}", url, response.status),
                Err(err) => warn!("Failed to download {}: {}", url, err),
            }
        }
    }

    /// Processes every chapter with at most five in flight.
    ///
    /// All chapters run to completion even when some fail; the first failure
    /// to complete is returned. On success chapters come back in index order
    /// with their filenames pointing at the written xhtml.
    pub async fn download_chapters(&self, chapters: Vec<Chapter>) -> Result<Vec<Chapter>> {
        ensure_unique_filenames(&chapters)?;
        info!("Downloading {} chapters", chapters.len());

        let results: Vec<(usize, Result<Chapter>)> = stream::iter(chapters.into_iter().enumerate())
            .map(|(idx, chapter)| async move {
                let title = chapter.title.clone();
                let result = self.process_chapter(idx, chapter).await.map_err(|err| {
                    warn!("Failed chapter {}: {}", title, err);
                    err.in_chapter(&title)
                });
                (idx, result)
            })
            .buffer_unordered(CONCURRENT_REQUESTS)
            .collect()
            .await;

        let mut processed = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (idx, result) in results {
            match result {
                Ok(chapter) => processed.push((idx, chapter)),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        processed.sort_by_key(|(idx, _)| *idx);
        Ok(processed.into_iter().map(|(_, chapter)| chapter).collect())
    }

    /// Fetches every registered stylesheet into `Styles/`. Returns how many
    /// were saved; failures are only logged.
    pub async fn download_stylesheets(&self) -> usize {
        let entries = self.registry().entries();
        info!("Downloading {} stylesheets", entries.len());

        stream::iter(entries)
            .map(|(idx, url)| async move {
                let path = self.layout.styles_dir().join(StylesheetRegistry::file_name(idx));
                match self.client.get(&url).await {
                    Ok(response) if response.is_success() => {
                        match fs::write(&path, &response.body).await {
                            Ok(()) => true,
                            Err(err) => {
                                warn!("Failed to save stylesheet {}: {}", url, err);
                                false
                            }
                        }
                    }
                    Ok(response) => {
                        warn!("Missing stylesheet {}: status {}", url, response.status);
                        false
                    }
                    Err(err) => {
                        warn!("Missing stylesheet {}: {}", url, err);
                        false
                    }
                }
            })
            .buffer_unordered(CONCURRENT_REQUESTS)
            .filter(|saved| future::ready(*saved))
            .count()
            .await
    }
}
