pub mod builder;
pub mod cover;
pub(crate) mod dom;
pub mod styles;
pub mod xhtml;
pub mod zip;

use std::path::PathBuf;

use log::info;

use crate::client::{Authenticated, OreillyClient};
use crate::config::DownloadConfig;
use crate::epub::builder::EpubBuilder;
use crate::error::Result;
use crate::fetcher::Downloader;
use crate::layout::BookLayout;

/// Downloads the configured book and returns the path of the written epub.
pub async fn build_epub(
    client: &OreillyClient<Authenticated>,
    config: &DownloadConfig,
) -> Result<PathBuf> {
    let book_id = config.book_id.as_str();

    info!("Retrieving book info");
    let book = client.fetch_book_details(book_id).await?;
    info!("Book: {}", book.title);

    info!("Retrieving book chapters");
    let chapters = client.fetch_book_chapters(book_id).await?;

    let layout = BookLayout::create(&config.output, &book.title, book_id)?;
    let downloader = Downloader::new(client, &layout, book_id, config.kindle);
    let chapters = downloader.download_chapters(chapters).await?;
    let styles = downloader.download_stylesheets().await;
    info!("Saved {} of {} stylesheets", styles, downloader.registry().len());

    info!("Creating EPUB file");
    let epub = EpubBuilder::new(&layout, &book, book_id, &chapters)
        .generate(client)
        .await?;
    info!("Done: {}", epub.display());

    Ok(epub)
}
