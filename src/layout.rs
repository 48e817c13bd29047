use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use sanitize_filename::Options;

use crate::error::Result;

pub const OEBPS: &str = "OEBPS";
pub const IMAGES: &str = "Images";
pub const STYLES: &str = "Styles";

const REPLACED: &[char] = &[
    '~', '#', '%', '&', '*', '{', '}', '\\', '<', '>', '?', '/', '`', '\'', '"', '|', '+', ':',
];

/// Makes a book title safe to use as a directory name.
pub fn sanitize_dirname(name: &str) -> String {
    let name = match name.find(':') {
        Some(idx) if idx > 15 => &name[..idx],
        _ => name,
    };
    let replaced: String = name
        .chars()
        .map(|c| if REPLACED.contains(&c) { '_' } else { c })
        .collect();

    sanitize_filename::sanitize_with_options(
        replaced,
        Options {
            windows: true,
            truncate: true,
            replacement: "_",
        },
    )
}

/// On-disk skeleton of a book being assembled.
#[derive(Debug, Clone)]
pub struct BookLayout {
    root: PathBuf,
}

impl BookLayout {
    /// Creates `<books_dir>/<title> (<book_id>)/` with its OEBPS tree.
    pub fn create<P: AsRef<Path>>(books_dir: P, title: &str, book_id: &str) -> Result<Self> {
        let layout = Self {
            root: books_dir.as_ref().join(Self::dir_name(title, book_id)),
        };

        for dir in [
            layout.root.clone(),
            layout.oebps(),
            layout.styles_dir(),
            layout.images_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        debug!("Created book directory {}", layout.root.display());

        Ok(layout)
    }

    pub fn dir_name(title: &str, book_id: &str) -> String {
        let sanitized = sanitize_dirname(title);
        // Upstream titles carry the edition after a comma
        let title = sanitized.split(',').next().unwrap_or_default().trim();
        let title = if title.is_empty() { book_id } else { title };
        format!("{} ({})", title, book_id)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn oebps(&self) -> PathBuf {
        self.root.join(OEBPS)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.oebps().join(IMAGES)
    }

    pub fn styles_dir(&self) -> PathBuf {
        self.oebps().join(STYLES)
    }

    pub fn root_name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn epub_path(&self) -> PathBuf {
        self.root.join(format!("{}.epub", self.root_name()))
    }
}
