use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use log::debug;
use walkdir::WalkDir;
use zip::write::{FileOptions, ZipWriter};
use zip::{CompressionMethod, DateTime};

use crate::error::Result;

pub const MIMETYPE: &str = "mimetype";
pub const EPUB_MIMETYPE: &[u8] = b"application/epub+zip";

fn options(method: CompressionMethod) -> FileOptions {
    // Fixed timestamps keep archives of the same tree byte-identical
    FileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

pub struct ZipArchive<W: Write + Seek> {
    writer: ZipWriter<W>,
}

impl<W: Write + Seek> fmt::Debug for ZipArchive<W> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ZipArchive")
    }
}

impl<W: Write + Seek> ZipArchive<W> {
    /// Starts an epub archive, `mimetype` goes first and uncompressed.
    pub fn new(inner: W, mimetype: &[u8]) -> Result<Self> {
        let mut writer = ZipWriter::new(inner);
        writer.set_comment(""); // Fix issues with some readers

        writer
            .start_file(MIMETYPE, options(CompressionMethod::Stored))
            .context("could not create mimetype in epub")?;
        writer
            .write_all(mimetype)
            .context("could not write mimetype in epub")?;

        Ok(ZipArchive { writer })
    }

    pub fn write_file<R: Read>(&mut self, name: &str, mut content: R) -> Result<()> {
        self.writer
            .start_file(name, options(CompressionMethod::Deflated))
            .with_context(|| format!("could not create file '{}' in epub", name))?;
        io::copy(&mut content, &mut self.writer)
            .with_context(|| format!("could not write file '{}' in epub", name))?;
        Ok(())
    }

    pub fn add_directory(&mut self, name: &str) -> Result<()> {
        self.writer
            .add_directory(name, options(CompressionMethod::Deflated))
            .with_context(|| format!("could not create directory '{}' in epub", name))?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        Ok(self.writer.finish().context("error writing zip file")?)
    }
}

/// Zips every file below `root` into `dest`, keeping relative paths.
///
/// Entries are sorted by path. A top level `mimetype` file is written first
/// and stored, and top level `.epub` files are left out.
pub fn zip_directory(root: &Path, dest: &Path) -> Result<()> {
    let mimetype = match fs::read(root.join(MIMETYPE)) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => EPUB_MIMETYPE.to_vec(),
        Err(err) => return Err(err.into()),
    };
    let mut archive = ZipArchive::new(File::create(dest)?, &mimetype)?;

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.context("failed to walk book directory")?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .context("walked outside of the book directory")?;
        // Path names should not use backslashes in zip files
        let name = relative.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            archive.add_directory(&name)?;
            continue;
        }

        if entry.depth() == 1
            && (name == MIMETYPE || relative.extension().map_or(false, |ext| ext == "epub"))
        {
            continue;
        }

        debug!("Adding {} to archive", name);
        archive.write_file(&name, File::open(entry.path())?)?;
    }

    archive.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mimetype_is_first_and_stored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("book");
        fs::create_dir_all(root.join("META-INF")).unwrap();
        fs::create_dir_all(root.join("OEBPS/Images")).unwrap();
        fs::write(root.join("mimetype"), EPUB_MIMETYPE).unwrap();
        fs::write(root.join("META-INF/container.xml"), "<container/>").unwrap();
        fs::write(root.join("OEBPS/ch01.xhtml"), "<html/>").unwrap();
        fs::write(root.join("OEBPS/Images/a.png"), [1u8, 2, 3]).unwrap();
        fs::write(root.join("book.epub"), "stale").unwrap();

        let dest = dir.path().join("book.zip");
        zip_directory(&root, &dest).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "mimetype",
                "META-INF/",
                "META-INF/container.xml",
                "OEBPS/",
                "OEBPS/Images/",
                "OEBPS/Images/a.png",
                "OEBPS/ch01.xhtml",
            ]
        );

        let mut mimetype = archive.by_index(0).unwrap();
        assert_eq!(mimetype.compression(), CompressionMethod::Stored);
        let mut content = String::new();
        mimetype.read_to_string(&mut content).unwrap();
        assert_eq!(content, "application/epub+zip");
    }

    #[test]
    fn archives_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("book");
        fs::create_dir_all(root.join("OEBPS")).unwrap();
        fs::write(root.join("OEBPS/ch01.xhtml"), "<html/>").unwrap();

        zip_directory(&root, &dir.path().join("a.zip")).unwrap();
        zip_directory(&root, &dir.path().join("b.zip")).unwrap();

        assert_eq!(
            fs::read(dir.path().join("a.zip")).unwrap(),
            fs::read(dir.path().join("b.zip")).unwrap()
        );
    }
}
