use std::sync::{Mutex, MutexGuard};

use indexmap::IndexSet;

use crate::layout::STYLES;

/// Per-book, insertion-ordered set of stylesheet urls. The k-th distinct url
/// lives at `Styles/Style{k:02}.css`.
#[derive(Debug, Default)]
pub struct StylesheetRegistry {
    urls: Mutex<IndexSet<String>>,
}

impl StylesheetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexSet<String>> {
        // A panicking worker cannot leave the set half-updated
        self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the index of `url`, registering it if it is new.
    pub fn register(&self, url: &str) -> usize {
        let mut urls = self.lock();
        match urls.get_index_of(url) {
            Some(idx) => idx,
            None => urls.insert_full(url.to_string()).0,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of `(index, url)` pairs in registration order.
    pub fn entries(&self) -> Vec<(usize, String)> {
        self.lock().iter().cloned().enumerate().collect()
    }

    pub fn file_name(idx: usize) -> String {
        format!("Style{:02}.css", idx)
    }

    /// Path of the stylesheet relative to OEBPS.
    pub fn href(idx: usize) -> String {
        format!("{}/{}", STYLES, Self::file_name(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_urls_share_an_index() {
        let registry = StylesheetRegistry::new();
        let indices: Vec<usize> = ["A", "B", "A", "C"]
            .iter()
            .map(|url| registry.register(url))
            .collect();

        assert_eq!(indices, vec![0, 1, 0, 2]);
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.entries(),
            vec![(0, "A".to_string()), (1, "B".to_string()), (2, "C".to_string())]
        );
    }

    #[test]
    fn hrefs_are_zero_padded() {
        assert_eq!(StylesheetRegistry::href(0), "Styles/Style00.css");
        assert_eq!(StylesheetRegistry::href(12), "Styles/Style12.css");
    }

    #[test]
    fn concurrent_registration_is_consistent() {
        let registry = StylesheetRegistry::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for i in 0..50 {
                        registry.register(&format!("https://x.example/{}.css", i));
                    }
                });
            }
        });

        assert_eq!(registry.len(), 50);
        let first = registry.register("https://x.example/0.css");
        assert!(first < 50);
    }
}
