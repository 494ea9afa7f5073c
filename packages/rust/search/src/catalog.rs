//! Per-language read interface over the built artifacts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use docweave_shared::{
    Chapter, DocweaveError, Result, SearchHit, chapters_artifact, search_index_artifact,
};

use crate::{SearchIndex, SearchOptions};

const CHAPTERS: &str = "chapters";
const SEARCH_INDEX: &str = "search index";

/// Loaded artifacts for every requested language.
///
/// A language whose artifact is missing or unreadable stays in the catalog
/// with that feature marked unavailable; lookups for it return
/// [`DocweaveError::Unavailable`].
#[derive(Debug, Default)]
pub struct Catalog {
    dir: PathBuf,
    chapters: BTreeMap<String, Arc<Vec<Chapter>>>,
    indexes: BTreeMap<String, Arc<SearchIndex>>,
}

impl Catalog {
    /// Load `chapters-{lang}.json` and `search-index-{lang}.json` for each
    /// language from `dir`.
    #[instrument(skip_all, fields(dir = %dir.display(), languages = languages.len()))]
    pub fn load<S: AsRef<str>>(dir: &Path, languages: &[S], options: &SearchOptions) -> Self {
        let mut catalog = Self {
            dir: dir.to_path_buf(),
            ..Self::default()
        };

        for lang in languages {
            let lang: &str = lang.as_ref();
            match read_chapters(dir, lang) {
                Ok(tree) => {
                    catalog.chapters.insert(lang.to_string(), Arc::new(tree));
                }
                Err(e) => warn!(%lang, error = %e, "chapters unavailable"),
            }
            match read_index(dir, lang, options) {
                Ok(index) => {
                    catalog.indexes.insert(lang.to_string(), Arc::new(index));
                }
                Err(e) => warn!(%lang, error = %e, "search index unavailable"),
            }
        }

        info!(
            chapters = catalog.chapters.len(),
            indexes = catalog.indexes.len(),
            "catalog loaded"
        );
        catalog
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Languages with a loaded content tree.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.chapters.keys().map(String::as_str)
    }

    /// The content tree for `lang`.
    pub fn list_chapters(&self, lang: &str) -> Result<Arc<Vec<Chapter>>> {
        self.chapters
            .get(lang)
            .cloned()
            .ok_or_else(|| DocweaveError::unavailable(lang, CHAPTERS))
    }

    /// The search index for `lang`, shared for debounced use.
    pub fn index(&self, lang: &str) -> Result<Arc<SearchIndex>> {
        self.indexes
            .get(lang)
            .cloned()
            .ok_or_else(|| DocweaveError::unavailable(lang, SEARCH_INDEX))
    }

    /// Ranked hits for `query` in `lang`.
    pub fn search(&self, query: &str, lang: &str) -> Result<Vec<SearchHit>> {
        Ok(self.index(lang)?.search(query))
    }
}

fn read_chapters(dir: &Path, lang: &str) -> Result<Vec<Chapter>> {
    let path = dir.join(chapters_artifact(lang));
    let content = std::fs::read_to_string(&path).map_err(|e| DocweaveError::io(&path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| DocweaveError::parse(format!("invalid {}: {e}", path.display())))
}

fn read_index(dir: &Path, lang: &str, options: &SearchOptions) -> Result<SearchIndex> {
    let path = dir.join(search_index_artifact(lang));
    let content = std::fs::read_to_string(&path).map_err(|e| DocweaveError::io(&path, e))?;
    SearchIndex::from_json(&content, options.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::entry;

    fn write_language(dir: &Path, lang: &str) {
        let chapters = vec![Chapter {
            id: "chapter-1".into(),
            number: "1".into(),
            title: "Basics".into(),
            slug: "chapter-1-basics".into(),
            blocks: vec![],
            sections: vec![],
        }];
        std::fs::write(
            dir.join(chapters_artifact(lang)),
            serde_json::to_string(&chapters).unwrap(),
        )
        .unwrap();
        let index = vec![entry("1-1-intro", "1.1 Intro", "Hello from the repository")];
        std::fs::write(
            dir.join(search_index_artifact(lang)),
            serde_json::to_string(&index).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn loaded_language_serves_chapters_and_search() {
        let tmp = tempfile::tempdir().unwrap();
        write_language(tmp.path(), "en");

        let catalog = Catalog::load(tmp.path(), &["en"], &SearchOptions::default());
        assert_eq!(catalog.list_chapters("en").unwrap().len(), 1);

        let hits = catalog.search("repository", "en").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].snippet.contains("<mark"));
        assert_eq!(catalog.languages().collect::<Vec<_>>(), vec!["en"]);
    }

    #[test]
    fn missing_language_is_unavailable_not_a_panic() {
        let tmp = tempfile::tempdir().unwrap();
        write_language(tmp.path(), "en");

        let catalog = Catalog::load(tmp.path(), &["en", "ko"], &SearchOptions::default());
        let err = catalog.list_chapters("ko").unwrap_err();
        assert!(err.is_unavailable());
        assert!(catalog.search("hello", "ko").unwrap_err().is_unavailable());
        assert!(catalog.index("fr").unwrap_err().is_unavailable());
    }

    #[test]
    fn corrupt_index_marks_only_search_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        write_language(tmp.path(), "en");
        std::fs::write(tmp.path().join(search_index_artifact("en")), "not json").unwrap();

        let catalog = Catalog::load(tmp.path(), &["en"], &SearchOptions::default());
        assert!(catalog.list_chapters("en").is_ok());
        assert!(catalog.search("hello", "en").unwrap_err().is_unavailable());
    }
}
