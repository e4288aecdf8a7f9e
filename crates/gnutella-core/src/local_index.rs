//! The shared-file index `QueryResponder` matches incoming queries
//! against. The core consumes this interface; a real servent backs it with
//! its actual file scanner.

use gnutella_dtyp::Sha1Digest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub file_index: u32,
    pub name: String,
    pub size: u32,
    pub sha1: Option<Sha1Digest>,
}

pub trait LocalIndex {
    /// Exact match by SHA-1 urn.
    fn by_sha1(&self, sha1: &Sha1Digest) -> Option<&SharedFile>;

    /// Full-text match against a canonicalized query string: every
    /// word in `query` must appear as a substring of the shared file's
    /// (also canonicalized) name.
    fn by_text(&self, query: &str) -> Vec<&SharedFile>;
}

#[derive(Debug, Clone, Default)]
pub struct MemLocalIndex {
    files: Vec<SharedFile>,
}

impl MemLocalIndex {
    pub fn new() -> Self {
        MemLocalIndex::default()
    }

    pub fn add(&mut self, file: SharedFile) {
        self.files.push(file);
    }
}

impl LocalIndex for MemLocalIndex {
    fn by_sha1(&self, sha1: &Sha1Digest) -> Option<&SharedFile> {
        self.files.iter().find(|f| f.sha1.as_ref() == Some(sha1))
    }

    fn by_text(&self, query: &str) -> Vec<&SharedFile> {
        if query.is_empty() {
            return Vec::new();
        }
        let words: Vec<&str> = query.split_whitespace().collect();
        self.files
            .iter()
            .filter(|f| {
                let name = f.name.to_ascii_lowercase();
                words.iter().all(|w| name.contains(w))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> MemLocalIndex {
        let mut index = MemLocalIndex::new();
        index.add(SharedFile {
            file_index: 0,
            name: "moby dick.txt".to_string(),
            size: 8432,
            sha1: Some(Sha1Digest([0xAA; 20])),
        });
        index
    }

    #[test]
    fn finds_by_sha1() {
        let index = sample_index();
        assert!(index.by_sha1(&Sha1Digest([0xAA; 20])).is_some());
        assert!(index.by_sha1(&Sha1Digest([0xBB; 20])).is_none());
    }

    #[test]
    fn finds_by_all_words_present() {
        let index = sample_index();
        assert_eq!(index.by_text("moby dick").len(), 1);
        assert_eq!(index.by_text("moby nonexistent").len(), 0);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let index = sample_index();
        assert!(index.by_text("").is_empty());
    }
}
