use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::address::Address;
use crate::config::{Config, StreamConfig};
use crate::error::{Chainable, Result};
use crate::util::is_markdown;

/// A directory of documents rendered into one place in every output root:
/// the root collection, or a stream rendered into `<root>/<slug>/`.
#[derive(Debug, Clone, Copy)]
pub struct Collection<'c> {
    pub dir: &'c Path,
    pub stream: Option<&'c StreamConfig>,
}

impl<'c> Collection<'c> {
    /// The root collection followed by one collection per stream.
    pub fn all(config: &'c Config) -> Vec<Collection<'c>> {
        let root = Collection { dir: &config.content.dir, stream: None };
        let streams = config.streams.iter()
            .map(|stream| Collection { dir: &stream.content_dir, stream: Some(stream) });

        std::iter::once(root).chain(streams).collect()
    }

    /// The collection whose directory directly contains `path`, if any.
    pub fn containing(config: &'c Config, path: &Path) -> Option<Collection<'c>> {
        Self::all(config).into_iter()
            .find(|c| crate::util::same_dir(path.parent(), c.dir))
    }

    /// The directory inside an output root this collection renders into.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        match self.stream {
            Some(stream) => root.join(&stream.slug),
            None => root.to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        self.stream.map_or("root", |s| &s.name)
    }

    /// Lists the markdown documents directly inside the collection directory,
    /// sorted by file name.
    ///
    /// Failing to read the directory itself is an error. Entries that can't
    /// be inspected are returned as errors alongside the documents, in no
    /// particular position.
    pub fn discover(&self) -> Result<Vec<Result<PathBuf>>> {
        let entries = fs::read_dir(self.dir).chain_with(|| error! {
            "failed to read content directory",
            "collection" => self.name(),
            "directory" => self.dir.display(),
        })?;

        let mut documents = vec![];
        let mut errors = vec![];
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    errors.push(Err(e.into()));
                    continue;
                }
            };

            let path = entry.path();
            match entry.file_type() {
                Ok(kind) if kind.is_dir() || !is_markdown(&path) => continue,
                Ok(_) => documents.push(path),
                Err(e) => errors.push(Err(e).chain(error!("failed to inspect entry", "path" => path.display()))),
            }
        }

        documents.sort();
        Ok(documents.into_iter().map(Ok).chain(errors).collect())
    }
}

/// Drops documents whose address repeats an earlier document's, returning
/// the survivors with their addresses.
pub fn dedup_addresses(collection: &Collection<'_>, paths: Vec<PathBuf>) -> Vec<(Address, PathBuf)> {
    let mut seen: FxHashMap<Address, PathBuf> = FxHashMap::default();
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let address = Address::of_path(&path);
        if let Some(first) = seen.get(&address) {
            tracing::warn!(
                collection = collection.name(),
                %address,
                kept = %first.display(),
                skipped = %path.display(),
                "documents share an address; skipping the later one"
            );

            continue;
        }

        seen.insert(address.clone(), path.clone());
        documents.push((address, path));
    }

    documents
}
