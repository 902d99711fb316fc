//! The template cache: page templates plus shared partials, compiled into
//! immutable generations that are swapped in atomically.
//!
//! A template directory holds page templates (`page.tmpl`, addressed as
//! `page`) and partials (`_nav.tmpl`, addressed by file name from `include`
//! and `extends`). Every page is compiled together with every partial into a
//! single [`TemplateSet`]. Loading builds a complete new set before it is
//! installed, so a failed reload leaves the previous set serving.
//!
//! Lookups hand out an `Arc` of the installed set; a render that started
//! against one generation finishes against it even if a reload lands midway.

mod ext;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::error::{Chainable, Result};

/// File suffix of every template file.
pub const TEMPLATE_SUFFIX: &str = ".tmpl";

/// File name prefix marking a template file as a partial.
pub const PARTIAL_PREFIX: &str = "_";

/// How rendered values are escaped.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Escape {
    Html,
    None,
}

#[derive(Debug, Copy, Clone)]
pub struct CacheOptions {
    /// Check the template directory for changes on every lookup.
    pub hot_reload: bool,
    pub escape: Escape,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions { hot_reload: false, escape: Escape::Html }
    }
}

pub struct TemplateCache {
    dir: PathBuf,
    options: CacheOptions,
    current: RwLock<Arc<TemplateSet>>,
}

/// One fully loaded generation of templates.
pub struct TemplateSet {
    env: Environment<'static>,
    pages: Vec<String>,
    stamps: FxHashMap<PathBuf, SystemTime>,
    generation: u64,
}

/// A page template from one specific generation.
#[derive(Clone)]
pub struct Template {
    set: Arc<TemplateSet>,
    name: String,
}

struct Scan {
    pages: Vec<(String, PathBuf)>,
    partials: Vec<(String, PathBuf)>,
    stamps: FxHashMap<PathBuf, SystemTime>,
}

impl TemplateCache {
    /// Creates an empty cache for `dir`. Nothing is read until [`load()`].
    ///
    /// [`load()`]: TemplateCache::load
    pub fn new<P: AsRef<Path>>(dir: P, options: CacheOptions) -> Self {
        let empty = TemplateSet {
            env: environment(options.escape),
            pages: vec![],
            stamps: FxHashMap::default(),
            generation: 0,
        };

        TemplateCache {
            dir: dir.as_ref().to_path_buf(),
            options,
            current: RwLock::new(Arc::new(empty)),
        }
    }

    /// Creates a cache for `dir` and loads it.
    pub fn open<P: AsRef<Path>>(dir: P, options: CacheOptions) -> Result<Self> {
        let cache = Self::new(dir, options);
        cache.load()?;
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Scans the template directory, compiles a new generation, and installs
    /// it. Readers block until the new generation is in place. On error the
    /// previous generation is left untouched.
    pub fn load(&self) -> Result<()> {
        let mut current = self.current.write();
        let next = self.compile(current.generation + 1)?;
        tracing::debug!(
            dir = %self.dir.display(),
            generation = next.generation,
            pages = next.pages.len(),
            "loaded templates"
        );

        *current = Arc::new(next);
        Ok(())
    }

    /// Looks up the page template `name`.
    ///
    /// With hot reload enabled, a change on disk since the last load triggers
    /// a synchronous reload first. Concurrent callers that see the same change
    /// reload it once.
    pub fn get(&self, name: &str) -> Result<Option<Template>> {
        let mut set = self.current.read().clone();
        if self.options.hot_reload && set.is_stale(&self.dir)? {
            let mut current = self.current.write();
            if Arc::ptr_eq(&*current, &set) || current.is_stale(&self.dir)? {
                let next = self.compile(current.generation + 1)?;
                tracing::debug!(
                    dir = %self.dir.display(),
                    generation = next.generation,
                    "templates changed on disk; reloaded"
                );

                *current = Arc::new(next);
            }

            set = current.clone();
        }

        Ok(set.has_page(name).then(|| Template { set, name: name.to_string() }))
    }

    /// Renders the page template `name` with `context`.
    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String> {
        match self.get(name)? {
            Some(template) => template.render(context),
            None => err! {
                kind = TemplateNotFound, "template not found",
                "template" => name,
                "template directory" => self.dir.display(),
            }
        }
    }

    /// The generation number of the installed set, starting at `1` after the
    /// first successful load.
    pub fn generation(&self) -> u64 {
        self.current.read().generation
    }

    /// Names of the page templates in the installed generation.
    pub fn pages(&self) -> Vec<String> {
        self.current.read().pages.clone()
    }

    fn scan(&self) -> Result<Scan> {
        let entries = fs::read_dir(&self.dir).chain_with(|| error! {
            "failed to read template directory",
            "directory" => self.dir.display(),
        })?;

        let mut scan = Scan {
            pages: vec![],
            partials: vec![],
            stamps: FxHashMap::default(),
        };

        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = file_name.strip_suffix(TEMPLATE_SUFFIX).map(str::to_string) else {
                continue;
            };

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let path = entry.path();
            scan.stamps.insert(path.clone(), metadata.modified()?);
            if file_name.starts_with(PARTIAL_PREFIX) {
                scan.partials.push((file_name, path));
            } else {
                scan.pages.push((stem, path));
            }
        }

        scan.pages.sort();
        scan.partials.sort();
        Ok(scan)
    }

    fn compile(&self, generation: u64) -> Result<TemplateSet> {
        let scan = self.scan()?;
        let mut env = environment(self.options.escape);
        for (name, path) in scan.partials.iter().chain(&scan.pages) {
            let source = fs::read_to_string(path).chain_with(|| error! {
                "failed to read template",
                "path" => path.display(),
            })?;

            env.add_template_owned(name.clone(), source).chain_with(|| error! {
                "failed to compile template",
                "path" => path.display(),
            })?;
        }

        Ok(TemplateSet {
            env,
            pages: scan.pages.into_iter().map(|(name, _)| name).collect(),
            stamps: scan.stamps,
            generation,
        })
    }
}

impl TemplateSet {
    fn has_page(&self, name: &str) -> bool {
        self.pages.iter().any(|page| page == name)
    }

    /// Returns `true` if a template file in `dir` was added, removed, or
    /// modified after this set was loaded.
    fn is_stale(&self, dir: &Path) -> Result<bool> {
        let mut seen = 0;
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_name().to_string_lossy().ends_with(TEMPLATE_SUFFIX) {
                continue;
            }

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            match self.stamps.get(&entry.path()) {
                Some(stamp) if metadata.modified()? <= *stamp => seen += 1,
                _ => return Ok(true),
            }
        }

        Ok(seen != self.stamps.len())
    }
}

impl Template {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The generation this template was compiled in.
    pub fn generation(&self) -> u64 {
        self.set.generation
    }

    pub fn render<S: Serialize>(&self, context: S) -> Result<String> {
        let template = self.set.env.get_template(&self.name)?;
        template.render(context).chain_with(|| error! {
            "failed to render template",
            "template" => &self.name,
        })
    }
}

fn environment(escape: Escape) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(move |_| match escape {
        Escape::Html => AutoEscape::Html,
        Escape::None => AutoEscape::None,
    });

    env.add_filter("normalize", ext::normalize);
    env.add_filter("deslug", ext::deslug);
    env.add_filter("split", ext::split);
    env
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("dir", &self.dir)
            .field("options", &self.options)
            .field("generation", &self.generation())
            .finish()
    }
}
