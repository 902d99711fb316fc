use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::TargetConfig;
use crate::error::Result;
use crate::link::{GeminiLinks, LinkResolver, WebLinks};
use crate::template::{CacheOptions, Escape, TemplateCache};

/// One of the closed set of output formats.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Web,
    Gemini,
}

impl Format {
    pub fn name(self) -> &'static str {
        match self {
            Format::Web => "web",
            Format::Gemini => "gemini",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Format::Web => ".html",
            Format::Gemini => ".gmi",
        }
    }

    pub fn resolver(self) -> &'static dyn LinkResolver {
        match self {
            Format::Web => &WebLinks,
            Format::Gemini => &GeminiLinks,
        }
    }

    fn escape(self) -> Escape {
        match self {
            Format::Web => Escape::Html,
            Format::Gemini => Escape::None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

/// An enabled output format with its settings and its template cache.
#[derive(Debug)]
pub struct Target {
    pub format: Format,
    pub settings: TargetConfig,
    pub templates: TemplateCache,
}

impl Target {
    /// Creates the target and loads its templates.
    pub fn open(format: Format, settings: TargetConfig) -> Result<Self> {
        let options = CacheOptions {
            hot_reload: settings.hot_reload,
            escape: format.escape(),
        };

        let templates = TemplateCache::open(&settings.template_dir, options)?;
        Ok(Target { format, settings, templates })
    }

    pub fn output_root(&self) -> &Path {
        &self.settings.output_dir
    }

    /// The page template every document of this target renders through.
    pub fn page_template(&self) -> &str {
        &self.settings.page_template
    }

    pub fn footer(&self) -> Option<&str> {
        self.settings.footer.as_deref()
    }

    /// Returns `true` if `path` lives directly in this target's template
    /// directory.
    pub fn owns_template(&self, path: &Path) -> bool {
        crate::util::same_dir(path.parent(), &self.settings.template_dir)
    }

    /// Sibling directories used while staging a full build.
    pub(crate) fn staging_dirs(&self) -> (PathBuf, PathBuf) {
        let root = self.output_root();
        (crate::util::sibling(root, "staging"), crate::util::sibling(root, "retired"))
    }
}
