use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::address::normalize;
use crate::error::{Chainable, Result};
use crate::target::Format;

/// The default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "config.toml";

/// A validated build configuration.
///
/// Construct with [`Config::read()`] or [`Config::parse()`], both of which
/// resolve relative paths and run [`Config::validate()`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub site_name: String,
    pub content: ContentConfig,
    #[serde(default)]
    pub web: Option<TargetConfig>,
    #[serde(default)]
    pub gemini: Option<TargetConfig>,
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub template_dir: PathBuf,
    pub page_template: String,
    pub output_dir: PathBuf,
    /// Directories whose contents are copied verbatim into the output root.
    #[serde(default)]
    pub assets: Vec<PathBuf>,
    /// Markdown appended to every document's source before rendering.
    #[serde(default)]
    pub footer: Option<String>,
    /// Reload templates whenever a file in `template_dir` changes on disk.
    #[serde(default)]
    pub hot_reload: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    pub slug: String,
    pub content_dir: PathBuf,
}

fn enabled() -> bool {
    true
}

impl Config {
    /// Reads, resolves, and validates the configuration at `path`. Relative
    /// paths are taken relative to the file's directory.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let string = fs::read_to_string(path).chain_with(|| error! {
            kind = Config, "failed to read configuration file",
            "path" => path.display(),
        })?;

        let base = path.parent().unwrap_or(Path::new(""));
        Config::parse(&string, base).chain_with(|| error! {
            "invalid configuration file",
            "path" => path.display(),
        })
    }

    /// Parses a TOML configuration, resolving relative paths against `base`.
    pub fn parse(string: &str, base: &Path) -> Result<Self> {
        let mut config: Config = toml::from_str(string)
            .map_err(|e| crate::error::Error::from(e).with_kind(crate::error::ErrorKind::Config))?;

        config.resolve(base);
        config.validate()?;
        Ok(config)
    }

    fn resolve(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| if path.is_relative() {
            *path = base.join(&*path);
        };

        resolve(&mut self.content.dir);
        for stream in &mut self.streams {
            resolve(&mut stream.content_dir);
        }

        for target in self.web.iter_mut().chain(self.gemini.iter_mut()) {
            resolve(&mut target.template_dir);
            resolve(&mut target.output_dir);
            target.assets.iter_mut().for_each(resolve);
        }
    }

    /// Checks the invariants the build relies on.
    pub fn validate(&self) -> Result<()> {
        if self.targets().next().is_none() {
            return err!(kind = Config, "no output format is enabled",
                "hint" => "enable at least one of [web] or [gemini]");
        }

        for (format, target) in self.targets() {
            if target.page_template.trim().is_empty() {
                return err!(kind = Config, "page template name is empty",
                    "format" => format);
            }
        }

        if let [(_, a), (_, b)] = self.targets().collect::<Vec<_>>()[..] {
            if a.output_dir == b.output_dir {
                return err!(kind = Config, "web and gemini share an output directory",
                    "output directory" => a.output_dir.display());
            }
        }

        let mut slugs = FxHashSet::default();
        let mut dirs = FxHashSet::default();
        dirs.insert(self.content.dir.as_path());
        for stream in &self.streams {
            if stream.slug.is_empty() {
                return err!(kind = Config, "stream slug is empty", "stream" => &stream.name);
            }

            if normalize(&stream.slug) != *stream.slug {
                return err!(kind = Config, "stream slug is not normalized",
                    "stream" => &stream.name,
                    "slug" => &stream.slug,
                    "expected" => normalize(&stream.slug));
            }

            if !slugs.insert(stream.slug.as_str()) {
                return err!(kind = Config, "duplicate stream slug", "slug" => &stream.slug);
            }

            if !dirs.insert(stream.content_dir.as_path()) {
                return err!(kind = Config, "stream content directory is already in use",
                    "stream" => &stream.name,
                    "directory" => stream.content_dir.display());
            }
        }

        Ok(())
    }

    /// The enabled output formats and their settings, web first.
    pub fn targets(&self) -> impl Iterator<Item = (Format, &TargetConfig)> {
        let web = self.web.as_ref().map(|t| (Format::Web, t));
        let gemini = self.gemini.as_ref().map(|t| (Format::Gemini, t));
        web.into_iter().chain(gemini).filter(|(_, t)| t.enabled)
    }
}
