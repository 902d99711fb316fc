//! The build orchestrator: staging, rendering, swapping, and change events.
//!
//! A full build moves through [`Phase`]s:
//!
//! ```text
//! Idle -> Staging -> Rendering -> Done
//!            |           |
//!            +-----------+------> Failed
//! ```
//!
//! Output is never written into a live root during a full build. Each target
//! renders into a staging directory beside its output root, and the staged
//! tree replaces the live one by rename once rendering finishes. A failed
//! document is reported and skipped; a failure to stage, discover, or swap
//! fails the whole pass and leaves the live roots as they were.

mod discover;

pub use discover::Collection;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::address::Address;
use crate::config::Config;
use crate::error::{Chainable, Error, Result};
use crate::markdown::SyntaxHighlight;
use crate::render::{self, Site, SourceDocument};
use crate::target::{Format, Target};
use crate::template::TEMPLATE_SUFFIX;
use crate::util;

use discover::dedup_addresses;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Staging,
    Rendering,
    Done,
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Other,
}

/// A filesystem change reported by a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// A (document, format) pair that failed to render or write.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub format: Format,
    pub error: Error,
}

/// The outcome of a pass that ran to completion.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Output files written, in live-root terms.
    pub written: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

impl BuildReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: &Path, format: Format, outcome: Result<PathBuf>) {
        match outcome {
            Ok(written) => self.written.push(written),
            Err(error) => {
                tracing::error!(path = %path.display(), %format, "failed to build document:\n{error}");
                self.failures.push(Failure { path: path.to_path_buf(), format, error });
            }
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} files written, {} failed", self.written.len(), self.failures.len())
    }
}

impl ChangeEvent {
    pub fn new<P: Into<PathBuf>>(path: P, kind: ChangeKind) -> Self {
        ChangeEvent { path: path.into(), kind }
    }
}

/// Drives builds for every enabled output target.
#[derive(Debug)]
pub struct Builder {
    config: Config,
    targets: Vec<Target>,
    phase: Phase,
}

/// One staged output root: where the target at `index` renders before the
/// swap.
struct Stage {
    index: usize,
    dir: PathBuf,
}

impl Builder {
    /// Opens every enabled target and loads its templates.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let targets = config.targets()
            .map(|(format, settings)| Target::open(format, settings.clone()).chain_with(|| error! {
                "failed to load templates",
                "format" => format,
            }))
            .collect::<Result<Vec<_>>>()?;

        if targets.iter().any(|t| t.format == Format::Web) {
            SyntaxHighlight::warm_up();
        }

        Ok(Builder { config, targets, phase: Phase::Idle })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, format: Format) -> Option<&Target> {
        self.targets.iter().find(|t| t.format == format)
    }

    /// The phase of the most recent pass.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Directories whose changes should be fed to [`Builder::handle()`]: the
    /// content and stream directories and every template directory.
    pub fn watch_dirs(&self) -> Vec<&Path> {
        let content = Collection::all(&self.config).into_iter().map(|c| c.dir);
        let templates = self.targets.iter().map(|t| t.templates.dir());
        content.chain(templates).collect()
    }

    /// Rebuilds every document for every target and swaps the results in.
    ///
    /// Returns an error only when the pass as a whole fails. Documents that
    /// fail to render are listed in the report.
    pub fn build_all(&mut self) -> Result<BuildReport> {
        let _span = tracing::info_span!("build").entered();
        let start = Instant::now();

        self.phase = Phase::Staging;
        let stages = match util::time!("staging", self.stage()) {
            Ok(stages) => stages,
            Err(e) => return Err(self.fail(e)),
        };

        self.phase = Phase::Rendering;
        let result = util::time!("rendering", self.render_all(&stages))
            .and_then(|report| self.swap(&stages).map(|_| report));

        match result {
            Ok(report) => {
                self.phase = Phase::Done;
                tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "build finished: {report}");
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Rebuilds the single document at `path` for every target, writing into
    /// the live output roots.
    pub fn build_file<P: AsRef<Path>>(&mut self, path: P) -> Result<BuildReport> {
        let path = path.as_ref();
        let _span = tracing::info_span!("build", path = %path.display()).entered();
        if !util::is_markdown(path) {
            return err!("not a markdown document", "path" => path.display());
        }

        let Some(collection) = Collection::containing(&self.config, path) else {
            return err!("document is not in a content directory", "path" => path.display());
        };

        let mut report = BuildReport::default();
        if let Some(kept) = shadowed_by(&collection, path)? {
            tracing::warn!(
                kept = %kept.display(),
                skipped = %path.display(),
                "documents share an address; skipping the later one"
            );

            return Ok(report);
        }

        self.phase = Phase::Rendering;
        let site = Site { name: &self.config.site_name, stream: collection.stream };
        match SourceDocument::read(path) {
            Ok(doc) => for target in &self.targets {
                let outcome = render::render(&doc, target, site).and_then(|rendered| {
                    let out = collection.output_dir(target.output_root()).join(&rendered.file_name);
                    util::write_atomic(&out, &rendered.bytes)?;
                    tracing::info!(path = %out.display(), "wrote");
                    Ok(out)
                });

                report.record(path, target.format, outcome);
            },
            Err(e) => for target in &self.targets {
                report.record(path, target.format, Err(e.clone()));
            },
        }

        self.phase = Phase::Done;
        Ok(report)
    }

    /// Reloads the templates of the `format` target.
    pub fn reload_templates(&self, format: Format) -> Result<()> {
        match self.target(format) {
            Some(target) => target.templates.load(),
            None => err!(kind = Config, "output format is not enabled", "format" => format),
        }
    }

    /// Dispatches a change event: a modified template reloads its target's
    /// templates and rebuilds everything, and a modified document is rebuilt
    /// on its own. Returns `None` when the event is ignored.
    pub fn handle(&mut self, event: &ChangeEvent) -> Result<Option<BuildReport>> {
        if event.kind != ChangeKind::Modified {
            return Ok(None);
        }

        let path = &event.path;
        let is_template = path.file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(TEMPLATE_SUFFIX));

        if is_template {
            let owners: Vec<_> = self.targets.iter().filter(|t| t.owns_template(path)).collect();
            let reload = if owners.is_empty() { self.targets.iter().collect() } else { owners };
            for target in reload {
                tracing::info!(format = %target.format, template = %path.display(), "reloading templates");
                target.templates.load()?;
            }

            return self.build_all().map(Some);
        }

        if util::is_markdown(path) {
            return self.build_file(path).map(Some);
        }

        Ok(None)
    }

    fn fail(&mut self, error: Error) -> Error {
        self.phase = Phase::Failed;
        for target in &self.targets {
            let (staging, _) = target.staging_dirs();
            if let Err(e) = util::remove_if_exists(&staging) {
                tracing::warn!("failed to clean up staging directory:\n{e}");
            }
        }

        error
    }

    /// Recreates each target's staging directory with its assets and one
    /// subdirectory per stream.
    fn stage(&self) -> Result<Vec<Stage>> {
        let mut stages = Vec::with_capacity(self.targets.len());
        for (index, target) in self.targets.iter().enumerate() {
            let (dir, _) = target.staging_dirs();
            util::purge_dir(&dir).chain_with(|| error! {
                "failed to prepare staging directory",
                "format" => target.format,
            })?;

            for assets in &target.settings.assets {
                let copied = util::copy_dir(assets, &dir).chain_with(|| error! {
                    "failed to copy static assets",
                    "format" => target.format,
                    "assets" => assets.display(),
                })?;

                tracing::debug!(format = %target.format, assets = %assets.display(), copied, "copied assets");
            }

            for stream in &self.config.streams {
                let stream_dir = dir.join(&stream.slug);
                fs::create_dir_all(&stream_dir).chain_with(|| error! {
                    "failed to create stream directory",
                    "stream" => &stream.name,
                    "path" => stream_dir.display(),
                })?;
            }

            tracing::info!(format = %target.format, staging = %dir.display(), "staged output");
            stages.push(Stage { index, dir });
        }

        Ok(stages)
    }

    fn render_all(&self, stages: &[Stage]) -> Result<BuildReport> {
        let mut jobs = vec![];
        for collection in Collection::all(&self.config) {
            let mut paths = vec![];
            for entry in collection.discover()? {
                match entry {
                    Ok(path) => paths.push(path),
                    Err(e) => tracing::warn!(collection = collection.name(), "skipping entry:\n{e}"),
                }
            }

            let documents = dedup_addresses(&collection, paths);
            tracing::info!(collection = collection.name(), documents = documents.len(), "discovered");
            jobs.extend(documents.into_iter().map(|(_, path)| (collection, path)));
        }

        let site_name = self.config.site_name.as_str();
        let targets = &self.targets;
        let outcomes: Vec<_> = jobs.par_iter()
            .map(|(collection, path)| {
                let site = Site { name: site_name, stream: collection.stream };
                let doc = SourceDocument::read(path);
                let outcomes: Vec<_> = stages.iter()
                    .map(|stage| -> Result<PathBuf> {
                        let target = &targets[stage.index];
                        let doc = doc.as_ref().map_err(Clone::clone)?;
                        let rendered = render::render(doc, target, site)?;
                        let staged = collection.output_dir(&stage.dir).join(&rendered.file_name);
                        fs::write(&staged, &rendered.bytes).chain_with(|| error! {
                            "failed to write output",
                            "path" => staged.display(),
                        })?;

                        let live = collection.output_dir(target.output_root())
                            .join(&rendered.file_name);

                        tracing::info!(path = %live.display(), "wrote");
                        Ok(live)
                    })
                    .collect();

                (path, outcomes)
            })
            .collect();

        let mut report = BuildReport::default();
        for (path, outcomes) in outcomes {
            for (stage, outcome) in stages.iter().zip(outcomes) {
                report.record(path, self.targets[stage.index].format, outcome);
            }
        }

        Ok(report)
    }

    /// Replaces each live output root with its staged tree. A failed swap
    /// moves the previous tree back into place.
    fn swap(&self, stages: &[Stage]) -> Result<()> {
        for stage in stages {
            let target = &self.targets[stage.index];
            let root = target.output_root();
            let (_, retired) = target.staging_dirs();
            util::remove_if_exists(&retired)?;

            let had_root = root.exists();
            if had_root {
                fs::rename(root, &retired).chain_with(|| error! {
                    "failed to move the live output aside",
                    "root" => root.display(),
                })?;
            }

            if let Err(e) = fs::rename(&stage.dir, root) {
                let error = Error::from(e).chain(error! {
                    "failed to swap in the staged output",
                    "root" => root.display(),
                    "staging" => stage.dir.display(),
                });

                if had_root {
                    if let Err(restore_error) = restore(&retired, root) {
                        return Err(error.chain(restore_error));
                    }
                }

                return Err(error);
            }

            if let Err(e) = util::remove_if_exists(&retired) {
                tracing::warn!("failed to remove the retired output:\n{e}");
            }

            tracing::info!(format = %target.format, root = %root.display(), "swapped in new output");
        }

        Ok(())
    }
}

/// The document that owns `path`'s address in `collection`, when that isn't
/// `path` itself. Full builds keep the first document by name, and so does
/// this.
fn shadowed_by(collection: &Collection<'_>, path: &Path) -> Result<Option<PathBuf>> {
    let address = Address::of_path(path);
    let paths = collection.discover()?.into_iter().filter_map(Result::ok).collect();
    let kept = dedup_addresses(collection, paths).into_iter()
        .find(|(other, _)| *other == address)
        .map(|(_, kept)| kept);

    Ok(kept.filter(|kept| kept.file_name() != path.file_name()))
}

fn restore(retired: &Path, root: &Path) -> Result<()> {
    fs::rename(retired, root)
        .chain_with(|| error! {
            "failed to restore the previous output",
            "root" => root.display(),
            "retired" => retired.display(),
        })
        .inspect_err(|e| tracing::error!("live output is missing:\n{e}"))
}
