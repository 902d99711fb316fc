#![doc = svgbobdoc::transform!(
//! A content build pipeline that renders one directory of markdown into two
//! independent sites: HTML for the web and gemtext for Gemini.
//!
//! # Overview
//!
//! Every document is rendered once per enabled output format. Each format
//! has its own page templates, its own output root, and its own way of
//! addressing other documents:
//!
//! ```svgbob
//!                        +----------------+
//!                        | content/*.md   |
//!                        +-------+--------+
//!                                |
//!              +-----------------+-----------------+
//!              |                                   |
//!      +-------+-------+                   +-------+-------+
//!      |  web target   |                   | gemini target |
//!      | [[a b]] ->    |                   | [[a b]] ->    |
//!      |   a-b.html    |                   |   a-b.gmi     |
//!      +-------+-------+                   +-------+-------+
//!              |                                   |
//!      +-------+-------+                   +-------+-------+
//!      | templates/web |                   | templates/gmi |
//!      +-------+-------+                   +-------+-------+
//!              |                                   |
//!      +-------+-------+                   +-------+-------+
//!      | public/web    |                   | public/gemini |
//!      +---------------+                   +---------------+
//! ```
//!
//! ## Rendering
//!
//! A full build proceeds as follows:
//!
//! 1. Each target's output is staged in a fresh directory beside its output
//!    root, seeded with the target's static assets.
//! 2. The content directory and every stream directory are listed. Each
//!    markdown document is given an [address](address::normalize) derived
//!    from its file name.
//! 3. Every document is rendered for every target, in parallel:
//!    - Front matter is split off and exposed to templates as `meta`.
//!    - Wikilinks are rewritten by the target's [link resolver](link).
//!    - The first level-1 heading becomes the title.
//!    - The body is serialized as HTML or gemtext and passed through the
//!      target's page template from its [template cache](template).
//! 4. The staged trees replace the live output roots.
//!
//! A document that fails to render is reported and skipped. The rest of the
//! build carries on. See [`build::Builder`] for single-document rebuilds and
//! change events.
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod address;
pub mod link;
pub mod config;
pub mod target;
pub mod template;
pub mod markdown;
pub mod render;
pub mod build;

pub use address::{normalize, Address};
pub use build::{Builder, BuildReport, ChangeEvent, ChangeKind, Phase};
pub use config::Config;
pub use target::{Format, Target};
