//! Per-format resolution of internal cross-document references.

use std::path::Path;

use crate::address::normalize;

/// Rewrites an internal reference `(target, fragment)` into a concrete
/// address for one output format.
///
/// Resolvers are invoked once per wikilink while a document is parsed and may
/// be called from many documents rendering in parallel.
pub trait LinkResolver: Sync {
    fn resolve(&self, target: &str, fragment: &str) -> String;
}

/// Resolves references to `.html` pages, keeping fragments.
#[derive(Debug, Default, Copy, Clone)]
pub struct WebLinks;

/// Resolves references to `.gmi` pages. Gemtext has no anchors, so fragments
/// are dropped.
#[derive(Debug, Default, Copy, Clone)]
pub struct GeminiLinks;

impl LinkResolver for WebLinks {
    fn resolve(&self, target: &str, fragment: &str) -> String {
        let mut dest = String::with_capacity(target.len() + fragment.len() + 6);
        if !target.is_empty() {
            dest.push_str(&normalize(target));
            if Path::new(target).extension().is_none() {
                dest.push_str(".html");
            }
        }

        if !fragment.is_empty() {
            dest.push('#');
            dest.push_str(fragment);
        }

        dest
    }
}

impl LinkResolver for GeminiLinks {
    fn resolve(&self, target: &str, _: &str) -> String {
        if target.is_empty() {
            return String::new();
        }

        format!("{}.gmi", normalize(target))
    }
}

/// Splits a wikilink destination like `Page Name#section` into its target and
/// fragment.
pub fn split_fragment(dest: &str) -> (&str, &str) {
    dest.split_once('#').unwrap_or((dest, ""))
}
