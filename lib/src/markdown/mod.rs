//! Markdown parsing and the event plugins shared by every output format.

mod plugin;
mod wikilink;
mod linkify;
mod highlight;

pub mod front_matter;
pub mod title;
pub mod gemtext;

pub use plugin::Plugin;
pub use wikilink::WikiLinks;
pub use linkify::Linkify;
pub use highlight::SyntaxHighlight;

use pulldown_cmark::{html, Event, Options, Parser, TextMergeStream};

use crate::link::LinkResolver;

/// The markdown extensions enabled for every format.
pub fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_WIKILINKS
}

/// A markdown source ready to be parsed for one output format.
#[derive(Debug, Clone, Copy)]
pub struct Markdown<'s> {
    source: &'s str,
    options: Options,
}

impl<'s> Markdown<'s> {
    pub fn new(source: &'s str) -> Self {
        Markdown { source, options: options() }
    }

    /// Turns straight quotes, `--`, `---` and `...` into their typographic
    /// forms.
    pub fn typographic(mut self) -> Self {
        self.options |= Options::ENABLE_SMART_PUNCTUATION;
        self
    }

    /// Parses the source into events, resolving wikilinks with `resolver` and
    /// turning bare URLs into links.
    pub fn events<'r>(self, resolver: &'r dyn LinkResolver) -> impl Iterator<Item = Event<'s>> + 'r
        where 's: 'r
    {
        let events = TextMergeStream::new(Parser::new_ext(self.source, self.options));
        let events = WikiLinks::new(resolver).remap(events);
        Linkify.remap(events)
    }
}

/// Serializes `events` as HTML.
pub fn to_html<'e, I: Iterator<Item = Event<'e>>>(events: I) -> String {
    let mut out = String::new();
    html::push_html(&mut out, events);
    out
}
