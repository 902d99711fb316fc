use pulldown_cmark::{CowStr, Event, LinkType, Tag};

use crate::link::{split_fragment, LinkResolver};

/// Rewrites the destination of every `[[Target#fragment|label]]` wikilink
/// through a format's [`LinkResolver`]. Other links pass through untouched.
#[derive(Copy, Clone)]
pub struct WikiLinks<'r> {
    resolver: &'r dyn LinkResolver,
}

struct WikiLinkIterator<'r, I> {
    resolver: &'r dyn LinkResolver,
    inner: I,
}

impl<'r> WikiLinks<'r> {
    pub fn new(resolver: &'r dyn LinkResolver) -> Self {
        WikiLinks { resolver }
    }
}

impl<'e, 'r> super::Plugin<'e> for WikiLinks<'r> {
    fn remap<I>(self, events: I) -> impl Iterator<Item = Event<'e>>
        where I: Iterator<Item = Event<'e>>
    {
        WikiLinkIterator { resolver: self.resolver, inner: events }
    }
}

impl<'e, I: Iterator<Item = Event<'e>>> Iterator for WikiLinkIterator<'_, I> {
    type Item = Event<'e>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = match self.inner.next()? {
            Event::Start(Tag::Link { link_type, dest_url, title, id }) if is_wiki(link_type) => {
                let dest_url = self.rewrite(&dest_url);
                Event::Start(Tag::Link { link_type, dest_url, title, id })
            }
            Event::Start(Tag::Image { link_type, dest_url, title, id }) if is_wiki(link_type) => {
                let dest_url = self.rewrite(&dest_url);
                Event::Start(Tag::Image { link_type, dest_url, title, id })
            }
            event => event,
        };

        Some(event)
    }
}

impl<I> WikiLinkIterator<'_, I> {
    fn rewrite<'e>(&self, dest: &str) -> CowStr<'e> {
        let (target, fragment) = split_fragment(dest);
        self.resolver.resolve(target.trim(), fragment.trim()).into()
    }
}

fn is_wiki(link_type: LinkType) -> bool {
    matches!(link_type, LinkType::WikiLink { .. })
}

#[cfg(test)]
mod tests {
    use pulldown_cmark::{Event, Parser, Tag};

    use crate::link::{GeminiLinks, WebLinks};
    use crate::markdown::{options, Plugin};
    use super::WikiLinks;

    fn destinations(source: &str, links: WikiLinks<'_>) -> Vec<String> {
        links.remap(Parser::new_ext(source, options()))
            .filter_map(|event| match event {
                Event::Start(Tag::Link { dest_url, .. }) => Some(dest_url.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn wikilinks_resolve_per_format() {
        let source = "See [[My Page]] and [[Other Page#Usage|usage]].";
        assert_eq!(destinations(source, WikiLinks::new(&WebLinks)), [
            "my-page.html", "other-page.html#Usage"
        ]);

        assert_eq!(destinations(source, WikiLinks::new(&GeminiLinks)), [
            "my-page.gmi", "other-page.gmi"
        ]);
    }

    #[test]
    fn ordinary_links_are_untouched() {
        let source = "[site](https://example.com/A%20Page) and [[A Page]]";
        assert_eq!(destinations(source, WikiLinks::new(&WebLinks)), [
            "https://example.com/A%20Page", "a-page.html"
        ]);
    }
}
