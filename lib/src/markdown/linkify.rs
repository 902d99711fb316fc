use std::collections::VecDeque;

use pulldown_cmark::{CowStr, Event, LinkType, Tag, TagEnd};

/// Turns bare `http://` and `https://` URLs in text into autolinks.
///
/// Text inside links, images, and code blocks is left alone. Expects merged
/// text events, as produced by `TextMergeStream`.
#[derive(Debug, Default, Copy, Clone)]
pub struct Linkify;

struct LinkifyIterator<'e, I> {
    inner: I,
    pending: VecDeque<Event<'e>>,
    opaque: usize,
}

impl<'e> super::Plugin<'e> for Linkify {
    fn remap<I>(self, events: I) -> impl Iterator<Item = Event<'e>>
        where I: Iterator<Item = Event<'e>>
    {
        LinkifyIterator { inner: events, pending: VecDeque::new(), opaque: 0 }
    }
}

impl<'e, I: Iterator<Item = Event<'e>>> Iterator for LinkifyIterator<'e, I> {
    type Item = Event<'e>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        match self.inner.next()? {
            event @ Event::Start(Tag::Link { .. } | Tag::Image { .. } | Tag::CodeBlock(_)) => {
                self.opaque += 1;
                Some(event)
            }
            event @ Event::End(TagEnd::Link | TagEnd::Image | TagEnd::CodeBlock) => {
                self.opaque = self.opaque.saturating_sub(1);
                Some(event)
            }
            Event::Text(text) if self.opaque == 0 && find_url(&text).is_some() => {
                split_urls(&text, &mut self.pending);
                self.pending.pop_front()
            }
            event => Some(event),
        }
    }
}

/// Returns the byte range of the first URL in `text`.
fn find_url(text: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    while let Some(i) = memchr::memmem::find(text[offset..].as_bytes(), b"http") {
        let start = offset + i;
        let rest = &text[start..];
        let scheme = ["https://", "http://"].into_iter().find(|s| rest.starts_with(s));
        let boundary = text[..start].chars().next_back().map_or(true, |c| !c.is_alphanumeric());
        if let (Some(scheme), true) = (scheme, boundary) {
            let len = rest.find(|c: char| c.is_whitespace() || c == '<' || c == '>')
                .unwrap_or(rest.len());

            let end = start + trim_trailing(&rest[..len]);
            if end > start + scheme.len() {
                return Some((start, end));
            }
        }

        offset = start + 4;
    }

    None
}

/// Length of `url` once trailing punctuation is removed. A closing paren is
/// kept when it balances one inside the URL.
fn trim_trailing(url: &str) -> usize {
    let mut end = url.len();
    while let Some(c) = url[..end].chars().next_back() {
        let unbalanced = c == ')'
            && url[..end].matches('(').count() < url[..end].matches(')').count();

        if matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"') || unbalanced {
            end -= c.len_utf8();
        } else {
            break;
        }
    }

    end
}

fn split_urls<'e>(mut text: &str, out: &mut VecDeque<Event<'e>>) {
    while let Some((start, end)) = find_url(text) {
        if start > 0 {
            out.push_back(Event::Text(CowStr::from(text[..start].to_string())));
        }

        let url = text[start..end].to_string();
        out.push_back(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: url.clone().into(),
            title: "".into(),
            id: "".into(),
        }));

        out.push_back(Event::Text(url.into()));
        out.push_back(Event::End(TagEnd::Link));
        text = &text[end..];
    }

    if !text.is_empty() {
        out.push_back(Event::Text(CowStr::from(text.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use pulldown_cmark::{Event, Parser, Tag, TextMergeStream};

    use crate::markdown::{options, Plugin};
    use super::{find_url, Linkify};

    fn links(source: &str) -> Vec<String> {
        Linkify.remap(TextMergeStream::new(Parser::new_ext(source, options())))
            .filter_map(|event| match event {
                Event::Start(Tag::Link { dest_url, .. }) => Some(dest_url.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn finds_urls_and_trims_punctuation() {
        let url = |s: &'static str| find_url(s).map(|(a, b)| &s[a..b]);
        assert_eq!(url("see https://example.com."), Some("https://example.com"));
        assert_eq!(url("(https://en.wikipedia.org/wiki/Rust_(language))"),
            Some("https://en.wikipedia.org/wiki/Rust_(language)"));
        assert_eq!(url("go to http://a.b/c?d=e, then"), Some("http://a.b/c?d=e"));
        assert_eq!(url("nothttp://example.com"), None);
        assert_eq!(url("just https://"), None);
        assert_eq!(url("no links here"), None);
    }

    #[test]
    fn bare_urls_become_links() {
        assert_eq!(links("one https://a.example and http://b.example/x."), [
            "https://a.example", "http://b.example/x"
        ]);
    }

    #[test]
    fn existing_links_and_code_are_skipped() {
        assert_eq!(links("[https://a.example](https://b.example)"), ["https://b.example"]);
        assert!(links("`https://a.example`").is_empty());
        assert!(links("```\nhttps://a.example\n```").is_empty());
    }
}
