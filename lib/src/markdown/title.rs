use pulldown_cmark::{Event, HeadingLevel, Tag, TagEnd};

/// Returns the text of the first level-1 heading in `events`.
///
/// Only text directly inside the heading counts: text nested in emphasis,
/// links, or code spans is skipped. Lower-level headings are never searched,
/// and nothing past the first level-1 heading is read. Returns `None` when
/// the document has no level-1 heading.
pub fn extract_title<'a, 'e: 'a, I>(events: I) -> Option<String>
    where I: IntoIterator<Item = &'a Event<'e>>
{
    let mut events = events.into_iter();
    events.find(|e| matches!(e, Event::Start(Tag::Heading { level: HeadingLevel::H1, .. })))?;

    let mut title = String::new();
    let mut depth = 0usize;
    for event in events {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(TagEnd::Heading(_)) if depth == 0 => break,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(text) if depth == 0 => title.push_str(text),
            _ => {}
        }
    }

    Some(title)
}
