use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd};
use syntect::html::{ClassedHTMLGenerator, ClassStyle};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use once_cell::sync::Lazy;

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

/// Replaces fenced code blocks with class-annotated HTML from syntect.
///
/// The fence's info string selects the syntax; unknown or missing languages
/// fall back to plain text. Styling is left to the site's stylesheet.
#[derive(Debug, Default, Copy, Clone)]
pub struct SyntaxHighlight;

struct Highlighter<I> {
    generator: Option<(String, ClassedHTMLGenerator<'static>)>,
    inner: I,
}

impl SyntaxHighlight {
    /// Loads the syntax definitions in the background so the first render
    /// doesn't pay for it.
    #[inline]
    pub fn warm_up() {
        rayon::spawn(|| { Lazy::force(&SYNTAX_SET); });
    }
}

impl<'e> super::Plugin<'e> for SyntaxHighlight {
    fn remap<I>(self, events: I) -> impl Iterator<Item = Event<'e>>
        where I: Iterator<Item = Event<'e>>
    {
        Highlighter { generator: None, inner: events }
    }
}

fn syntax(lang: &str) -> &'static SyntaxReference {
    SYNTAX_SET.find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
}

/// The language token of a fence info string like `rust,ignore` or
/// `python title="x"`.
fn language(info: &str) -> &str {
    info.split(|c: char| c == ',' || c.is_whitespace())
        .next()
        .unwrap_or("")
}

impl<'e, I: Iterator<Item = Event<'e>>> Iterator for Highlighter<I> {
    type Item = Event<'e>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let lang = language(&info).to_string();
                    let generator = ClassedHTMLGenerator::new_with_class_style(
                        syntax(&lang),
                        &SYNTAX_SET,
                        ClassStyle::Spaced,
                    );

                    self.generator = Some((lang, generator));
                }
                Event::Text(text) => match self.generator.as_mut() {
                    Some((_, generator)) => for line in LinesWithEndings::from(&text) {
                        let _ = generator.parse_html_for_line_which_includes_newline(line);
                    },
                    None => return Some(Event::Text(text)),
                },
                Event::End(TagEnd::CodeBlock) => match self.generator.take() {
                    Some((lang, generator)) => {
                        let html = code_block(&lang, &generator.finalize());
                        return Some(Event::Html(CowStr::from(html)));
                    }
                    None => return Some(Event::End(TagEnd::CodeBlock)),
                },
                event => return Some(event),
            }
        }
    }
}

fn code_block(lang: &str, code: &str) -> String {
    if lang.is_empty() {
        format!("<pre class=\"code\"><code>{code}</code></pre>\n")
    } else {
        let lang = escape_attribute(lang);
        format!("<pre class=\"code\" data-lang=\"{lang}\"><code>{code}</code></pre>\n")
    }
}

fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }

    out
}
