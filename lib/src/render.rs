//! Rendering one source document into one output format.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use minijinja::{context, Value};
use pulldown_cmark::Event;

use crate::address::Address;
use crate::config::StreamConfig;
use crate::error::{Chainable, Result};
use crate::markdown::{self, front_matter, gemtext, title, Markdown, Plugin, SyntaxHighlight};
use crate::target::{Format, Target};

/// A markdown source file, read fresh on every pass.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

/// The output of rendering one document for one target.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub address: Address,
    /// The output file name: the address plus the format's suffix.
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub title: Option<String>,
}

/// Where a document is being rendered: the site and, for stream documents,
/// the stream.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub name: &'a str,
    pub stream: Option<&'a StreamConfig>,
}

impl SourceDocument {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).chain_with(|| error! {
            "failed to read source document",
            "path" => path.display(),
        })?;

        Ok(SourceDocument { path: path.to_path_buf(), bytes })
    }
}

/// Renders `doc` through `target`'s page template.
///
/// The template sees `title`, `body` (already serialized, marked safe),
/// `filename` (the address without suffix), `site`, `stream` (`name` and
/// `slug`, or none), and `meta` (the front matter table, empty if absent).
pub fn render(doc: &SourceDocument, target: &Target, site: Site<'_>) -> Result<Rendered> {
    let format = target.format;
    let _span = tracing::info_span!("render", path = %doc.path.display(), %format).entered();

    let source = std::str::from_utf8(&doc.bytes).chain_with(|| error! {
        "source document is not valid UTF-8",
        "path" => doc.path.display(),
    })?;

    let (meta, body) = front_matter::split(source).chain_with(|| error! {
        "failed to parse front matter",
        "path" => doc.path.display(),
    })?;

    let body = match target.footer() {
        Some(footer) => Cow::Owned(format!("{}\n\n{}\n", body.trim_end(), footer)),
        None => Cow::Borrowed(body),
    };

    let document = match format {
        Format::Web => Markdown::new(&body).typographic(),
        Format::Gemini => Markdown::new(&body),
    };

    let events: Vec<Event<'_>> = document.events(format.resolver()).collect();
    let title = title::extract_title(&events);
    if title.is_none() && format == Format::Web {
        tracing::warn!(path = %doc.path.display(), "no level-1 heading; using an empty title");
    }

    let body = match format {
        Format::Web => markdown::to_html(SyntaxHighlight.remap(events.into_iter())),
        Format::Gemini => gemtext::to_gemtext(events),
    };

    let address = Address::of_path(&doc.path);
    let stream = site.stream.map(|stream| context! {
        name => &stream.name,
        slug => &stream.slug,
    });

    let context = context! {
        title => title.as_deref().unwrap_or(""),
        body => Value::from_safe_string(body),
        filename => address.as_str(),
        site => site.name,
        stream => stream,
        meta => meta.unwrap_or_default(),
    };

    let output = target.templates.render(target.page_template(), context)?;
    Ok(Rendered {
        file_name: address.with_suffix(format),
        address,
        bytes: output.into_bytes(),
        title,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::TargetConfig;
    use crate::error::ErrorKind;

    struct Fixture {
        _dir: tempfile::TempDir,
        web: Target,
        gemini: Target,
    }

    fn fixture(footer: Option<&str>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let settings = |name: &str, template: &str| {
            let templates = dir.path().join("templates").join(name);
            fs::create_dir_all(&templates).unwrap();
            fs::write(templates.join("page.tmpl"), template).unwrap();
            TargetConfig {
                enabled: true,
                template_dir: templates,
                page_template: "page".into(),
                output_dir: dir.path().join("public").join(name),
                assets: vec![],
                footer: None,
                hot_reload: false,
            }
        };

        let web = settings("web", "<title>{{ title }}</title>{{ filename }}|{{ site }}|{{ body }}");
        let mut gemini = settings("gemini", "{{ body }}{% if meta.author is defined %}by {{ meta.author }}\n{% endif %}");
        gemini.footer = footer.map(String::from);

        Fixture {
            web: Target::open(Format::Web, web).unwrap(),
            gemini: Target::open(Format::Gemini, gemini).unwrap(),
            _dir: dir,
        }
    }

    fn doc(name: &str, source: &str) -> SourceDocument {
        SourceDocument { path: PathBuf::from(format!("content/{name}")), bytes: source.into() }
    }

    const SITE: Site<'static> = Site { name: "Two & Two", stream: None };

    #[test]
    fn renders_both_formats() {
        let f = fixture(None);
        let doc = doc("My Post.md", "# Hello & World\n\nSee [[Other Post]].\n");

        let web = render(&doc, &f.web, SITE).unwrap();
        assert_eq!(web.address, "my-post");
        assert_eq!(web.file_name, "my-post.html");
        assert_eq!(web.title.as_deref(), Some("Hello & World"));
        assert_eq!(String::from_utf8(web.bytes).unwrap(), concat!(
            "<title>Hello &amp; World</title>my-post|Two &amp; Two|",
            "<h1>Hello &amp; World</h1>\n<p>See <a href=\"other-post.html\">Other Post</a>.</p>\n",
        ));

        let gemini = render(&doc, &f.gemini, SITE).unwrap();
        assert_eq!(gemini.file_name, "my-post.gmi");
        assert_eq!(String::from_utf8(gemini.bytes).unwrap(),
            "# Hello & World\n\nSee Other Post.\n=> other-post.gmi Other Post\n");
    }

    #[test]
    fn only_web_output_is_typographic() {
        let f = fixture(None);
        let doc = doc("q.md", "# Don't Panic\n");

        let web = render(&doc, &f.web, SITE).unwrap();
        assert_eq!(web.title.as_deref(), Some("Don\u{2019}t Panic"));

        let gemini = render(&doc, &f.gemini, SITE).unwrap();
        assert_eq!(gemini.title.as_deref(), Some("Don't Panic"));
        assert_eq!(String::from_utf8(gemini.bytes).unwrap(), "# Don't Panic\n");
    }

    #[test]
    fn front_matter_reaches_templates() {
        let f = fixture(None);
        let doc = doc("a.md", "+++\nauthor = \"Ada\"\n+++\n# A\n");
        let out = render(&doc, &f.gemini, SITE).unwrap();
        assert_eq!(String::from_utf8(out.bytes).unwrap(), "# A\nby Ada\n");
    }

    #[test]
    fn footer_is_appended_to_the_source() {
        let f = fixture(Some("=> / Home"));
        let out = render(&doc("a.md", "# A\n\nText.\n"), &f.gemini, SITE).unwrap();
        assert_eq!(String::from_utf8(out.bytes).unwrap(), "# A\n\nText.\n\n=> / Home\n");
    }

    #[test]
    fn missing_title_is_empty() {
        let f = fixture(None);
        let out = render(&doc("untitled.md", "## Sub\n"), &f.web, SITE).unwrap();
        assert_eq!(out.title, None);
        assert!(String::from_utf8(out.bytes).unwrap().starts_with("<title></title>untitled|"));
    }

    #[test]
    fn malformed_sources_are_parse_errors() {
        let f = fixture(None);
        let invalid = SourceDocument { path: "bad.md".into(), bytes: vec![b'#', b' ', 0xff, 0xfe] };
        assert_eq!(render(&invalid, &f.web, SITE).unwrap_err().kind(), ErrorKind::Parse);

        let front = doc("bad.md", "+++\ntitle = \n+++\n# T\n");
        assert_eq!(render(&front, &f.gemini, SITE).unwrap_err().kind(), ErrorKind::Parse);
    }

    #[test]
    fn missing_page_template_is_template_not_found() {
        let mut f = fixture(None);
        f.web.settings.page_template = "post".into();
        let error = render(&doc("a.md", "# A\n"), &f.web, SITE).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TemplateNotFound);
    }
}
