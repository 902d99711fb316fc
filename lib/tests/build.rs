use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use orthrus::error::ErrorKind;
use orthrus::{Builder, ChangeEvent, ChangeKind, Config, Format, Phase};
use tempfile::TempDir;

const CONFIG: &str = r#"
    site_name = "Orthrus Test"

    [content]
    dir = "content"

    [web]
    template_dir = "templates/web"
    page_template = "page"
    output_dir = "public/web"
    assets = ["static"]

    [gemini]
    template_dir = "templates/gemini"
    page_template = "page"
    output_dir = "public/gemini"
    footer = "=> / Home"

    [[streams]]
    name = "Journal"
    slug = "journal"
    content_dir = "journal"
"#;

struct Site {
    dir: TempDir,
}

impl Site {
    fn new() -> Site {
        let site = Site { dir: tempfile::tempdir().unwrap() };
        site.write("content/My Post.md", "# My Post\n\nSee [[Second Post#details|details]].\n");
        site.write("content/Second Post.md", "+++\nauthor = \"Ada\"\n+++\n# Second Post\n\n## Details\n");
        site.write("content/notes.txt", "not markdown");
        site.write("journal/Day One.markdown", "# Day One\n\nBack to [[My Post]].\n");
        site.write("static/css/site.css", "body { color: black; }");
        site.write("templates/web/_head.tmpl", "<title>{{ title }} | {{ site }}</title>");
        site.write(
            "templates/web/page.tmpl",
            "{% include '_head.tmpl' %}{% if stream %}[{{ stream.slug }}]{% endif %}{{ body }}",
        );
        site.write("templates/gemini/page.tmpl", "{{ body }}");
        site
    }

    fn path(&self, path: &str) -> PathBuf {
        self.dir.path().join(path)
    }

    fn write(&self, path: &str, contents: impl AsRef<[u8]>) {
        let path = self.path(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn read(&self, path: &str) -> String {
        fs::read_to_string(self.path(path)).unwrap()
    }

    fn config(&self) -> Config {
        Config::parse(CONFIG, self.dir.path()).unwrap()
    }

    fn builder(&self) -> Builder {
        Builder::new(self.config()).unwrap()
    }

    /// Every file under `dir`, keyed by relative path.
    fn snapshot(&self, dir: &str) -> BTreeMap<PathBuf, Vec<u8>> {
        fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, files);
                } else {
                    let relative = path.strip_prefix(root).unwrap().to_path_buf();
                    files.insert(relative, fs::read(&path).unwrap());
                }
            }
        }

        let root = self.path(dir);
        let mut files = BTreeMap::new();
        walk(&root, &root, &mut files);
        files
    }
}

#[test]
fn full_build_renders_every_document_for_every_format() {
    let site = Site::new();
    let mut builder = site.builder();
    assert_eq!(builder.phase(), Phase::Idle);

    let report = builder.build_all().unwrap();
    assert_eq!(builder.phase(), Phase::Done);
    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.written.len(), 6);
    assert!(report.written.contains(&site.path("public/web/my-post.html")));
    assert!(report.written.contains(&site.path("public/gemini/journal/day-one.gmi")));

    let html = site.read("public/web/my-post.html");
    assert!(html.starts_with("<title>My Post | Orthrus Test</title><h1>My Post</h1>"), "{html}");
    assert!(html.contains("<a href=\"second-post.html#details\">details</a>"), "{html}");
    assert!(!html.contains("Home"));

    let gmi = site.read("public/gemini/my-post.gmi");
    assert_eq!(gmi, "# My Post\n\nSee details.\n=> second-post.gmi details\n\n=> / Home\n");

    let journal = site.read("public/web/journal/day-one.html");
    assert!(journal.contains("[journal]<h1>Day One</h1>"), "{journal}");
    assert!(journal.contains("href=\"my-post.html\""), "{journal}");
    assert!(site.read("public/gemini/journal/day-one.gmi").contains("=> my-post.gmi My Post"));

    assert_eq!(site.read("public/web/css/site.css"), "body { color: black; }");
    assert!(!site.path("public/gemini/css").exists());
    assert!(!site.path("public/web/notes.html").exists());
    assert!(!site.path("public/.web.staging").exists());
    assert!(!site.path("public/.web.retired").exists());
}

#[test]
fn rebuilds_are_byte_identical() {
    let site = Site::new();
    let mut builder = site.builder();
    builder.build_all().unwrap();
    let (web, gemini) = (site.snapshot("public/web"), site.snapshot("public/gemini"));

    builder.build_all().unwrap();
    assert_eq!(site.snapshot("public/web"), web);
    assert_eq!(site.snapshot("public/gemini"), gemini);
    assert_eq!(web.len(), 4);
}

#[test]
fn stale_outputs_do_not_survive_a_build() {
    let site = Site::new();
    site.write("public/web/removed-post.html", "old");
    site.builder().build_all().unwrap();
    assert!(!site.path("public/web/removed-post.html").exists());
    assert!(site.path("public/web/my-post.html").exists());
}

#[test]
fn one_bad_document_does_not_stop_the_build() {
    let site = Site::new();
    site.write("content/Broken.md", [b'#', b' ', 0xff, 0xfe, b'\n']);

    let mut builder = site.builder();
    let report = builder.build_all().unwrap();
    assert_eq!(builder.phase(), Phase::Done);
    assert_eq!(report.written.len(), 6);
    assert_eq!(report.failures.len(), 2);
    for failure in &report.failures {
        assert_eq!(failure.path, site.path("content/Broken.md"));
        assert_eq!(failure.error.kind(), ErrorKind::Parse);
    }

    let formats: Vec<_> = report.failures.iter().map(|f| f.format).collect();
    assert_eq!(formats, [Format::Web, Format::Gemini]);
    assert!(site.path("public/web/my-post.html").exists());
    assert!(site.path("public/web/second-post.html").exists());
    assert!(!site.path("public/web/broken.html").exists());
}

#[test]
fn colliding_addresses_keep_the_first_document() {
    let site = Site::new();
    site.write("content/my  post.md", "# Impostor\n");

    let report = site.builder().build_all().unwrap();
    assert!(report.is_clean());
    assert_eq!(report.written.len(), 6);

    // "My Post.md" sorts before "my  post.md".
    assert!(site.read("public/web/my-post.html").contains("<h1>My Post</h1>"));
}

#[test]
fn single_rebuild_of_a_shadowed_document_is_skipped() {
    let site = Site::new();
    site.write("content/my  post.md", "# Impostor\n");
    let mut builder = site.builder();
    builder.build_all().unwrap();

    site.write("content/my  post.md", "# Impostor Again\n");
    let report = builder.build_file(site.path("content/my  post.md")).unwrap();
    assert!(report.is_clean());
    assert!(report.written.is_empty());
    assert_eq!(site.read("public/gemini/my-post.gmi"), "# My Post\n\nSee details.\n=> second-post.gmi details\n\n=> / Home\n");

    site.write("content/My Post.md", "# Still Mine\n");
    let report = builder.build_file(site.path("content/My Post.md")).unwrap();
    assert_eq!(report.written.len(), 2);
    assert!(site.read("public/web/my-post.html").contains("<h1>Still Mine</h1>"));
}

#[test]
fn staging_failure_fails_the_pass_and_keeps_live_output() {
    let site = Site::new();
    let mut builder = site.builder();
    builder.build_all().unwrap();
    let before = site.snapshot("public/web");

    fs::remove_dir_all(site.path("static")).unwrap();
    site.write("content/My Post.md", "# Changed\n");
    assert!(builder.build_all().is_err());
    assert_eq!(builder.phase(), Phase::Failed);

    assert_eq!(site.snapshot("public/web"), before);
    assert!(!site.path("public/.web.staging").exists());
}

#[test]
fn missing_content_directory_fails_the_pass() {
    let site = Site::new();
    let mut builder = site.builder();
    fs::remove_dir_all(site.path("journal")).unwrap();

    let error = builder.build_all().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Io);
    assert_eq!(builder.phase(), Phase::Failed);
    assert!(!site.path("public/web").exists());
}

#[test]
fn single_document_rebuild_writes_into_the_live_root() {
    let site = Site::new();
    let mut builder = site.builder();
    builder.build_all().unwrap();
    let untouched = site.read("public/web/second-post.html");

    site.write("content/My Post.md", "# Rewritten\n");
    let report = builder.build_file(site.path("content/My Post.md")).unwrap();
    assert!(report.is_clean());
    assert_eq!(report.written, [
        site.path("public/web/my-post.html"),
        site.path("public/gemini/my-post.gmi"),
    ]);

    assert!(site.read("public/web/my-post.html").contains("<h1>Rewritten</h1>"));
    assert_eq!(site.read("public/gemini/my-post.gmi"), "# Rewritten\n\n=> / Home\n");
    assert_eq!(site.read("public/web/second-post.html"), untouched);

    site.write("journal/Day Two.md", "# Day Two\n");
    builder.build_file(site.path("journal/Day Two.md")).unwrap();
    assert!(site.read("public/web/journal/day-two.html").contains("[journal]"));

    assert!(builder.build_file(site.path("static/css/site.css")).is_err());
    site.write("elsewhere/Lost.md", "# Lost\n");
    assert!(builder.build_file(site.path("elsewhere/Lost.md")).is_err());
}

#[test]
fn change_events_dispatch_by_extension() {
    let site = Site::new();
    let mut builder = site.builder();
    builder.build_all().unwrap();

    let template = site.path("templates/web/page.tmpl");
    site.write("templates/web/page.tmpl", "NEW {{ body }}");
    let created = ChangeEvent::new(&template, ChangeKind::Created);
    assert!(builder.handle(&created).unwrap().is_none());
    assert!(!site.read("public/web/my-post.html").starts_with("NEW"));

    let modified = ChangeEvent::new(&template, ChangeKind::Modified);
    let report = builder.handle(&modified).unwrap().unwrap();
    assert_eq!(report.written.len(), 6);
    assert!(site.read("public/web/my-post.html").starts_with("NEW <h1>My Post</h1>"));
    assert_eq!(builder.target(Format::Web).unwrap().templates.generation(), 2);
    assert_eq!(builder.target(Format::Gemini).unwrap().templates.generation(), 1);

    site.write("content/Second Post.md", "# Second, Again\n");
    let doc = ChangeEvent::new(site.path("content/Second Post.md"), ChangeKind::Modified);
    let report = builder.handle(&doc).unwrap().unwrap();
    assert_eq!(report.written.len(), 2);
    assert!(site.read("public/gemini/second-post.gmi").starts_with("# Second, Again"));

    let other = ChangeEvent::new(site.path("static/css/site.css"), ChangeKind::Modified);
    assert!(builder.handle(&other).unwrap().is_none());

    let removed = ChangeEvent::new(site.path("content/My Post.md"), ChangeKind::Removed);
    assert!(builder.handle(&removed).unwrap().is_none());
}

#[test]
fn broken_template_reload_keeps_serving_the_old_templates() {
    let site = Site::new();
    let mut builder = site.builder();
    builder.build_all().unwrap();

    site.write("templates/gemini/page.tmpl", "{{ body ");
    assert!(builder.reload_templates(Format::Gemini).is_err());
    assert_eq!(builder.target(Format::Gemini).unwrap().templates.generation(), 1);

    let report = builder.build_all().unwrap();
    assert!(report.is_clean());
    assert!(site.read("public/gemini/my-post.gmi").starts_with("# My Post"));
}

#[test]
fn disabled_formats_are_not_built() {
    let site = Site::new();
    let config = CONFIG.replace("[gemini]", "[gemini]\nenabled = false");
    let config = Config::parse(&config, site.dir.path()).unwrap();
    let mut builder = Builder::new(config).unwrap();

    let report = builder.build_all().unwrap();
    assert_eq!(report.written.len(), 3);
    assert!(!site.path("public/gemini").exists());
    assert_eq!(builder.reload_templates(Format::Gemini).unwrap_err().kind(), ErrorKind::Config);
}
