//! A gemtext writer over the markdown event stream.
//!
//! Gemtext is line oriented: one heading, text, list item, quote, or link per
//! line, with no inline markup. The writer maps markdown onto it as follows:
//!
//!   * Headings keep up to three `#`s.
//!   * Links in paragraphs and headings are listed as `=> url label` lines
//!     below the block; a block that is nothing but a link becomes a single
//!     link line.
//!   * List items become `* item` lines. An item that is only a link becomes
//!     a link line; other links are listed after the whole list. Nested lists
//!     are flattened.
//!   * Block quotes prefix each line with `> `.
//!   * Code blocks and tables become preformatted blocks.
//!   * Raw HTML is dropped. Emphasis markers are kept as written.
//!
//! Blocks are separated by a blank line.

use std::mem::take;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Tag, TagEnd};

/// Serializes `events` as gemtext.
pub fn to_gemtext<'e, I: IntoIterator<Item = Event<'e>>>(events: I) -> String {
    let mut writer = Writer::default();
    for event in events {
        writer.event(event);
    }

    writer.finish()
}

#[derive(Default)]
struct Writer {
    blocks: Vec<String>,
    text: String,
    links: Vec<Link>,
    open_links: Vec<(String, usize)>,
    quote: usize,
    list: Option<List>,
    code: Option<String>,
    table: Option<Table>,
}

struct Link {
    dest: String,
    label: String,
}

#[derive(Default)]
struct List {
    depth: usize,
    lines: Vec<String>,
    links: Vec<Link>,
}

#[derive(Default)]
struct Table {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
}

impl Link {
    fn line(&self) -> String {
        match self.label.is_empty() {
            true => format!("=> {}", self.dest),
            false => format!("=> {} {}", self.dest, self.label),
        }
    }
}

impl Writer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code.as_mut() {
                Some(code) => code.push_str(&text),
                None => self.text.push_str(&text),
            },
            Event::Code(code) => {
                self.text.push('`');
                self.text.push_str(&code);
                self.text.push('`');
            }
            Event::SoftBreak => self.text.push(' '),
            Event::HardBreak => self.text.push('\n'),
            Event::Rule => {
                self.close_item();
                self.emit("---".into());
            }
            Event::TaskListMarker(true) => self.text.push_str("[x] "),
            Event::TaskListMarker(false) => self.text.push_str("[ ] "),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::CodeBlock(kind) => {
                self.close_item();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next()
                        .map(|lang| lang.split(',').next().unwrap_or(lang).to_string())
                        .unwrap_or_default(),
                    CodeBlockKind::Indented => String::new(),
                };

                self.code = Some(format!("```{lang}\n"));
            }
            Tag::List(_) => match self.list.as_mut() {
                Some(list) => {
                    list.depth += 1;
                    self.flush_item();
                }
                None => self.list = Some(List { depth: 1, ..List::default() }),
            },
            Tag::BlockQuote(_) => self.quote += 1,
            Tag::Table(_) => {
                self.close_item();
                self.table = Some(Table::default());
            }
            Tag::TableCell => self.text.clear(),
            Tag::Emphasis => self.text.push('*'),
            Tag::Strong => self.text.push_str("**"),
            Tag::Strikethrough => self.text.push_str("~~"),
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => {
                self.open_links.push((dest_url.into_string(), self.text.len()));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph if self.list.is_some() => {
                if !self.text.is_empty() && !self.text.ends_with(' ') {
                    self.text.push(' ');
                }
            }
            TagEnd::Paragraph => {
                let text = take(&mut self.text);
                self.text_block(text.trim(), "");
            }
            TagEnd::Heading(level) => {
                let text = take(&mut self.text);
                let prefix = match level {
                    HeadingLevel::H1 => "# ",
                    HeadingLevel::H2 => "## ",
                    _ => "### ",
                };

                self.text_block(text.trim(), prefix);
            }
            TagEnd::Item => self.flush_item(),
            TagEnd::List(_) => {
                let Some(list) = self.list.as_mut() else { return };
                list.depth -= 1;
                if list.depth == 0 {
                    if let Some(list) = self.list.take() {
                        let mut lines = list.lines;
                        lines.extend(list.links.iter().map(Link::line));
                        self.emit(lines.join("\n"));
                    }
                }
            }
            TagEnd::BlockQuote(_) => self.quote = self.quote.saturating_sub(1),
            TagEnd::CodeBlock => {
                if let Some(mut code) = self.code.take() {
                    if !code.ends_with('\n') {
                        code.push('\n');
                    }

                    code.push_str("```");
                    self.emit(code);
                }
            }
            TagEnd::TableCell => {
                let cell = take(&mut self.text).trim().to_string();
                if let Some(table) = self.table.as_mut() {
                    table.row.push(cell);
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    let mut block = String::from("```\n");
                    for row in &table.rows {
                        block.push_str(&row.join(" | "));
                        block.push('\n');
                    }

                    block.push_str("```");
                    for link in take(&mut self.links) {
                        block.push('\n');
                        block.push_str(&link.line());
                    }

                    self.emit(block);
                }
            }
            TagEnd::Emphasis => self.text.push('*'),
            TagEnd::Strong => self.text.push_str("**"),
            TagEnd::Strikethrough => self.text.push_str("~~"),
            TagEnd::Link | TagEnd::Image => {
                if let Some((dest, start)) = self.open_links.pop() {
                    let label = self.text.get(start..).unwrap_or("").trim().to_string();
                    if !dest.is_empty() {
                        self.links.push(Link { dest, label });
                    }
                }
            }
            _ => {}
        }
    }

    /// Emits a paragraph or heading followed by its links.
    fn text_block(&mut self, text: &str, prefix: &str) {
        let links = take(&mut self.links);
        if let [link] = &links[..] {
            if prefix.is_empty() && link.label == text {
                self.emit(link.line());
                return;
            }
        }

        if text.is_empty() && links.is_empty() {
            return;
        }

        let mut block = String::new();
        for (i, line) in text.lines().enumerate() {
            if i > 0 {
                block.push('\n');
            }

            for _ in 0..self.quote {
                block.push_str("> ");
            }

            block.push_str(prefix);
            block.push_str(line);
        }

        for link in &links {
            if !block.is_empty() {
                block.push('\n');
            }

            block.push_str(&link.line());
        }

        self.emit(block);
    }

    /// Turns the pending text of a list item into a line of the current list.
    fn flush_item(&mut self) {
        let text = take(&mut self.text);
        let text = text.trim();
        let links = take(&mut self.links);
        let Some(list) = self.list.as_mut() else { return };
        if matches!(&links[..], [link] if link.label == text) {
            list.lines.extend(links.iter().map(Link::line));
            return;
        }

        if !text.is_empty() {
            list.lines.push(format!("* {}", text.replace('\n', " ")));
        }

        list.links.extend(links);
    }

    /// Writes out the text a list item has so far, so that a block nested in
    /// the item lands below it.
    fn close_item(&mut self) {
        if self.list.is_some() {
            self.flush_item();
        }
    }

    fn emit(&mut self, block: String) {
        match self.list.as_mut() {
            Some(list) => list.lines.push(block),
            None => self.blocks.push(block),
        }
    }

    fn finish(self) -> String {
        let mut out = self.blocks.join("\n\n");
        if !out.is_empty() {
            out.push('\n');
        }

        out
    }
}
