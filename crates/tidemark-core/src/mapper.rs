//! Mapping of the grammar engine's event stream into the closed
//! document model.
//!
//! The mapper walks pulldown-cmark's events with an explicit frame
//! stack instead of native recursion, so the nesting limit is enforced
//! before any call-stack growth can happen. A block-level descent at the
//! limit drops its whole subtree; the skip loop keeps counting so the
//! depth-limit warning can report how deep the input actually went.
//! Unrecognized constructs are dropped silently.

use pulldown_cmark::{
    Alignment, BlockQuoteKind, CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd,
};
use std::sync::OnceLock;

use regex::Regex;

use crate::document::{
    AdmonitionKind, Block, DefinitionItem, FootnoteDefinition, Inline, ListItem, TableAlignment,
    TableCell,
};
use crate::emoji::replace_emoji_shortcodes;

/// Everything a single mapping pass produces. Inline-encountered
/// footnote definitions are kept out of the block list; the facade
/// merges them with the pre-extracted ones.
#[derive(Debug)]
pub(crate) struct MapOutcome {
    pub blocks: Vec<Block>,
    pub inline_footnotes: Vec<FootnoteDefinition>,
}

/// Records the depth-limit signal at most once per parse and remembers
/// the deepest nesting the input reached.
pub(crate) struct DepthLimitReporter<'a> {
    callback: Option<&'a (dyn Fn(usize) + Send + Sync)>,
    exceeded: Option<usize>,
}

impl<'a> DepthLimitReporter<'a> {
    pub fn new(callback: Option<&'a (dyn Fn(usize) + Send + Sync)>) -> Self {
        Self {
            callback,
            exceeded: None,
        }
    }

    fn record(&mut self, depth: usize) {
        match self.exceeded {
            None => {
                if let Some(callback) = self.callback {
                    callback(depth);
                }
                self.exceeded = Some(depth);
            }
            Some(current) if depth > current => self.exceeded = Some(depth),
            Some(_) => {}
        }
    }

    pub fn exceeded_depth(&self) -> Option<usize> {
        self.exceeded
    }
}

/// Grammar engine configuration. Footnotes use the eager (legacy)
/// flavor so references survive even though their definitions were
/// pre-extracted from the body.
pub(crate) fn engine_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_OLD_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_GFM);
    options.insert(Options::ENABLE_DEFINITION_LIST);
    options.insert(Options::ENABLE_SUPERSCRIPT);
    options.insert(Options::ENABLE_SUBSCRIPT);
    options
}

pub(crate) fn map_markdown(
    source: &str,
    max_depth: usize,
    reporter: &mut DepthLimitReporter<'_>,
) -> MapOutcome {
    let events = CmarkParser::new_ext(source, engine_options());
    Mapper::new(max_depth, reporter).run(events)
}

enum Frame {
    /// Container of blocks. Stray inline content is buffered in
    /// `pending` and flushed into a paragraph at block boundaries
    /// (tight list items produce bare inline events).
    Blocks {
        ctx: BlockCtx,
        blocks: Vec<Block>,
        pending: Vec<Inline>,
        task: Option<bool>,
    },
    /// Container of inline content.
    Inlines { ctx: InlineCtx, inlines: Vec<Inline> },
    List {
        ordered: bool,
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Code {
        language: Option<String>,
        text: String,
    },
    RawHtml {
        text: String,
    },
    Table {
        alignments: Vec<Option<TableAlignment>>,
        header: Vec<TableCell>,
        rows: Vec<Vec<TableCell>>,
        row: Vec<TableCell>,
        cell: Option<Vec<Inline>>,
    },
    DefList {
        items: Vec<DefinitionItem>,
    },
}

enum BlockCtx {
    Root,
    Quote { kind: Option<BlockQuoteKind> },
    Item,
    Footnote { label: String },
    DefinitionBody,
}

enum InlineCtx {
    Paragraph,
    Heading { level: u8 },
    Bold,
    Italic,
    Strikethrough,
    Superscript,
    Subscript,
    Link { destination: String },
    Image { source: String },
    DefinitionTerm,
}

struct Mapper<'a, 'r> {
    max_depth: usize,
    reporter: &'r mut DepthLimitReporter<'a>,
    stack: Vec<Frame>,
    inline_footnotes: Vec<FootnoteDefinition>,
    depth: usize,
}

impl<'a, 'r> Mapper<'a, 'r> {
    fn new(max_depth: usize, reporter: &'r mut DepthLimitReporter<'a>) -> Self {
        Self {
            max_depth,
            reporter,
            stack: vec![Frame::Blocks {
                ctx: BlockCtx::Root,
                blocks: Vec::new(),
                pending: Vec::new(),
                task: None,
            }],
            inline_footnotes: Vec::new(),
            depth: 0,
        }
    }

    fn run<'e>(mut self, events: impl Iterator<Item = Event<'e>>) -> MapOutcome {
        let mut events = events;
        while let Some(event) = events.next() {
            match event {
                Event::Start(tag) => self.start(tag, &mut events),
                Event::End(tag) => self.end(tag),
                Event::Text(text) => self.text(&text),
                Event::Code(code) => self.attach_inline(Inline::InlineCode(code.to_string())),
                Event::Html(html) => self.block_html(&html),
                Event::InlineHtml(html) => self.attach_inline(Inline::HtmlInline(html.to_string())),
                Event::FootnoteReference(label) => self.attach_inline(Inline::FootnoteReference {
                    label: label.to_string(),
                }),
                Event::SoftBreak | Event::HardBreak => {
                    self.attach_inline(Inline::Text("\n".to_string()))
                }
                Event::Rule => {
                    self.flush_pending();
                    self.attach_block(Block::ThematicBreak);
                }
                Event::TaskListMarker(checked) => self.task_marker(checked),
                // Anything the mapper does not understand is dropped.
                _ => {}
            }
        }
        self.finish()
    }

    fn start<'e>(&mut self, tag: Tag<'e>, events: &mut impl Iterator<Item = Event<'e>>) {
        if is_block_level(&tag) {
            self.flush_pending();
            if self.depth >= self.max_depth {
                self.skip_subtree(events);
                return;
            }
            self.depth += 1;
        }

        match tag {
            Tag::Paragraph => self.push_inlines(InlineCtx::Paragraph),
            Tag::Heading { level, .. } => self.push_inlines(InlineCtx::Heading {
                level: level as u8,
            }),
            Tag::BlockQuote(kind) => self.push_blocks(BlockCtx::Quote { kind }),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().map(str::to_string)
                    }
                    CodeBlockKind::Indented => None,
                };
                self.stack.push(Frame::Code {
                    language,
                    text: String::new(),
                });
            }
            Tag::HtmlBlock => self.stack.push(Frame::RawHtml {
                text: String::new(),
            }),
            Tag::List(start) => self.stack.push(Frame::List {
                ordered: start.is_some(),
                start,
                items: Vec::new(),
            }),
            Tag::Item => self.push_blocks(BlockCtx::Item),
            Tag::FootnoteDefinition(label) => self.push_blocks(BlockCtx::Footnote {
                label: label.trim().to_string(),
            }),
            Tag::DefinitionList => self.stack.push(Frame::DefList { items: Vec::new() }),
            Tag::DefinitionListTitle => self.push_inlines(InlineCtx::DefinitionTerm),
            Tag::DefinitionListDefinition => self.push_blocks(BlockCtx::DefinitionBody),
            Tag::Table(alignments) => self.stack.push(Frame::Table {
                alignments: alignments.iter().map(convert_alignment).collect(),
                header: Vec::new(),
                rows: Vec::new(),
                row: Vec::new(),
                cell: None,
            }),
            Tag::TableHead => {
                if let Some(Frame::Table { row, .. }) = self.stack.last_mut() {
                    row.clear();
                }
            }
            Tag::TableRow => {
                if let Some(Frame::Table { row, .. }) = self.stack.last_mut() {
                    row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(Frame::Table { cell, .. }) = self.stack.last_mut() {
                    *cell = Some(Vec::new());
                }
            }
            Tag::Emphasis => self.push_inlines(InlineCtx::Italic),
            Tag::Strong => self.push_inlines(InlineCtx::Bold),
            Tag::Strikethrough => self.push_inlines(InlineCtx::Strikethrough),
            Tag::Superscript => self.push_inlines(InlineCtx::Superscript),
            Tag::Subscript => self.push_inlines(InlineCtx::Subscript),
            Tag::Link { dest_url, .. } => self.push_inlines(InlineCtx::Link {
                destination: dest_url.to_string(),
            }),
            Tag::Image { dest_url, .. } => self.push_inlines(InlineCtx::Image {
                source: dest_url.to_string(),
            }),
            // Grammar extensions this mapper does not model: consume the
            // subtree without recording a depth excess.
            _ => {
                let mut nesting = 1usize;
                for event in events.by_ref() {
                    match event {
                        Event::Start(_) => nesting += 1,
                        Event::End(_) => nesting -= 1,
                        _ => {}
                    }
                    if nesting == 0 {
                        break;
                    }
                }
            }
        }
    }

    /// Consume a subtree whose root descent exceeded the depth limit,
    /// tracking how deep it actually goes.
    fn skip_subtree<'e>(&mut self, events: &mut impl Iterator<Item = Event<'e>>) {
        let mut nesting = 1usize;
        let mut block_depth = 1usize;
        let mut deepest = self.depth + 1;
        self.reporter.record(deepest);
        for event in events.by_ref() {
            match event {
                Event::Start(tag) => {
                    nesting += 1;
                    if is_block_level(&tag) {
                        block_depth += 1;
                        deepest = deepest.max(self.depth + block_depth);
                    }
                }
                Event::End(tag) => {
                    nesting -= 1;
                    if is_block_level_end(&tag) {
                        block_depth = block_depth.saturating_sub(1);
                    }
                }
                _ => {}
            }
            if nesting == 0 {
                break;
            }
        }
        self.reporter.record(deepest);
    }

    fn end(&mut self, tag: TagEnd) {
        // Table structure markers mutate the table frame in place.
        match tag {
            TagEnd::TableCell => {
                if let Some(Frame::Table { row, cell, .. }) = self.stack.last_mut() {
                    row.push(TableCell {
                        content: cell.take().unwrap_or_default(),
                    });
                }
                return;
            }
            TagEnd::TableRow => {
                if let Some(Frame::Table { rows, row, .. }) = self.stack.last_mut() {
                    rows.push(std::mem::take(row));
                }
                return;
            }
            TagEnd::TableHead => {
                if let Some(Frame::Table { header, row, .. }) = self.stack.last_mut() {
                    *header = std::mem::take(row);
                }
                return;
            }
            _ => {}
        }

        if is_block_level_end(&tag) {
            self.depth = self.depth.saturating_sub(1);
        }
        if self.stack.len() <= 1 {
            return;
        }
        let frame = self.stack.pop().expect("frame");
        match frame {
            Frame::Blocks {
                ctx,
                mut blocks,
                pending,
                task,
            } => {
                if let Some(paragraph) = pending_paragraph(pending) {
                    blocks.push(paragraph);
                }
                match ctx {
                    BlockCtx::Root => {}
                    BlockCtx::Quote { kind } => {
                        let block = build_quote(kind, blocks);
                        self.attach_block(block);
                    }
                    BlockCtx::Item => {
                        if let Some(Frame::List { items, .. }) = self.stack.last_mut() {
                            items.push(ListItem { blocks, task });
                        }
                    }
                    BlockCtx::Footnote { label } => {
                        self.inline_footnotes.push(FootnoteDefinition { label, blocks });
                    }
                    BlockCtx::DefinitionBody => {
                        if let Some(Frame::DefList { items }) = self.stack.last_mut() {
                            if items.is_empty() {
                                items.push(DefinitionItem {
                                    term: Vec::new(),
                                    definitions: Vec::new(),
                                });
                            }
                            if let Some(item) = items.last_mut() {
                                item.definitions.push(blocks);
                            }
                        }
                    }
                }
            }
            Frame::Inlines { ctx, inlines } => match ctx {
                InlineCtx::Paragraph => {
                    let block = promote_paragraph(inlines);
                    self.attach_block(block);
                }
                InlineCtx::Heading { level } => self.attach_block(Block::Heading {
                    level,
                    content: inlines,
                }),
                InlineCtx::Bold => self.attach_inline(Inline::Bold(inlines)),
                InlineCtx::Italic => self.attach_inline(Inline::Italic(inlines)),
                InlineCtx::Strikethrough => self.attach_inline(Inline::Strikethrough(inlines)),
                InlineCtx::Superscript => self.attach_inline(Inline::Superscript(inlines)),
                InlineCtx::Subscript => self.attach_inline(Inline::Subscript(inlines)),
                InlineCtx::Link { destination } => self.attach_inline(Inline::Link {
                    destination,
                    content: inlines,
                }),
                InlineCtx::Image { source } => {
                    let alt = flatten_to_text(&inlines);
                    self.attach_inline(Inline::Image {
                        source,
                        alt: (!alt.is_empty()).then_some(alt),
                    });
                }
                InlineCtx::DefinitionTerm => {
                    if let Some(Frame::DefList { items }) = self.stack.last_mut() {
                        items.push(DefinitionItem {
                            term: inlines,
                            definitions: Vec::new(),
                        });
                    }
                }
            },
            Frame::List {
                ordered,
                start,
                items,
            } => self.attach_block(Block::List {
                ordered,
                start,
                items,
            }),
            Frame::Code { language, text } => {
                let code = text.strip_suffix('\n').unwrap_or(&text).to_string();
                self.attach_block(Block::CodeBlock { code, language });
            }
            Frame::RawHtml { text } => {
                if !text.is_empty() {
                    self.attach_block(Block::HtmlBlock { html: text });
                }
            }
            Frame::Table {
                alignments,
                header,
                rows,
                ..
            } => {
                let all_empty = header.iter().all(|c| c.content.is_empty())
                    && rows.iter().all(|r| r.iter().all(|c| c.content.is_empty()));
                if !all_empty {
                    self.attach_block(Block::Table {
                        header,
                        rows,
                        alignments,
                    });
                }
            }
            Frame::DefList { items } => {
                if !items.is_empty() {
                    self.attach_block(Block::DefinitionList { items });
                }
            }
        }
    }

    fn finish(mut self) -> MapOutcome {
        let blocks = match self.stack.drain(..).next() {
            Some(Frame::Blocks {
                mut blocks,
                pending,
                ..
            }) => {
                if let Some(paragraph) = pending_paragraph(pending) {
                    blocks.push(paragraph);
                }
                blocks
            }
            _ => Vec::new(),
        };
        MapOutcome {
            blocks,
            inline_footnotes: self.inline_footnotes,
        }
    }

    fn push_blocks(&mut self, ctx: BlockCtx) {
        self.stack.push(Frame::Blocks {
            ctx,
            blocks: Vec::new(),
            pending: Vec::new(),
            task: None,
        });
    }

    fn push_inlines(&mut self, ctx: InlineCtx) {
        self.stack.push(Frame::Inlines {
            ctx,
            inlines: Vec::new(),
        });
    }

    fn text(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(Frame::Code { text: buf, .. }) => buf.push_str(text),
            Some(Frame::RawHtml { text: buf }) => buf.push_str(text),
            _ => self.attach_inline(Inline::Text(replace_emoji_shortcodes(text))),
        }
    }

    fn block_html(&mut self, html: &str) {
        match self.stack.last_mut() {
            Some(Frame::RawHtml { text }) => text.push_str(html),
            _ => {
                self.flush_pending();
                self.attach_block(Block::HtmlBlock {
                    html: html.to_string(),
                });
            }
        }
    }

    fn task_marker(&mut self, checked: bool) {
        for frame in self.stack.iter_mut().rev() {
            if let Frame::Blocks {
                ctx: BlockCtx::Item,
                task,
                ..
            } = frame
            {
                *task = Some(checked);
                return;
            }
        }
    }

    fn attach_block(&mut self, block: Block) {
        if let Some(Frame::Blocks { blocks, .. }) = self.stack.last_mut() {
            blocks.push(block);
        }
        // A block with no block container to land in is dropped.
    }

    fn attach_inline(&mut self, inline: Inline) {
        let sink = match self.stack.last_mut() {
            Some(Frame::Inlines { inlines, .. }) => inlines,
            Some(Frame::Blocks { pending, .. }) => pending,
            Some(Frame::Table {
                cell: Some(cell), ..
            }) => cell,
            _ => return,
        };
        push_merged(sink, inline);
    }

    /// Wrap buffered inline content of the innermost block container
    /// into a paragraph before a sibling block begins.
    fn flush_pending(&mut self) {
        if let Some(Frame::Blocks {
            blocks, pending, ..
        }) = self.stack.last_mut()
        {
            if let Some(paragraph) = pending_paragraph(std::mem::take(pending)) {
                blocks.push(paragraph);
            }
        }
    }
}

/// Adjacent text runs are merged so markers split across events (for
/// example a failed link reference) can be matched as one string.
fn push_merged(sink: &mut Vec<Inline>, inline: Inline) {
    if let (Some(Inline::Text(prev)), Inline::Text(text)) = (sink.last_mut(), &inline) {
        prev.push_str(text);
        return;
    }
    sink.push(inline);
}

fn pending_paragraph(pending: Vec<Inline>) -> Option<Block> {
    if pending.is_empty() {
        return None;
    }
    Some(promote_paragraph(pending))
}

/// A paragraph holding nothing but an image becomes a block image.
fn promote_paragraph(inlines: Vec<Inline>) -> Block {
    if inlines.len() == 1 {
        if let Inline::Image { source, alt } = &inlines[0] {
            return Block::Image {
                source: source.clone(),
                alt: alt.clone(),
            };
        }
    }
    Block::Paragraph { content: inlines }
}

fn admonition_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[!([A-Za-z]+)\][ \t]*").expect("admonition regex"))
}

fn build_quote(kind: Option<BlockQuoteKind>, blocks: Vec<Block>) -> Block {
    if let Some(kind) = kind {
        return Block::Admonition {
            kind: convert_quote_kind(kind),
            title: None,
            blocks,
        };
    }
    match detect_admonition(blocks) {
        Ok(admonition) => admonition,
        Err(blocks) => Block::Quote { blocks },
    }
}

/// Recognize a `[!KIND]` marker (with optional same-line title) at the
/// head of a quote that the grammar engine left as a plain block quote.
fn detect_admonition(blocks: Vec<Block>) -> Result<Block, Vec<Block>> {
    let marker = match blocks.first() {
        Some(Block::Paragraph { content }) => match content.first() {
            Some(Inline::Text(text)) => {
                admonition_marker_re().captures(text).and_then(|caps| {
                    let kind = AdmonitionKind::from_marker(&caps[1])?;
                    let rest = &text[caps.get(0).expect("match").end()..];
                    let (title_line, remainder) = match rest.find('\n') {
                        Some(i) => (&rest[..i], &rest[i + 1..]),
                        None => (rest, ""),
                    };
                    let title = title_line.trim();
                    Some((
                        kind,
                        (!title.is_empty()).then(|| title.to_string()),
                        remainder.to_string(),
                    ))
                })
            }
            _ => None,
        },
        _ => None,
    };

    let Some((kind, title, remainder)) = marker else {
        return Err(blocks);
    };

    let mut blocks = blocks;
    if let Some(Block::Paragraph { content }) = blocks.first_mut() {
        if remainder.is_empty() {
            content.remove(0);
        } else {
            content[0] = Inline::Text(remainder);
        }
        if content.is_empty() {
            blocks.remove(0);
        }
    }
    Ok(Block::Admonition {
        kind,
        title,
        blocks,
    })
}

fn convert_quote_kind(kind: BlockQuoteKind) -> AdmonitionKind {
    match kind {
        BlockQuoteKind::Note => AdmonitionKind::Note,
        BlockQuoteKind::Tip => AdmonitionKind::Tip,
        BlockQuoteKind::Important => AdmonitionKind::Important,
        BlockQuoteKind::Warning => AdmonitionKind::Warning,
        BlockQuoteKind::Caution => AdmonitionKind::Caution,
    }
}

fn convert_alignment(alignment: &Alignment) -> Option<TableAlignment> {
    match alignment {
        Alignment::None => None,
        Alignment::Left => Some(TableAlignment::Left),
        Alignment::Center => Some(TableAlignment::Center),
        Alignment::Right => Some(TableAlignment::Right),
    }
}

fn flatten_to_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    let mut queue: Vec<&Inline> = inlines.iter().rev().collect();
    while let Some(inline) = queue.pop() {
        match inline {
            Inline::Text(text) | Inline::InlineCode(text) => out.push_str(text),
            Inline::Bold(nested)
            | Inline::Italic(nested)
            | Inline::Strikethrough(nested)
            | Inline::Superscript(nested)
            | Inline::Subscript(nested) => {
                for child in nested.iter().rev() {
                    queue.push(child);
                }
            }
            Inline::Link { content, .. } => {
                for child in content.iter().rev() {
                    queue.push(child);
                }
            }
            Inline::Abbreviation { text, .. } => out.push_str(text),
            Inline::Image { .. } | Inline::FootnoteReference { .. } | Inline::HtmlInline(_) => {}
        }
    }
    out
}

fn is_block_level(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Paragraph
            | Tag::Heading { .. }
            | Tag::BlockQuote(_)
            | Tag::CodeBlock(_)
            | Tag::HtmlBlock
            | Tag::List(_)
            | Tag::Item
            | Tag::FootnoteDefinition(_)
            | Tag::Table(_)
            | Tag::DefinitionList
            | Tag::DefinitionListDefinition
    )
}

fn is_block_level_end(tag: &TagEnd) -> bool {
    matches!(
        tag,
        TagEnd::Paragraph
            | TagEnd::Heading(_)
            | TagEnd::BlockQuote(_)
            | TagEnd::CodeBlock
            | TagEnd::HtmlBlock
            | TagEnd::List(_)
            | TagEnd::Item
            | TagEnd::FootnoteDefinition
            | TagEnd::Table
            | TagEnd::DefinitionList
            | TagEnd::DefinitionListDefinition
    )
}
