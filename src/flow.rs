//! Flow layout – uses Taffy to stack block content, then cuts the computed
//! tree into atomic fragments for pagination.
//!
//! Every block element becomes a flex-column container carrying its margins
//! and indent. Text is wrapped at build time and each line is its own leaf,
//! so the computed layout already knows where every line sits. Tables are
//! rows of equal-basis flex cells.
//!
//! The output is a flat list of [`Fragment`]s: single text lines, table
//! rows, images and rules. Each is atomic for pagination, so long paragraphs
//! split between lines and tables between rows. Coordinates start at the
//! flow origin `(0, 0)`; the paginator moves them onto pages.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::assets::decode_image;
use crate::dom::{DomNode, ElementNode, Tag};
use crate::fonts::{wrap_text, FontKey, FontManager};
use crate::layout_config::{BorderStyle, ImageContent, LayoutBox, TextContent, TextLine};
use crate::style::{resolve_style, ComputedStyle, TextAlign};
use crate::units::{PT_PER_INCH, PX_PER_INCH};

/// One atomic piece of flowed content.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub layout: LayoutBox,
    /// Start a new page before this fragment.
    pub break_before: bool,
    /// Start a new page after this fragment.
    pub break_after: bool,
}

/// Lay out `nodes` into a column `width` points wide.
pub fn flow(nodes: &[DomNode], width: f32, fonts: &FontManager) -> Result<Vec<Fragment>, String> {
    let width = width.max(1.0);
    let mut builder = FlowBuilder::new(fonts);

    let children = builder.blocks(nodes, &ComputedStyle::default(), width)?;
    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: taffy::Dimension::Length(width),
            height: taffy::Dimension::Auto,
        },
        ..Default::default()
    };
    let root = builder.container(root_style, children)?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(layout_error)?;

    let mut out = Emitted::default();
    builder.emit(root, 0.0, 0.0, &mut Vec::new(), &mut out)?;
    Ok(out.fragments)
}

fn layout_error(err: impl std::fmt::Display) -> String {
    format!("layout failed: {err}")
}

/// What a node turns into once its position is known.
enum Piece {
    Line {
        content: TextContent,
        align: TextAlign,
        background: Option<[f32; 4]>,
    },
    Rule([f32; 4]),
    Image(String),
    Row {
        background: Option<[f32; 4]>,
    },
    Cell {
        content: TextContent,
        background: Option<[f32; 4]>,
        border: Option<BorderStyle>,
    },
}

/// A built node plus the vertical margins its container may collapse.
struct Child {
    node: NodeId,
    margin_top: f32,
    margin_bottom: f32,
}

impl Child {
    fn flush(node: NodeId) -> Self {
        Self {
            node,
            margin_top: 0.0,
            margin_bottom: 0.0,
        }
    }
}

/// Left edge and look of a blockquote bar.
#[derive(Clone, Copy)]
struct Bar {
    x: f32,
    width: f32,
    color: [f32; 4],
}

#[derive(Default)]
struct Emitted {
    fragments: Vec<Fragment>,
    pending_break: bool,
    /// List marker for the next line placed.
    pending_marker: Option<String>,
}

struct FlowBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    pieces: HashMap<NodeId, Piece>,
    breaks: HashMap<NodeId, (bool, bool)>,
    markers: HashMap<NodeId, String>,
    bars: HashMap<NodeId, (f32, [f32; 4])>,
}

impl<'a> FlowBuilder<'a> {
    fn new(fonts: &'a FontManager) -> Self {
        let mut taffy = TaffyTree::new();
        // Points are not pixels: keep fractional line heights.
        taffy.disable_rounding();
        Self {
            taffy,
            fonts,
            pieces: HashMap::new(),
            breaks: HashMap::new(),
            markers: HashMap::new(),
            bars: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Build
    // -----------------------------------------------------------------------

    /// Build the children of a block container. Consecutive text and inline
    /// elements form anonymous paragraphs.
    fn blocks(&mut self, nodes: &[DomNode], style: &ComputedStyle, width: f32) -> Result<Vec<Child>, String> {
        let mut children = Vec::new();
        let mut run: Vec<&DomNode> = Vec::new();
        for node in nodes {
            match node {
                DomNode::Element(el) if !el.tag.is_inline() => {
                    children.extend(self.inline_run(&run, style, width)?);
                    run.clear();
                    children.extend(self.block(el, style, width)?);
                }
                _ => run.push(node),
            }
        }
        children.extend(self.inline_run(&run, style, width)?);
        Ok(children)
    }

    fn block(&mut self, el: &ElementNode, parent: &ComputedStyle, width: f32) -> Result<Option<Child>, String> {
        let style = resolve_style(el, Some(parent));
        if style.hidden {
            return Ok(None);
        }
        let inner_width = (width - style.indent).max(1.0);
        let children = match &el.tag {
            Tag::Hr => {
                let rule = self.leaf(taffy::Dimension::Auto, style.border_width.max(0.5))?;
                self.pieces.insert(rule, Piece::Rule(style.border_color.to_array()));
                vec![Child::flush(rule)]
            }
            Tag::Img => self.image(el, &style, inner_width)?.into_iter().collect(),
            Tag::Table => self.table(el, &style, inner_width)?,
            Tag::Ul | Tag::Ol => self.list(el, &style, inner_width)?,
            Tag::Pre => self.paragraph(&el.text_content(), &style, inner_width)?,
            _ => self.blocks(&el.children, &style, inner_width)?,
        };

        let node_style = Style {
            display: taffy::Display::Flex,
            flex_direction: taffy::FlexDirection::Column,
            flex_shrink: 0.0,
            margin: Rect {
                top: LengthPercentageAuto::Length(style.margin_top),
                right: LengthPercentageAuto::Length(0.0),
                bottom: LengthPercentageAuto::Length(style.margin_bottom),
                left: LengthPercentageAuto::Length(0.0),
            },
            padding: Rect {
                top: LengthPercentage::Length(0.0),
                right: LengthPercentage::Length(0.0),
                bottom: LengthPercentage::Length(0.0),
                left: LengthPercentage::Length(style.indent),
            },
            ..Default::default()
        };
        let node = self.container(node_style, children)?;

        if style.page_break_before || style.page_break_after {
            self.breaks
                .insert(node, (style.page_break_before, style.page_break_after));
        }
        if el.tag == Tag::Blockquote && style.border_width > 0.0 {
            self.bars
                .insert(node, (style.border_width, style.border_color.to_array()));
        }
        Ok(Some(Child {
            node,
            margin_top: style.margin_top,
            margin_bottom: style.margin_bottom,
        }))
    }

    /// Create a container over `children`, collapsing the margins of
    /// adjacent siblings into the larger of the two.
    fn container(&mut self, style: Style, children: Vec<Child>) -> Result<NodeId, String> {
        let mut previous_bottom = 0.0f32;
        for child in &children {
            if previous_bottom > 0.0 && child.margin_top > 0.0 {
                let mut collapsed = self.taffy.style(child.node).map_err(layout_error)?.clone();
                collapsed.margin.top =
                    LengthPercentageAuto::Length((child.margin_top - previous_bottom).max(0.0));
                self.taffy.set_style(child.node, collapsed).map_err(layout_error)?;
            }
            previous_bottom = child.margin_bottom;
        }
        let ids: Vec<NodeId> = children.iter().map(|c| c.node).collect();
        self.taffy.new_with_children(style, &ids).map_err(layout_error)
    }

    /// A fixed-height leaf that stretches across its container when `width`
    /// is auto.
    fn leaf(&mut self, width: taffy::Dimension, height: f32) -> Result<NodeId, String> {
        self.taffy
            .new_leaf(Style {
                size: Size {
                    width,
                    height: taffy::Dimension::Length(height),
                },
                flex_shrink: 0.0,
                ..Default::default()
            })
            .map_err(layout_error)
    }

    fn list(&mut self, el: &ElementNode, style: &ComputedStyle, width: f32) -> Result<Vec<Child>, String> {
        let ordered = el.tag == Tag::Ol;
        let mut number: usize = el.attr("start").and_then(|s| s.trim().parse().ok()).unwrap_or(1);
        let mut children = Vec::new();
        for node in &el.children {
            let DomNode::Element(item) = node else {
                continue;
            };
            let Some(child) = self.block(item, style, width)? else {
                continue;
            };
            if item.tag == Tag::Li {
                let marker = if ordered {
                    format!("{number}.")
                } else {
                    "\u{2022}".to_string()
                };
                number += 1;
                self.markers.insert(child.node, marker);
            }
            children.push(child);
        }
        Ok(children)
    }

    fn inline_run(&mut self, run: &[&DomNode], style: &ComputedStyle, width: f32) -> Result<Vec<Child>, String> {
        if run.is_empty() {
            return Ok(Vec::new());
        }
        let mut text = String::new();
        let mut images = Vec::new();
        for node in run {
            collect_inline(node, &mut text, &mut images);
        }
        let mut children = Vec::new();
        if !text.trim().is_empty() {
            let run_style = dominant_style(run, style);
            children.extend(self.paragraph(&text, &run_style, width)?);
        }
        for img in images {
            let img_style = resolve_style(img, Some(style));
            children.extend(self.image(img, &img_style, width)?);
        }
        Ok(children)
    }

    /// One leaf per wrapped line.
    fn paragraph(&mut self, text: &str, style: &ComputedStyle, width: f32) -> Result<Vec<Child>, String> {
        if style.hidden {
            return Ok(Vec::new());
        }
        let background = (!style.background_color.is_transparent()).then(|| style.background_color.to_array());
        let mut children = Vec::new();
        for (node, content) in self.lines(text, style, width)? {
            self.pieces.insert(
                node,
                Piece::Line {
                    content,
                    align: style.text_align,
                    background,
                },
            );
            children.push(Child::flush(node));
        }
        Ok(children)
    }

    /// Wrap `text` to `width` and make a leaf for each line.
    fn lines(&mut self, text: &str, style: &ComputedStyle, width: f32) -> Result<Vec<(NodeId, TextContent)>, String> {
        let key = font_key(style);
        let line_height = self.fonts.line_height(style.font_size, style.line_height);
        let wrapped = wrap_text(
            text,
            style.font_size,
            key,
            width,
            style.preserve_whitespace,
            self.fonts,
        );
        let mut lines = Vec::with_capacity(wrapped.len());
        for line in wrapped {
            let measured = self.fonts.measure_text_width(&line, style.font_size, key);
            let node = self.leaf(taffy::Dimension::Auto, line_height)?;
            let content = text_content(
                vec![TextLine {
                    text: line,
                    x_offset: 0.0,
                    y_offset: 0.0,
                    width: measured,
                }],
                style,
                line_height,
            );
            lines.push((node, content));
        }
        Ok(lines)
    }

    fn table(&mut self, el: &ElementNode, style: &ComputedStyle, width: f32) -> Result<Vec<Child>, String> {
        let mut rows = Vec::new();
        collect_rows(el, &mut rows);
        let columns = rows.iter().map(|tr| cells(tr).count()).max().unwrap_or(0);
        if columns == 0 {
            return Ok(Vec::new());
        }
        let share = 1.0 / columns as f32;
        let column_width = width * share;

        let mut children = Vec::with_capacity(rows.len());
        for tr in rows {
            let row_style = resolve_style(tr, Some(style));
            let mut cell_nodes = Vec::new();
            for cell in cells(tr) {
                let cs = resolve_style(cell, Some(&row_style));
                let inset = cs.padding + cs.border_width;
                let inner = (column_width - 2.0 * inset).max(1.0);
                let mut line_nodes = Vec::new();
                for (node, content) in self.lines(&cell.text_content(), &cs, inner)? {
                    self.pieces.insert(
                        node,
                        Piece::Line {
                            content,
                            align: cs.text_align,
                            background: None,
                        },
                    );
                    line_nodes.push(node);
                }
                let cell_style = Style {
                    display: taffy::Display::Flex,
                    flex_direction: taffy::FlexDirection::Column,
                    flex_grow: 0.0,
                    flex_shrink: 0.0,
                    flex_basis: taffy::Dimension::Percent(share),
                    min_size: Size {
                        width: taffy::Dimension::Length(0.0),
                        height: taffy::Dimension::Auto,
                    },
                    padding: Rect {
                        top: LengthPercentage::Length(cs.padding),
                        right: LengthPercentage::Length(cs.padding),
                        bottom: LengthPercentage::Length(cs.padding),
                        left: LengthPercentage::Length(cs.padding),
                    },
                    border: Rect {
                        top: LengthPercentage::Length(cs.border_width),
                        right: LengthPercentage::Length(cs.border_width),
                        bottom: LengthPercentage::Length(cs.border_width),
                        left: LengthPercentage::Length(cs.border_width),
                    },
                    ..Default::default()
                };
                let node = self
                    .taffy
                    .new_with_children(cell_style, &line_nodes)
                    .map_err(layout_error)?;
                let line_height = self.fonts.line_height(cs.font_size, cs.line_height);
                self.pieces.insert(
                    node,
                    Piece::Cell {
                        content: text_content(Vec::new(), &cs, line_height),
                        background: (!cs.background_color.is_transparent())
                            .then(|| cs.background_color.to_array()),
                        border: (cs.border_width > 0.0).then(|| BorderStyle {
                            width: cs.border_width,
                            color: cs.border_color.to_array(),
                        }),
                    },
                );
                cell_nodes.push(node);
            }

            let row_node = self
                .taffy
                .new_with_children(
                    Style {
                        display: taffy::Display::Flex,
                        flex_direction: taffy::FlexDirection::Row,
                        align_items: Some(taffy::AlignItems::Stretch),
                        flex_shrink: 0.0,
                        size: Size {
                            width: taffy::Dimension::Percent(1.0),
                            height: taffy::Dimension::Auto,
                        },
                        ..Default::default()
                    },
                    &cell_nodes,
                )
                .map_err(layout_error)?;
            self.pieces.insert(
                row_node,
                Piece::Row {
                    background: (!row_style.background_color.is_transparent())
                        .then(|| row_style.background_color.to_array()),
                },
            );
            children.push(Child::flush(row_node));
        }
        Ok(children)
    }

    fn image(&mut self, el: &ElementNode, style: &ComputedStyle, width: f32) -> Result<Option<Child>, String> {
        let Some(src) = el.src() else {
            return Ok(None);
        };
        let (w, h) = match (style.width, style.height) {
            (Some(w), Some(h)) => (w, h),
            (w, h) => {
                let Some(img) = decode_image(src) else {
                    return Ok(None);
                };
                let px_to_pt = PT_PER_INCH / PX_PER_INCH;
                let iw = img.width() as f32 * px_to_pt;
                let ih = img.height() as f32 * px_to_pt;
                match (w, h) {
                    (Some(w), None) => (w, w * ih / iw.max(1.0)),
                    (None, Some(h)) => (h * iw / ih.max(1.0), h),
                    _ => (iw, ih),
                }
            }
        };
        // Shrink to the column, keeping the aspect ratio.
        let (w, h) = if w > width { (width, h * width / w) } else { (w, h) };
        if w <= 0.0 || h <= 0.0 {
            return Ok(None);
        }
        let node = self.leaf(taffy::Dimension::Length(w), h)?;
        self.pieces.insert(node, Piece::Image(src.to_string()));
        Ok(Some(Child::flush(node)))
    }

    // -----------------------------------------------------------------------
    // Emit
    // -----------------------------------------------------------------------

    /// Walk the computed tree in document order, turning pieces into
    /// fragments at their absolute positions.
    fn emit(&self, node: NodeId, parent_x: f32, parent_y: f32, bars: &mut Vec<Bar>, out: &mut Emitted) -> Result<(), String> {
        let layout = self.taffy.layout(node).map_err(layout_error)?;
        let x = parent_x + layout.location.x;
        let y = parent_y + layout.location.y;
        let (width, height) = (layout.size.width, layout.size.height);

        match self.pieces.get(&node) {
            Some(Piece::Line {
                content,
                align,
                background,
            }) => {
                let mut lbox = LayoutBox::new(x, y, width, height);
                lbox.text = Some(aligned(content, *align, width, 0.0, 0.0));
                lbox.background_color = *background;
                if let Some(marker) = out.pending_marker.take() {
                    lbox.children.push(self.marker_box(marker, content, x, y));
                }
                push(out, lbox, bars);
            }
            Some(Piece::Rule(color)) => {
                let mut rule = LayoutBox::new(x, y, width, height);
                rule.background_color = Some(*color);
                push(out, rule, bars);
            }
            Some(Piece::Image(src)) => {
                let mut ibox = LayoutBox::new(x, y, width, height);
                ibox.image = Some(ImageContent {
                    src: src.clone(),
                    width,
                    height,
                });
                push(out, ibox, bars);
            }
            Some(Piece::Row { background }) => {
                let mut row = LayoutBox::new(x, y, width, height);
                row.background_color = *background;
                for cell in self.taffy.children(node).map_err(layout_error)? {
                    row.children.push(self.cell_box(cell, x, y)?);
                }
                push(out, row, bars);
            }
            Some(Piece::Cell { .. }) => {}
            None => {
                let (break_before, break_after) = self.breaks.get(&node).copied().unwrap_or_default();
                if break_before {
                    out.pending_break = true;
                }
                if let Some(marker) = self.markers.get(&node) {
                    out.pending_marker = Some(marker.clone());
                }
                let bar = self.bars.get(&node).map(|&(bar_width, color)| Bar {
                    x: x + 4.0,
                    width: bar_width,
                    color,
                });
                if let Some(bar) = bar {
                    bars.push(bar);
                }

                let start = out.fragments.len();
                for child in self.taffy.children(node).map_err(layout_error)? {
                    self.emit(child, x, y, bars, out)?;
                }

                if bar.is_some() {
                    bars.pop();
                }
                if self.markers.contains_key(&node) {
                    out.pending_marker = None;
                }
                if break_after {
                    match out.fragments[start..].last_mut() {
                        Some(last) => last.break_after = true,
                        None => out.pending_break = true,
                    }
                }
            }
        }
        Ok(())
    }

    /// A table cell with its lines positioned inside it.
    fn cell_box(&self, cell: NodeId, row_x: f32, row_y: f32) -> Result<LayoutBox, String> {
        let layout = self.taffy.layout(cell).map_err(layout_error)?;
        let mut cbox = LayoutBox::new(
            row_x + layout.location.x,
            row_y + layout.location.y,
            layout.size.width,
            layout.size.height,
        );
        let Some(Piece::Cell {
            content,
            background,
            border,
        }) = self.pieces.get(&cell)
        else {
            return Ok(cbox);
        };
        cbox.background_color = *background;
        cbox.border = border.clone();

        let mut text = content.clone();
        for line in self.taffy.children(cell).map_err(layout_error)? {
            let line_layout = self.taffy.layout(line).map_err(layout_error)?;
            if let Some(Piece::Line {
                content: line_content,
                align,
                ..
            }) = self.pieces.get(&line)
            {
                let placed = aligned(
                    line_content,
                    *align,
                    line_layout.size.width,
                    line_layout.location.x,
                    line_layout.location.y,
                );
                text.lines.extend(placed.lines);
            }
        }
        cbox.text = Some(text);
        Ok(cbox)
    }

    /// The list marker hung in the gutter left of a line.
    fn marker_box(&self, marker: String, line: &TextContent, x: f32, y: f32) -> LayoutBox {
        let key = FontKey {
            bold: line.bold,
            monospace: line.monospace,
        };
        let marker_width = self.fonts.measure_text_width(&marker, line.font_size, key);
        let mut mbox = LayoutBox::new(x - marker_width - 6.0, y, marker_width, line.line_height);
        let mut text = line.clone();
        text.underline = false;
        text.lines = vec![TextLine {
            text: marker,
            x_offset: 0.0,
            y_offset: 0.0,
            width: marker_width,
        }];
        mbox.text = Some(text);
        mbox
    }
}

/// Append a fragment, drawing the bars of every enclosing blockquote beside it.
fn push(out: &mut Emitted, mut lbox: LayoutBox, bars: &[Bar]) {
    for bar in bars {
        let mut bbox = LayoutBox::new(bar.x, lbox.y, bar.width, lbox.height);
        bbox.background_color = Some(bar.color);
        lbox.children.push(bbox);
    }
    out.fragments.push(Fragment {
        layout: lbox,
        break_before: std::mem::take(&mut out.pending_break),
        break_after: false,
    });
}

/// Copy `content`, placing each line at `(dx, dy)` and aligning it within
/// `available`.
fn aligned(content: &TextContent, align: TextAlign, available: f32, dx: f32, dy: f32) -> TextContent {
    let mut text = content.clone();
    for line in &mut text.lines {
        line.x_offset = dx + align_offset(align, available, line.width);
        line.y_offset += dy;
    }
    text
}

fn font_key(style: &ComputedStyle) -> FontKey {
    FontKey {
        bold: style.bold,
        monospace: style.monospace,
    }
}

fn align_offset(align: TextAlign, available: f32, measured: f32) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => ((available - measured) / 2.0).max(0.0),
        TextAlign::Right => (available - measured).max(0.0),
    }
}

fn text_content(lines: Vec<TextLine>, style: &ComputedStyle, line_height: f32) -> TextContent {
    TextContent {
        lines,
        font_size: style.font_size,
        bold: style.bold,
        italic: style.italic,
        monospace: style.monospace,
        color: style.color.to_array(),
        line_height,
        underline: style.underline,
    }
}

fn collect_inline<'a>(node: &'a DomNode, text: &mut String, images: &mut Vec<&'a ElementNode>) {
    match node {
        DomNode::Text(t) => text.push_str(t),
        DomNode::Element(el) => match el.tag {
            Tag::Br => text.push('\n'),
            Tag::Img => images.push(el),
            ref tag if tag.is_hidden() => {}
            _ => {
                for child in &el.children {
                    collect_inline(child, text, images);
                }
            }
        },
    }
}

/// The style of a run that is entirely wrapped by one inline element, such
/// as `<p><strong>…</strong></p>`; otherwise the container's style.
fn dominant_style(run: &[&DomNode], parent: &ComputedStyle) -> ComputedStyle {
    let mut significant = run.iter().copied().filter(|node| match node {
        DomNode::Text(t) => !t.trim().is_empty(),
        DomNode::Element(_) => true,
    });
    match (significant.next(), significant.next()) {
        (Some(DomNode::Element(el)), None) if el.tag != Tag::Br => {
            let style = resolve_style(el, Some(parent));
            let children: Vec<&DomNode> = el.children.iter().collect();
            dominant_style(&children, &style)
        }
        _ => parent.clone(),
    }
}

fn collect_rows<'a>(table: &'a ElementNode, rows: &mut Vec<&'a ElementNode>) {
    for node in &table.children {
        if let DomNode::Element(el) = node {
            match el.tag {
                Tag::Tr => rows.push(el),
                Tag::Thead | Tag::Tbody => collect_rows(el, rows),
                _ => {}
            }
        }
    }
}

fn cells(tr: &ElementNode) -> impl Iterator<Item = &ElementNode> {
    tr.children.iter().filter_map(|node| match node {
        DomNode::Element(el) if matches!(el.tag, Tag::Td | Tag::Th) => Some(el),
        _ => None,
    })
}
