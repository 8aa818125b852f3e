//! Rich-text rendering: one explicit branch per node variant, with the
//! assembled document passed through an Ammonia allow-list before use.

use std::collections::HashSet;

use once_cell::sync::Lazy;

use crate::domain::richtext::{RichTextNode, SpanMark, TextSpan};

static SANITIZER: Lazy<ammonia::Builder<'static>> = Lazy::new(build_sanitizer);

fn build_sanitizer() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "a", "code", "em", "h1", "h2", "h3", "h4", "h5", "h6", "img", "li", "ol", "p", "pre",
        "strong", "ul",
    ]);
    builder.tags(tags);
    builder.add_tag_attributes("a", &["href"]);
    builder.add_tag_attributes("img", &["src", "alt"]);

    builder
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn open_tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "<ul>",
            ListKind::Ordered => "<ol>",
        }
    }

    fn close_tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "</ul>",
            ListKind::Ordered => "</ol>",
        }
    }
}

/// Render a rich-text document to sanitized HTML. Consecutive list items
/// collapse into a single list element; everything else closes the open
/// list first.
pub fn render_document(nodes: &[RichTextNode]) -> String {
    let mut html = String::new();
    let mut open_list: Option<ListKind> = None;

    for node in nodes {
        match node {
            RichTextNode::ListItem { spans } => {
                switch_list(&mut html, &mut open_list, ListKind::Unordered);
                render_list_item(spans, &mut html);
            }
            RichTextNode::OrderedListItem { spans } => {
                switch_list(&mut html, &mut open_list, ListKind::Ordered);
                render_list_item(spans, &mut html);
            }
            other => {
                close_list(&mut html, &mut open_list);
                render_block(other, &mut html);
            }
        }
    }
    close_list(&mut html, &mut open_list);

    SANITIZER.clean(&html).to_string()
}

fn switch_list(html: &mut String, open: &mut Option<ListKind>, wanted: ListKind) {
    if *open == Some(wanted) {
        return;
    }
    close_list(html, open);
    html.push_str(wanted.open_tag());
    *open = Some(wanted);
}

fn close_list(html: &mut String, open: &mut Option<ListKind>) {
    if let Some(kind) = open.take() {
        html.push_str(kind.close_tag());
    }
}

fn render_list_item(spans: &[TextSpan], html: &mut String) {
    html.push_str("<li>");
    render_spans(spans, html);
    html.push_str("</li>");
}

fn render_block(node: &RichTextNode, html: &mut String) {
    match node {
        RichTextNode::Paragraph { spans } => {
            html.push_str("<p>");
            render_spans(spans, html);
            html.push_str("</p>");
        }
        RichTextNode::Heading { level, spans } => {
            let level = (*level).clamp(1, 6);
            html.push_str(&format!("<h{level}>"));
            render_spans(spans, html);
            html.push_str(&format!("</h{level}>"));
        }
        RichTextNode::Preformatted { spans } => {
            html.push_str("<pre>");
            render_spans(spans, html);
            html.push_str("</pre>");
        }
        RichTextNode::Image { url, alt } => {
            html.push_str("<img src=\"");
            html.push_str(&ammonia::clean_text(url));
            html.push_str("\" alt=\"");
            html.push_str(&ammonia::clean_text(alt.as_deref().unwrap_or_default()));
            html.push_str("\">");
        }
        RichTextNode::ListItem { .. } | RichTextNode::OrderedListItem { .. } => {
            // List items are handled by the grouping loop above.
        }
    }
}

fn render_spans(spans: &[TextSpan], html: &mut String) {
    for span in spans {
        if let Some(link) = span.link.as_deref() {
            html.push_str("<a href=\"");
            html.push_str(&ammonia::clean_text(link));
            html.push_str("\">");
        }
        for mark in &span.marks {
            html.push_str(mark_open(*mark));
        }
        html.push_str(&ammonia::clean_text(&span.text));
        for mark in span.marks.iter().rev() {
            html.push_str(mark_close(*mark));
        }
        if span.link.is_some() {
            html.push_str("</a>");
        }
    }
}

fn mark_open(mark: SpanMark) -> &'static str {
    match mark {
        SpanMark::Strong => "<strong>",
        SpanMark::Em => "<em>",
        SpanMark::Code => "<code>",
    }
}

fn mark_close(mark: SpanMark) -> &'static str {
    match mark {
        SpanMark::Strong => "</strong>",
        SpanMark::Em => "</em>",
        SpanMark::Code => "</code>",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str) -> RichTextNode {
        RichTextNode::ListItem {
            spans: vec![TextSpan::plain(text)],
        }
    }

    fn ordered_item(text: &str) -> RichTextNode {
        RichTextNode::OrderedListItem {
            spans: vec![TextSpan::plain(text)],
        }
    }

    #[test]
    fn consecutive_list_items_share_one_list() {
        let html = render_document(&[
            item("one"),
            item("two"),
            RichTextNode::Paragraph {
                spans: vec![TextSpan::plain("after")],
            },
        ]);

        assert!(html.contains("<ul><li>one</li><li>two</li></ul>"), "{html}");
        assert!(html.contains("<p>after</p>"), "{html}");
    }

    #[test]
    fn list_kind_change_closes_the_previous_list() {
        let html = render_document(&[item("a"), ordered_item("b"), ordered_item("c")]);

        assert!(html.contains("<ul><li>a</li></ul>"), "{html}");
        assert!(html.contains("<ol><li>b</li><li>c</li></ol>"), "{html}");
    }

    #[test]
    fn trailing_list_is_closed() {
        let html = render_document(&[item("only")]);
        assert!(html.contains("<ul><li>only</li></ul>"), "{html}");
    }

    #[test]
    fn text_content_is_escaped() {
        let html = render_document(&[RichTextNode::Paragraph {
            spans: vec![TextSpan::plain("<script>alert(1)</script>")],
        }]);

        assert!(!html.contains("<script>"), "{html}");
        assert!(html.contains("&lt;script&gt;"), "{html}");
    }

    #[test]
    fn marks_nest_in_order() {
        let html = render_document(&[RichTextNode::Paragraph {
            spans: vec![TextSpan {
                text: "important".to_string(),
                marks: vec![SpanMark::Strong, SpanMark::Em],
                link: None,
            }],
        }]);

        assert!(
            html.contains("<strong><em>important</em></strong>"),
            "{html}"
        );
    }

    #[test]
    fn unsafe_link_schemes_are_stripped() {
        let html = render_document(&[RichTextNode::Paragraph {
            spans: vec![TextSpan {
                text: "click".to_string(),
                marks: Vec::new(),
                link: Some("javascript:alert(1)".to_string()),
            }],
        }]);

        assert!(!html.contains("javascript:"), "{html}");
    }

    #[test]
    fn heading_level_is_clamped_to_h6() {
        let html = render_document(&[RichTextNode::Heading {
            level: 9,
            spans: vec![TextSpan::plain("deep")],
        }]);

        assert!(html.contains("<h6>deep</h6>"), "{html}");
    }

    #[test]
    fn image_renders_src_and_alt() {
        let html = render_document(&[RichTextNode::Image {
            url: "https://example.com/pic.png".to_string(),
            alt: Some("a picture".to_string()),
        }]);

        assert!(html.contains("src=\"https://example.com/pic.png\""), "{html}");
        assert!(html.contains("alt=\"a picture\""), "{html}");
    }
}
