//! Rich-text documents as delivered by the content API: a flat sequence of
//! tagged nodes rather than pre-rendered HTML. Unknown node kinds fail
//! deserialization outright so silently dropped content cannot happen.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RichTextNode {
    Paragraph {
        #[serde(default)]
        spans: Vec<TextSpan>,
    },
    Heading {
        level: u8,
        #[serde(default)]
        spans: Vec<TextSpan>,
    },
    ListItem {
        #[serde(default)]
        spans: Vec<TextSpan>,
    },
    OrderedListItem {
        #[serde(default)]
        spans: Vec<TextSpan>,
    },
    Preformatted {
        #[serde(default)]
        spans: Vec<TextSpan>,
    },
    Image {
        url: String,
        #[serde(default)]
        alt: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TextSpan {
    pub text: String,
    #[serde(default)]
    pub marks: Vec<SpanMark>,
    #[serde(default)]
    pub link: Option<String>,
}

impl TextSpan {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Vec::new(),
            link: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanMark {
    Strong,
    Em,
    Code,
}

impl RichTextNode {
    /// Text spans carried by this node; images carry none.
    pub fn spans(&self) -> &[TextSpan] {
        match self {
            RichTextNode::Paragraph { spans }
            | RichTextNode::Heading { spans, .. }
            | RichTextNode::ListItem { spans }
            | RichTextNode::OrderedListItem { spans }
            | RichTextNode::Preformatted { spans } => spans,
            RichTextNode::Image { .. } => &[],
        }
    }
}

/// Flatten a document into plain text, span texts joined by single spaces.
pub fn as_text(nodes: &[RichTextNode]) -> String {
    let mut parts = Vec::new();
    for node in nodes {
        for span in node.spans() {
            let trimmed = span.text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
    }
    parts.join(" ")
}

pub fn word_count(nodes: &[RichTextNode]) -> usize {
    nodes
        .iter()
        .flat_map(|node| node.spans())
        .map(|span| span.text.split_whitespace().count())
        .sum()
}
