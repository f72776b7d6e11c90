//! Quotation-aware body reconstruction
//!
//! A post body may embed nested quote blocks. Linearizing the body to plain
//! text must keep reading order while preserving who was quoted and which
//! post the quote refers to. The approach mirrors the markup structure:
//!
//! 1. Serialize each quote block and replace its markup with a unique
//!    placeholder token inside the body HTML.
//! 2. Linearize the modified body to plain text.
//! 3. Substitute each placeholder with a self-delimiting annotation of the
//!    form `<quote author="X" post_id="Y">quoted text</quote>`, surrounded
//!    by line breaks.
//!
//! The resulting annotation grammar is exactly what
//! [`crate::graph::extract_reply_edges`] consumes.

use super::PageParser;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use unicode_normalization::UnicodeNormalization;

static INLINE_WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").expect("invalid regex"));
static BLANK_LINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("invalid regex"));

/// Normalizes extracted text: Unicode NFC, runs of non-newline whitespace
/// collapsed to one space, runs of 3+ newlines collapsed to exactly two,
/// then trimmed.
pub fn normalize_text(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let collapsed = INLINE_WS_RE.replace_all(&composed, " ");
    let collapsed = BLANK_LINES_RE.replace_all(&collapsed, "\n\n");
    collapsed.trim().to_string()
}

impl PageParser {
    /// Linearizes a post body to annotated plain text
    ///
    /// Returns an empty string when the post has no body element.
    pub(crate) fn reconstruct_body(&self, body: Option<ElementRef>) -> String {
        let Some(body) = body else {
            return String::new();
        };

        let quote_blocks: Vec<ElementRef> = body.select(&self.quote_block).collect();

        let mut annotations = Vec::with_capacity(quote_blocks.len());
        for block in &quote_blocks {
            annotations.push(self.quote_annotation(*block));
        }

        // Swap each quote block's markup for a placeholder, then linearize.
        // Both strings come from the same serializer over the same tree, so
        // the subtree markup occurs verbatim inside the body markup.
        let mut modified_html = body.html();
        for (idx, block) in quote_blocks.iter().enumerate() {
            modified_html = modified_html.replace(&block.html(), &placeholder(idx));
        }

        let fragment = Html::parse_fragment(&modified_html);
        let mut text = fragment
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join(" ");

        for (idx, annotation) in annotations.iter().enumerate() {
            text = text.replace(&placeholder(idx), &format!("\n{annotation}\n"));
        }

        normalize_text(&text)
    }

    /// Builds the `<quote …>…</quote>` annotation for one quote block
    ///
    /// The quoted author comes from the block's `data-quote` attribute and
    /// the back-reference from a `post: <digits>` pattern inside
    /// `data-source`; either may be absent independently.
    fn quote_annotation(&self, block: ElementRef) -> String {
        let author = block.value().attr("data-quote").unwrap_or("").trim();
        let source_raw = block.value().attr("data-source").unwrap_or("");
        let quoted_post_id = self
            .quoted_post_id_re
            .captures(source_raw)
            .map(|c| c[1].to_string());

        // Prefer the expanded content node; collapsed quotes only carry it
        // in .bbCodeBlock-content.
        let content = block
            .select(&self.quote_expanded)
            .next()
            .or_else(|| block.select(&self.quote_content).next());
        let quote_text = content
            .map(|el| normalize_text(&el.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        let mut attrs = String::new();
        if !author.is_empty() {
            attrs.push_str(&format!(" author=\"{author}\""));
        }
        if let Some(pid) = &quoted_post_id {
            attrs.push_str(&format!(" post_id=\"{pid}\""));
        }

        format!("<quote{attrs}>{quote_text}</quote>")
    }
}

fn placeholder(idx: usize) -> String {
    format!("__QUOTE_PLACEHOLDER_{idx}__")
}
