// src/source/parser.rs
//! Notice board markup → `NoticeEntry` list.
//!
//! The board renders announcements as `<ul class="board-basic"><li><dl>…</dl></li>…</ul>`.
//! Each `dl` block is one notice:
//! - the first anchor's `onclick` carries the id as its first single-quoted token
//!   (`jf_view('12345')`),
//! - the anchor text is the title,
//! - the second `span.p_hide` is the publication date.
//!
//! The page is parsed into a DOM, so rows may contain their own lists or
//! nested markup without disturbing the blocks around them.

use std::collections::HashSet;

use kuchiki::traits::*;
use kuchiki::NodeRef;
use metrics::counter;

use crate::error::ParseError;
use crate::notice::NoticeEntry;

const BLOCK_SELECTOR: &str = "ul.board-basic li > dl";
const DATE_SELECTOR: &str = "span.p_hide";
const DATE_SPAN_INDEX: usize = 1;

/// Parse every announcement block on the page.
///
/// Blocks that fail to parse are logged and skipped. Ids are unique in the
/// result: the first occurrence in page order wins. Order is page order, not
/// sorted by id.
pub fn parse_notices(markup: &str, view_base_url: &str) -> Vec<NoticeEntry> {
    let document = kuchiki::parse_html().one(markup);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for (idx, block) in notice_blocks(&document).iter().enumerate() {
        match parse_block(block, view_base_url) {
            Ok(entry) => {
                if !seen.insert(entry.id) {
                    tracing::debug!(id = entry.id, "duplicate notice row ignored");
                    continue;
                }
                out.push(entry);
            }
            Err(e) => {
                tracing::error!(block = idx, error = %e, "skipping unparsable notice block");
                counter!("relay_parse_errors_total").increment(1);
            }
        }
    }

    counter!("relay_notices_parsed_total").increment(out.len() as u64);
    out
}

/// Every `ul.board-basic li > dl` element, in document order.
pub fn notice_blocks(document: &NodeRef) -> Vec<NodeRef> {
    match document.select(BLOCK_SELECTOR) {
        Ok(blocks) => blocks.map(|dl| dl.as_node().clone()).collect(),
        Err(()) => Vec::new(),
    }
}

/// Parse a single `dl` block.
pub fn parse_block(block: &NodeRef, view_base_url: &str) -> Result<NoticeEntry, ParseError> {
    let anchor = block.select_first("a").map_err(|_| ParseError::MissingLink)?;

    let id = {
        let attrs = anchor.attributes.borrow();
        notice_id(attrs.get("onclick").ok_or(ParseError::MissingIdentifier)?)?
    };

    let title = text_of(anchor.as_node());
    if title.is_empty() {
        return Err(ParseError::EmptyTitle { id });
    }

    let date = block
        .select(DATE_SELECTOR)
        .map_err(|_| ParseError::MissingDate { id })?
        .nth(DATE_SPAN_INDEX)
        .map(|span| text_of(span.as_node()))
        .ok_or(ParseError::MissingDate { id })?;

    Ok(NoticeEntry::new(id, title, date, view_base_url))
}

fn notice_id(onclick: &str) -> Result<u64, ParseError> {
    let token = onclick
        .split('\'')
        .nth(1)
        .ok_or(ParseError::MissingIdentifier)?
        .trim();

    match token.parse::<u64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ParseError::InvalidIdentifier(token.to_string())),
    }
}

/// Text content with entities already decoded by the parser, trimmed.
fn text_of(node: &NodeRef) -> String {
    node.text_contents().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://board.test/view?id=";

    fn block(onclick: &str, title: &str, date: &str) -> String {
        format!(
            r##"<dt><a href="#none" onclick="{onclick}">{title}</a></dt>
               <dd><span class="p_hide">작성자</span><span class="p_hide">{date}</span></dd>"##
        )
    }

    /// The `dl` element parsed from `inner`.
    fn dl(inner: &str) -> NodeRef {
        let document = kuchiki::parse_html().one(format!("<dl>{inner}</dl>"));
        document.select_first("dl").unwrap().as_node().clone()
    }

    fn ids(entries: &[NoticeEntry]) -> Vec<u64> {
        entries.iter().map(|n| n.id).collect()
    }

    #[test]
    fn parses_id_title_and_second_date_span() {
        let b = block(
            "jf_view('1234');",
            "  <b>Exam</b> schedule &amp; rooms ",
            "2024.05.02",
        );
        let n = parse_block(&dl(&b), BASE).unwrap();
        assert_eq!(n.id, 1234);
        assert_eq!(n.title, "Exam schedule & rooms");
        assert_eq!(n.date, "2024.05.02");
        assert_eq!(n.link, "https://board.test/view?id=1234");
    }

    #[test]
    fn non_numeric_identifier_is_rejected() {
        let b = block("jf_view('abc');", "Title", "2024.05.02");
        assert_eq!(
            parse_block(&dl(&b), BASE),
            Err(ParseError::InvalidIdentifier("abc".into()))
        );
    }

    #[test]
    fn zero_identifier_is_rejected() {
        let b = block("jf_view(' 0 ');", "Title", "2024.05.02");
        assert_eq!(
            parse_block(&dl(&b), BASE),
            Err(ParseError::InvalidIdentifier("0".into()))
        );
    }

    #[test]
    fn missing_onclick_is_missing_identifier() {
        let b = r#"<dt><a href="/x">Title</a></dt><dd><span class="p_hide">a</span><span class="p_hide">b</span></dd>"#;
        assert_eq!(parse_block(&dl(b), BASE), Err(ParseError::MissingIdentifier));
    }

    #[test]
    fn block_without_anchor_is_missing_link() {
        let b = r#"<dt>Title</dt><dd><span class="p_hide">a</span><span class="p_hide">b</span></dd>"#;
        assert_eq!(parse_block(&dl(b), BASE), Err(ParseError::MissingLink));
    }

    #[test]
    fn single_date_span_is_missing_date() {
        let b = r#"<dt><a onclick="jf_view('5')">Title</a></dt><dd><span class="p_hide">only</span></dd>"#;
        assert_eq!(
            parse_block(&dl(b), BASE),
            Err(ParseError::MissingDate { id: 5 })
        );
    }

    #[test]
    fn blank_title_is_rejected() {
        let b = block("jf_view('9')", "   ", "2024.01.01");
        assert_eq!(
            parse_block(&dl(&b), BASE),
            Err(ParseError::EmptyTitle { id: 9 })
        );
    }

    #[test]
    fn only_board_list_blocks_are_read() {
        let page = format!(
            r#"<ul class="menu"><li><dl>{}</dl></li></ul>
               <ul class="board-basic type2"><li><dl>{}</dl></li></ul>"#,
            block("jf_view('1')", "Menu", "2024.01.01"),
            block("jf_view('2')", "Board", "2024.01.02"),
        );
        assert_eq!(ids(&parse_notices(&page, BASE)), vec![2]);
    }

    #[test]
    fn duplicates_keep_first_occurrence_in_page_order() {
        let page = format!(
            r#"<ul class="board-basic">
                 <li><dl>{}</dl></li><li><dl>{}</dl></li><li><dl>{}</dl></li>
               </ul>"#,
            block("jf_view('20')", "Pinned", "2024.01.01"),
            block("jf_view('21')", "Other", "2024.01.02"),
            block("jf_view('20')", "Pinned again", "2024.01.03"),
        );
        let out = parse_notices(&page, BASE);
        assert_eq!(ids(&out), vec![20, 21]);
        assert_eq!(out[0].title, "Pinned");
    }

    #[test]
    fn bad_block_does_not_stop_the_page() {
        let page = format!(
            r#"<ul class="board-basic"><li><dl>{}</dl></li><li><dl>{}</dl></li></ul>"#,
            block("jf_view('x')", "Broken", "2024.01.01"),
            block("jf_view('3')", "Fine", "2024.01.02"),
        );
        assert_eq!(ids(&parse_notices(&page, BASE)), vec![3]);
    }

    #[test]
    fn attachment_list_inside_a_row_keeps_later_rows() {
        let page = format!(
            r#"<ul class="board-basic">
                 <li><dl>{}<dd><ul class="file-list"><li>a.pdf</li><li>b.hwp</li></ul></dd></dl></li>
                 <li><dl>{}</dl></li>
                 <li><dl>{}</dl></li>
               </ul>"#,
            block("jf_view('1')", "With files", "2024.01.01"),
            block("jf_view('2')", "Second", "2024.01.02"),
            block("jf_view('3')", "Third", "2024.01.03"),
        );
        let out = parse_notices(&page, BASE);
        assert_eq!(ids(&out), vec![1, 2, 3]);
        assert_eq!(out[0].title, "With files");
        assert_eq!(out[0].date, "2024.01.01");
    }

    #[test]
    fn nested_list_items_do_not_hide_their_row() {
        let page = format!(
            r#"<ul class="board-basic">
                 <li><dl>{}<dd><ol><li>a.pdf</li></ol></dd></dl></li>
                 <li><dl>{}</dl></li>
               </ul>"#,
            block("jf_view('1')", "First", "2024.01.01"),
            block("jf_view('2')", "Second", "2024.01.02"),
        );
        assert_eq!(ids(&parse_notices(&page, BASE)), vec![1, 2]);
    }

    #[test]
    fn markup_inside_title_and_date_is_flattened() {
        let b = block(
            "jf_view('77')",
            "<span class=\"ico\">공지</span> <em>Dorm</em> move-in",
            "<strong>2024.02.28</strong>",
        );
        let n = parse_block(&dl(&b), BASE).unwrap();
        assert_eq!(n.title, "공지 Dorm move-in");
        assert_eq!(n.date, "2024.02.28");
    }
}
