//! Run-fragmentation repair and low-level span scanning for Word markup.
//!
//! Authoring tools split what looks like one word of text into many
//! adjacent runs and sprinkle revision-tracking noise across them. This
//! crate reconstructs contiguous text so a directive like `${foo}` survives
//! even when the source XML splits it as `<w:r><w:t>${fo</w:t></w:r><w:r><w:t>o}</w:t></w:r>`.
//!
//! It deliberately does not build a DOM: the rewrites needed (attribute
//! stripping, run merging, empty-run deletion, table-row detection) are all
//! expressible as a flat token scan over `<tag>`/text spans.

mod scan;

pub use scan::{Piece, local_name, tokenize};

const STRIPPED_ATTR_PREFIXES: &[&str] = &["rsid", "w:rsid"];
const STRIPPED_ATTR_NAMES: &[&str] = &["paraId", "w:paraId", "w14:paraId", "textId", "w:textId"];

/// Strip revision-tracking/proofing attributes and remove proofing-error
/// markers, merge split runs to a fixed point, and delete now-empty runs.
pub fn normalize(xml: &str, max_merge_iterations: u32) -> String {
    let pieces = tokenize(xml);
    let pieces = strip_attrs(pieces);
    let pieces = remove_proof_errors(pieces);
    let pieces = merge_runs(pieces, max_merge_iterations);
    let pieces = remove_empty_runs(pieces);
    render(&pieces)
}

fn render(pieces: &[Piece]) -> String {
    let mut out = String::new();
    for p in pieces {
        out.push_str(p.as_str());
    }
    out
}

fn is_stripped_attr(name: &str) -> bool {
    STRIPPED_ATTR_PREFIXES
        .iter()
        .any(|p| name.eq_ignore_ascii_case(p) || name.to_ascii_lowercase().starts_with(p))
        || STRIPPED_ATTR_NAMES.iter().any(|n| name.eq_ignore_ascii_case(n))
}

fn strip_attrs(pieces: Vec<Piece>) -> Vec<Piece> {
    pieces
        .into_iter()
        .map(|p| match p {
            Piece::Tag(raw) => {
                let name = local_name(&raw);
                if name.eq_ignore_ascii_case("r") || name.eq_ignore_ascii_case("p") {
                    Piece::Tag(scan::rewrite_without_attrs(&raw, is_stripped_attr))
                } else {
                    Piece::Tag(raw)
                }
            }
            other => other,
        })
        .collect()
}

/// Remove `<w:proofErr .../>` markers (self-closing) and paired
/// `<w:proofErr ...></w:proofErr>` wrappers, keeping any content between.
fn remove_proof_errors(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut out = Vec::with_capacity(pieces.len());
    let mut i = 0;
    while i < pieces.len() {
        if let Piece::Tag(raw) = &pieces[i] {
            if local_name(raw).eq_ignore_ascii_case("proofErr") {
                if scan::is_self_closing(raw) {
                    i += 1;
                    continue;
                }
                if scan::is_start_tag(raw) {
                    // drop the opener, and the matching close if found immediately adjacent.
                    if let Some(Piece::Tag(next)) = pieces.get(i + 1) {
                        if scan::is_end_tag(next) && local_name(next).eq_ignore_ascii_case("proofErr") {
                            i += 2;
                            continue;
                        }
                    }
                    i += 1;
                    continue;
                }
            }
        }
        out.push(pieces[i].clone());
        i += 1;
    }
    out
}

/// Merge a seam shaped "end-text, end-run, start-run, start-text" by
/// dropping the four intervening tags, iterating to a fixed point.
fn merge_runs(mut pieces: Vec<Piece>, max_iterations: u32) -> Vec<Piece> {
    for _ in 0..max_iterations {
        let mut changed = false;
        let mut out = Vec::with_capacity(pieces.len());
        let mut i = 0;
        while i < pieces.len() {
            if i + 3 < pieces.len() && is_merge_seam(&pieces[i..i + 4]) {
                i += 4;
                changed = true;
                continue;
            }
            out.push(pieces[i].clone());
            i += 1;
        }
        pieces = out;
        if !changed {
            break;
        }
    }
    pieces
}

fn is_merge_seam(window: &[Piece]) -> bool {
    let tags: Vec<&str> = window
        .iter()
        .filter_map(|p| match p {
            Piece::Tag(raw) => Some(raw.as_str()),
            _ => None,
        })
        .collect();
    if tags.len() != 4 {
        return false;
    }
    scan::is_end_tag(tags[0])
        && local_name(tags[0]).eq_ignore_ascii_case("t")
        && scan::is_end_tag(tags[1])
        && local_name(tags[1]).eq_ignore_ascii_case("r")
        && scan::is_start_tag(tags[2])
        && local_name(tags[2]).eq_ignore_ascii_case("r")
        && scan::is_start_tag(tags[3])
        && local_name(tags[3]).eq_ignore_ascii_case("t")
}

/// Delete `<w:r ...></w:r>` runs that no longer wrap any text, including
/// runs left holding only an empty `<w:t></w:t>`.
fn remove_empty_runs(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut out = Vec::with_capacity(pieces.len());
    let mut i = 0;
    while i < pieces.len() {
        if let Piece::Tag(raw) = &pieces[i] {
            if scan::is_start_tag(raw) && local_name(raw).eq_ignore_ascii_case("r") {
                if let Some(end_idx) = matching_end(&pieces, i, "r") {
                    if run_is_empty(&pieces[i + 1..end_idx]) {
                        i = end_idx + 1;
                        continue;
                    }
                }
            }
        }
        out.push(pieces[i].clone());
        i += 1;
    }
    out
}

fn run_is_empty(inner: &[Piece]) -> bool {
    inner.iter().all(|p| match p {
        Piece::Text(t) => t.trim().is_empty(),
        Piece::Tag(raw) => {
            let name = local_name(raw);
            // run properties and empty <w:t/> leaves don't count as content
            name.eq_ignore_ascii_case("rPr")
                || (name.eq_ignore_ascii_case("t") && scan::is_self_closing(raw))
        }
    })
}

fn matching_end(pieces: &[Piece], start: usize, name: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (offset, piece) in pieces.iter().enumerate().skip(start) {
        if let Piece::Tag(raw) = piece {
            if local_name(raw).eq_ignore_ascii_case(name) {
                if scan::is_self_closing(raw) {
                    continue;
                }
                if scan::is_start_tag(raw) {
                    depth += 1;
                } else if scan::is_end_tag(raw) {
                    depth -= 1;
                    if depth == 0 {
                        return Some(offset);
                    }
                }
            }
        }
    }
    None
}

/// Escape text for inclusion in XML content (not attribute values).
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Find byte spans of every `<w:tr ...>...</w:tr>` element (namespace-
/// prefix tolerant) in `xml`, returning `(start, end)` exclusive ranges
/// covering the whole element including its tags.
pub fn find_table_rows(xml: &str) -> Vec<(usize, usize)> {
    let pieces = scan::tokenize_with_spans(xml);
    let mut rows = Vec::new();
    let mut i = 0;
    while i < pieces.len() {
        let (span, piece) = &pieces[i];
        if let Piece::Tag(raw) = piece {
            if scan::is_start_tag(raw) && local_name(raw).eq_ignore_ascii_case("tr") {
                if let Some(end_idx) = matching_end(
                    &pieces.iter().map(|(_, p)| p.clone()).collect::<Vec<_>>(),
                    i,
                    "tr",
                ) {
                    let end_span = &pieces[end_idx].0;
                    rows.push((span.0, end_span.1));
                    i = end_idx + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    rows
}

/// Concatenate the text-leaf content inside a byte span of XML.
pub fn text_content_in(xml: &str, start: usize, end: usize) -> String {
    let slice = &xml[start..end];
    let pieces = tokenize(slice);
    let mut out = String::new();
    for p in pieces {
        if let Piece::Text(t) = p {
            out.push_str(&t);
        }
    }
    out
}

/// Remove whole `<w:tr>...</w:tr>` elements whose text content is blank.
pub fn strip_empty_rows(xml: &str) -> String {
    let rows = find_table_rows(xml);
    if rows.is_empty() {
        return xml.to_string();
    }
    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for (start, end) in rows {
        if text_content_in(xml, start, end).trim().is_empty() {
            out.push_str(&xml[cursor..start]);
            cursor = end;
        }
    }
    out.push_str(&xml[cursor..]);
    out
}
