//! Comment and literal scrubbing.
//!
//! Every byte inside a comment, string, char or raw-string literal (delimiters
//! included) is overwritten with [`SCRUB_FILLER`]. Line breaks are kept, so the
//! scrubbed text has the same length, line count and byte offsets as the
//! original. Spans are found by a single left-to-right scan where the first
//! matching opener wins; an unterminated span runs to the end of the input.

use log::trace;

use crate::{constants::SCRUB_FILLER, dialect::DialectRules};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubbedText {
    text: String,
    original_len: usize,
}

impl ScrubbedText {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in bytes of the text that was scrubbed; always equal to `as_str().len()`.
    pub fn original_len(&self) -> usize {
        self.original_len
    }

    /// Lines without their terminators, aligned 1:1 with `str::split('\n')`
    /// of the original text.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        split_lines(&self.text)
    }
}

/// Splits on `\n` and drops a trailing `\r`, keeping a final empty line so the
/// scrubbed and original line sequences always zip without drift.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|line| line.strip_suffix('\r').unwrap_or(line))
}

pub fn scrub(text: &str, rules: &DialectRules) -> ScrubbedText {
    let src = text.as_bytes();
    let mut out = src.to_vec();
    let len = src.len();
    let (block_open, block_close) = rules.block_comment;
    let line_comment = rules.line_comment.as_bytes();
    let block_open = block_open.as_bytes();
    let block_close = block_close.as_bytes();

    let mut i = 0;
    let mut spans = 0usize;
    while i < len {
        let end = if src[i..].starts_with(line_comment) {
            src[i..].iter().position(|&b| b == b'\n').map_or(len, |p| i + p)
        } else if src[i..].starts_with(block_open) {
            block_comment_end(src, i, block_open, block_close, rules.nested_block_comments)
        } else if let Some(triple) = rules.triple_quote
            && src[i..].starts_with(b"\"\"\"")
        {
            triple_quote_end(src, i, triple.escapes)
        } else if src[i] == rules.string_quote || src[i] == rules.char_quote {
            quoted_end(src, i)
        } else {
            i += 1;
            continue;
        };

        blank(&mut out[i..end]);
        spans += 1;
        i = end;
    }
    trace!("Scrubbed {} spans from {} bytes of {} source", spans, len, rules.name);

    // Spans start and end on ASCII delimiters or at EOF, and every byte inside
    // becomes ASCII, so the buffer stays valid UTF-8.
    let text = match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    };
    ScrubbedText { text, original_len: len }
}

fn blank(span: &mut [u8]) {
    for b in span.iter_mut() {
        if *b != b'\n' && *b != b'\r' {
            *b = SCRUB_FILLER;
        }
    }
}

fn block_comment_end(src: &[u8], start: usize, open: &[u8], close: &[u8], nested: bool) -> usize {
    let len = src.len();
    let mut depth = 1usize;
    let mut j = start + open.len();
    while j < len {
        if nested && src[j..].starts_with(open) {
            depth += 1;
            j += open.len();
        } else if src[j..].starts_with(close) {
            depth -= 1;
            j += close.len();
            if depth == 0 {
                return j;
            }
        } else {
            j += 1;
        }
    }
    len
}

fn triple_quote_end(src: &[u8], start: usize, escapes: bool) -> usize {
    let len = src.len();
    let mut j = start + 3;
    while j < len {
        if escapes && src[j] == b'\\' {
            j += 2;
        } else if src[j..].starts_with(b"\"\"\"") {
            j += 3;
            // `""""` closes on the last three quotes
            while j < len && src[j] == b'"' {
                j += 1;
            }
            return j;
        } else {
            j += 1;
        }
    }
    len
}

fn quoted_end(src: &[u8], start: usize) -> usize {
    let len = src.len();
    let quote = src[start];
    let mut j = start + 1;
    while j < len {
        match src[j] {
            b'\\' => j += 2,
            b if b == quote => return j + 1,
            _ => j += 1,
        }
    }
    len
}
