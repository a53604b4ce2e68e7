//! Content-stream tokenizer and selective operator removal.
//!
//! The rewriter walks a decoded page content stream with the PDF
//! content-stream lexical grammar and elides whole operations (operator plus
//! its pending operands) for the requested removal mode. Everything else is
//! copied byte-for-byte, so the surviving structure stays syntactically
//! valid. This is deliberately not a validating parser: malformed input
//! degrades to passing the remainder through unchanged.

use std::collections::HashSet;
use tracing::debug;

/// What to strip from a content stream.
#[derive(Debug, Clone)]
pub enum RemoveMode {
    /// Elide the text-showing operators `Tj`, `'`, `"`, `TJ`.
    Text,
    /// Elide `Do` invocations of image XObjects and inline-image blocks.
    ///
    /// `image_xobjects` holds the resource names known to be images; `None`
    /// means the page resources were unavailable and every `Do` is elided.
    Images {
        image_xobjects: Option<HashSet<String>>,
    },
}

const TEXT_SHOWING_OPERATORS: [&[u8]; 4] = [b"Tj", b"'", b"\"", b"TJ"];

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b'\x0C' | b'\0')
}

fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Operands accumulated since the last operator.
#[derive(Debug, Default, Clone)]
struct PendingOperands {
    start: Option<usize>,
    has_literal_string: bool,
    has_hex_string: bool,
    last_name: Option<String>,
}

impl PendingOperands {
    fn note(&mut self, start: usize) {
        self.start.get_or_insert(start);
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

enum Token {
    Operand,
    Operator { start: usize, end: usize },
    /// Unterminated construct: the rest of the stream is unstructured.
    Tail,
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
    pending: PendingOperands,
}

/// Rewrite a decoded content stream, removing the operations selected by
/// `mode`. `ignore_byte_string_object` makes hex/byte-string text operands
/// count as removable text; without it, text-showing operators whose string
/// operands are all byte strings survive.
pub fn rewrite_content(
    data: &[u8],
    mode: &RemoveMode,
    ignore_byte_string_object: bool,
) -> Vec<u8> {
    let mut scanner = Scanner {
        input: data,
        pos: 0,
        pending: PendingOperands::default(),
    };
    let mut output = Vec::with_capacity(data.len());
    let mut copied_upto = 0usize;

    loop {
        let Some(token) = scanner.next_token() else {
            break;
        };
        match token {
            Token::Operand => {}
            Token::Tail => {
                debug!("malformed content stream: passing remainder through");
                break;
            }
            Token::Operator { start, end } => {
                let keyword = &scanner.input[start..end];
                if keyword == b"BI" {
                    let region_start = scanner.pending.start.unwrap_or(start);
                    match scanner.skip_inline_image() {
                        Some(block_end) => {
                            if matches!(mode, RemoveMode::Images { .. }) {
                                output.extend_from_slice(&data[copied_upto..region_start]);
                                copied_upto = block_end;
                            }
                        }
                        None => {
                            debug!("unterminated inline image: passing remainder through");
                            break;
                        }
                    }
                    scanner.pending.clear();
                    continue;
                }

                let elide = match mode {
                    RemoveMode::Text => {
                        TEXT_SHOWING_OPERATORS.contains(&keyword)
                            && text_operands_removable(
                                &scanner.pending,
                                ignore_byte_string_object,
                            )
                    }
                    RemoveMode::Images { image_xobjects } => {
                        keyword == b"Do"
                            && match (image_xobjects, &scanner.pending.last_name) {
                                (Some(images), Some(name)) => images.contains(name),
                                // Without resource knowledge, or without a
                                // name operand, err on the removal side.
                                _ => true,
                            }
                    }
                };

                if elide {
                    let region_start = scanner.pending.start.unwrap_or(start);
                    output.extend_from_slice(&data[copied_upto..region_start]);
                    copied_upto = end;
                }
                scanner.pending.clear();
            }
        }
    }

    output.extend_from_slice(&data[copied_upto..]);
    output
}

fn text_operands_removable(pending: &PendingOperands, ignore_byte_string_object: bool) -> bool {
    if pending.has_hex_string && !pending.has_literal_string {
        // Byte-string operands only: removable only when the flag says so.
        ignore_byte_string_object
    } else {
        true
    }
}

impl<'a> Scanner<'a> {
    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();
        if self.pos >= self.input.len() {
            return None;
        }

        let start = self.pos;
        let byte = self.input[self.pos];
        match byte {
            b'+' | b'-' | b'.' | b'0'..=b'9' => {
                self.scan_number();
                self.pending.note(start);
                Some(Token::Operand)
            }
            b'(' => {
                if !self.scan_literal_string() {
                    return Some(Token::Tail);
                }
                self.pending.note(start);
                self.pending.has_literal_string = true;
                Some(Token::Operand)
            }
            b'<' => {
                if self.peek(1) == Some(b'<') {
                    let Some((literal, hex)) = self.scan_composite() else {
                        return Some(Token::Tail);
                    };
                    self.pending.note(start);
                    self.pending.has_literal_string |= literal;
                    self.pending.has_hex_string |= hex;
                } else {
                    if !self.scan_hex_string() {
                        return Some(Token::Tail);
                    }
                    self.pending.note(start);
                    self.pending.has_hex_string = true;
                }
                Some(Token::Operand)
            }
            b'[' => {
                let Some((literal, hex)) = self.scan_composite() else {
                    return Some(Token::Tail);
                };
                self.pending.note(start);
                self.pending.has_literal_string |= literal;
                self.pending.has_hex_string |= hex;
                Some(Token::Operand)
            }
            b'/' => {
                let name = self.scan_name();
                self.pending.note(start);
                self.pending.last_name = Some(name);
                Some(Token::Operand)
            }
            b']' | b'>' | b')' | b'{' | b'}' => {
                // Stray delimiter: not ours to repair, pass it through as a
                // one-byte unknown operator.
                self.pos += 1;
                Some(Token::Operator {
                    start,
                    end: self.pos,
                })
            }
            _ => {
                while self.pos < self.input.len()
                    && !is_whitespace(self.input[self.pos])
                    && !is_delimiter(self.input[self.pos])
                {
                    self.pos += 1;
                }
                let keyword = &self.input[start..self.pos];
                if keyword == b"true" || keyword == b"false" || keyword == b"null" {
                    self.pending.note(start);
                    return Some(Token::Operand);
                }
                Some(Token::Operator {
                    start,
                    end: self.pos,
                })
            }
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.input.len() {
            let byte = self.input[self.pos];
            if is_whitespace(byte) {
                self.pos += 1;
            } else if byte == b'%' {
                while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self) {
        if matches!(self.input[self.pos], b'+' | b'-') {
            self.pos += 1;
        }
        while self.pos < self.input.len() && matches!(self.input[self.pos], b'0'..=b'9' | b'.') {
            self.pos += 1;
        }
    }

    /// Balanced-parenthesis literal string with backslash escapes.
    /// Returns false when the string never terminates.
    fn scan_literal_string(&mut self) -> bool {
        self.pos += 1; // opening '('
        let mut depth = 1usize;
        let mut escape = false;
        while self.pos < self.input.len() {
            let byte = self.input[self.pos];
            self.pos += 1;
            if escape {
                escape = false;
                continue;
            }
            match byte {
                b'\\' => escape = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn scan_hex_string(&mut self) -> bool {
        self.pos += 1; // opening '<'
        while self.pos < self.input.len() {
            if self.input[self.pos] == b'>' {
                self.pos += 1;
                return true;
            }
            self.pos += 1;
        }
        false
    }

    /// Array or inline dictionary consumed as one operand, skipping nested
    /// strings so delimiters inside them do not count. Returns the string
    /// flags seen inside, or `None` when unterminated.
    fn scan_composite(&mut self) -> Option<(bool, bool)> {
        let mut depth = 0usize;
        let mut has_literal = false;
        let mut has_hex = false;

        while self.pos < self.input.len() {
            let byte = self.input[self.pos];
            match byte {
                b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b']' => {
                    depth = depth.saturating_sub(1);
                    self.pos += 1;
                    if depth == 0 {
                        return Some((has_literal, has_hex));
                    }
                }
                b'<' => {
                    if self.peek(1) == Some(b'<') {
                        depth += 1;
                        self.pos += 2;
                    } else {
                        if !self.scan_hex_string() {
                            return None;
                        }
                        has_hex = true;
                    }
                }
                b'>' => {
                    if self.peek(1) == Some(b'>') {
                        depth = depth.saturating_sub(1);
                        self.pos += 2;
                        if depth == 0 {
                            return Some((has_literal, has_hex));
                        }
                    } else {
                        self.pos += 1;
                    }
                }
                b'(' => {
                    if !self.scan_literal_string() {
                        return None;
                    }
                    has_literal = true;
                }
                b'%' => {
                    while self.pos < self.input.len() && self.input[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                _ => self.pos += 1,
            }
        }
        None
    }

    fn scan_name(&mut self) -> String {
        self.pos += 1; // '/'
        let start = self.pos;
        while self.pos < self.input.len() {
            let byte = self.input[self.pos];
            if is_whitespace(byte) || is_delimiter(byte) {
                break;
            }
            self.pos += 1;
        }
        decode_name(&self.input[start..self.pos])
    }

    /// Position is just past the `BI` keyword. Tokenize the image dictionary
    /// up to `ID`, then raw-scan for the `EI` terminator; the binary payload
    /// between them is not token-structured.
    fn skip_inline_image(&mut self) -> Option<usize> {
        loop {
            self.skip_whitespace_and_comments();
            if self.pos >= self.input.len() {
                return None;
            }
            match self.next_token()? {
                Token::Tail => return None,
                Token::Operator { start, end } if &self.input[start..end] == b"ID" => break,
                _ => {}
            }
        }
        // One whitespace byte separates ID from the payload.
        if self.pos < self.input.len() && is_whitespace(self.input[self.pos]) {
            self.pos += 1;
        }
        let mut i = self.pos;
        while i + 1 < self.input.len() {
            if self.input[i] == b'E'
                && self.input[i + 1] == b'I'
                && (i == 0 || is_whitespace(self.input[i - 1]))
                && (i + 2 >= self.input.len()
                    || is_whitespace(self.input[i + 2])
                    || is_delimiter(self.input[i + 2]))
            {
                self.pos = i + 2;
                return Some(self.pos);
            }
            i += 1;
        }
        None
    }
}

/// Decode a name token, expanding `#xx` escapes (ISO 32000-1 §7.3.5).
fn decode_name(bytes: &[u8]) -> String {
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' {
            if let Some(hex) = bytes.get(i + 1..i + 3) {
                if let Ok(value) = u8::from_str_radix(std::str::from_utf8(hex).unwrap_or(""), 16) {
                    result.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        result.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&result).into_owned()
}
