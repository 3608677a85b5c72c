//! Rope-backed text buffer with LSP position mapping.
//!
//! Positions on the wire are UTF-16 code units; the rope keeps the
//! line/char/UTF-16 conversion tables consistent with the text by
//! construction. Incremental edit batches are applied right to left so the
//! earlier offsets in the batch stay valid.

use std::ops::Range as ByteRange;

use ropey::Rope;
use tower_lsp::lsp_types::{Position, Range};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer {
    rope: Rope,
}

/// One incremental edit: replace `range` with `new_text`.
pub type Edit = (Range, String);

impl TextBuffer {
    pub fn new(text: &str) -> TextBuffer {
        TextBuffer {
            rope: Rope::from_str(text),
        }
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    pub fn len_lines(&self) -> usize {
        self.rope.len_lines()
    }

    /// The text of one line, including its trailing newline if present.
    pub fn line_text(&self, line: usize) -> Option<String> {
        (line < self.rope.len_lines()).then(|| self.rope.line(line).to_string())
    }

    /// Converts an LSP position to a char offset, clamping out-of-range
    /// positions to the end of the line or buffer.
    pub fn position_to_char(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return self.rope.len_chars();
        }

        let line_slice = self.rope.line(line);
        let cu = (position.character as usize).min(line_slice.len_utf16_cu());

        self.rope.line_to_char(line) + line_slice.utf16_cu_to_char(cu)
    }

    pub fn char_to_position(&self, char_idx: usize) -> Position {
        let char_idx = char_idx.min(self.rope.len_chars());
        let line = self.rope.char_to_line(char_idx);
        let line_start = self.rope.line_to_char(line);
        let character = self.rope.line(line).char_to_utf16_cu(char_idx - line_start);

        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    /// Converts a byte span (e.g. a regex match) to an LSP range.
    pub fn byte_range_to_range(&self, bytes: ByteRange<usize>) -> Range {
        Range {
            start: self.char_to_position(self.rope.byte_to_char(bytes.start)),
            end: self.char_to_position(self.rope.byte_to_char(bytes.end)),
        }
    }

    /// The range spanning the whole buffer, line aware: the end position
    /// sits on the line after a trailing newline.
    pub fn full_range(&self) -> Range {
        Range {
            start: Position {
                line: 0,
                character: 0,
            },
            end: self.char_to_position(self.rope.len_chars()),
        }
    }

    pub fn slice(&self, range: Range) -> String {
        let start = self.position_to_char(range.start);
        let end = self.position_to_char(range.end);

        self.rope.slice(start.min(end)..end.max(start)).to_string()
    }

    /// Applies an ordered batch of non-overlapping edits, producing a new
    /// buffer. The result equals sequential application of the edits; the
    /// batch contract (sorted by start, non-overlapping) is the caller's,
    /// and violating it is an [`Error::InvalidEdit`].
    pub fn apply_edits(&self, edits: &[Edit]) -> Result<TextBuffer> {
        for (range, _) in edits {
            if position_le(range.end, range.start) && range.start != range.end {
                return Err(Error::InvalidEdit(format!(
                    "edit range ends before it starts: {:?}",
                    range
                )));
            }
        }

        for pair in edits.windows(2) {
            let (first, second) = (&pair[0].0, &pair[1].0);
            if !position_le(first.end, second.start) {
                return Err(Error::InvalidEdit(format!(
                    "edits overlap or are unsorted: {:?} then {:?}",
                    first, second
                )));
            }
        }

        let mut rope = self.rope.clone();
        for (range, new_text) in edits.iter().rev() {
            let start = self.position_to_char(range.start);
            let end = self.position_to_char(range.end);

            rope.remove(start..end);
            rope.insert(start, new_text);
        }

        Ok(TextBuffer { rope })
    }
}

fn position_le(a: Position, b: Position) -> bool {
    (a.line, a.character) <= (b.line, b.character)
}
