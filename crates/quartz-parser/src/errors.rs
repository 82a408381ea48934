//! Diagnostic collection and rendering.
//!
//! Diagnostics accumulate in per-file buckets during parsing and are
//! re-rendered from the source bytes at emit time. Rendering prints the
//! offending line with a `~~~^` underline and the message below it.

use std::io::Write;

use quartz_common::con::Styler;
use quartz_common::error::Result;
use quartz_common::files::{FileQueue, InputFileId};
use quartz_common::token::Token;
use quartz_lexer::Lexer;
use rustc_hash::FxHashMap;

/// One stored diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub pos: u32,
    pub line: u32,
    pub is_warning: bool,
}

/// Accumulates diagnostics keyed by input file. Append-only during
/// parsing; fully consumed by [`ErrorCollector::emit`].
#[derive(Debug, Default)]
pub struct ErrorCollector {
    buckets: FxHashMap<InputFileId, Vec<Diagnostic>>,
    /// File ids in first-diagnostic order, for deterministic emission.
    order: Vec<InputFileId>,
    error_count: u32,
    warning_count: u32,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_error(&mut self, msg: impl Into<String>, file: InputFileId, pos: u32, line: u32) {
        assert!(line != 0, "diagnostics carry 1-based lines");
        self.error_count += 1;
        self.store(file, Diagnostic {
            message: msg.into(),
            pos,
            line,
            is_warning: false,
        });
    }

    pub fn store_warning(&mut self, msg: impl Into<String>, file: InputFileId, pos: u32, line: u32) {
        assert!(line != 0, "diagnostics carry 1-based lines");
        self.warning_count += 1;
        self.store(file, Diagnostic {
            message: msg.into(),
            pos,
            line,
            is_warning: true,
        });
    }

    fn store(&mut self, file: InputFileId, diag: Diagnostic) {
        if !self.buckets.contains_key(&file) {
            self.order.push(file);
        }
        self.buckets.entry(file).or_default().push(diag);
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Diagnostics stored for one file, in insertion order.
    pub fn for_file(&self, file: InputFileId) -> &[Diagnostic] {
        self.buckets.get(&file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Render a diagnostic immediately from the lexer's buffer, at the
    /// supplied token or at the lexer's current token.
    pub fn display_error(
        msg: &str,
        lexer: &Lexer,
        tok: Option<&Token>,
        out: &mut dyn Write,
        is_warning: bool,
        styler: Styler,
    ) {
        let current = lexer.current();
        let tok = tok.unwrap_or(&current);
        render(
            msg,
            lexer.file_name(),
            lexer.bytes(),
            out,
            tok.pos,
            tok.line,
            is_warning,
            styler,
        );
    }

    /// Re-render every stored diagnostic, re-reading each bucketed file
    /// from disk by its queued path.
    pub fn emit(&self, files: &FileQueue, out: &mut dyn Write, styler: Styler) -> Result<()> {
        for file_id in &self.order {
            let Some(path) = files.path_of(*file_id) else {
                continue;
            };
            let bytes = std::fs::read(path)?;
            let name = path.display().to_string();

            for diag in self.for_file(*file_id) {
                render(
                    &diag.message,
                    &name,
                    &bytes,
                    out,
                    diag.pos,
                    diag.line,
                    diag.is_warning,
                    styler,
                );
            }
        }
        Ok(())
    }
}

/// The rendering primitive.
///
/// Walks backward from `pos` to the previous newline and forward to the
/// next one, skipping control bytes, then prints the line, a filler of
/// `~` with a `^` under the offset, and the message aligned to the
/// caret.
#[allow(clippy::too_many_arguments)]
pub fn render(
    msg: &str,
    file_name: &str,
    bytes: &[u8],
    out: &mut dyn Write,
    pos: u32,
    line: u32,
    is_warning: bool,
    styler: Styler,
) {
    if bytes.is_empty() {
        return;
    }

    // Offsets past the end clamp to the last byte.
    let pos = (pos as usize).min(bytes.len() - 1);

    let mut before = Vec::new();
    let mut filler = String::new();

    let mut i = pos;
    while i > 0 {
        i -= 1;
        let ch = bytes[i];
        if ch == b'\n' {
            break;
        }
        if ch.is_ascii_control() {
            continue;
        }
        before.push(ch);
        filler.push('~');
    }
    before.reverse();

    let mut after = Vec::new();
    let mut i = pos;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'\n' {
            break;
        }
        if ch.is_ascii_control() {
            i += 1;
            continue;
        }
        after.push(ch);
        filler.push(if i == pos { '^' } else { '~' });
        i += 1;
    }

    let spaces: String = filler
        .chars()
        .take_while(|c| *c != '^')
        .map(|_| ' ')
        .collect();

    before.extend_from_slice(&after);
    let context = String::from_utf8_lossy(&before);
    let colour = if is_warning { styler.yellow() } else { styler.red() };

    let _ = writeln!(out, "{}In {}:{}{}", styler.bold(), file_name, line, styler.reset());
    let _ = writeln!(out, "{context}");
    let _ = writeln!(out, "{filler}");
    let _ = writeln!(out, "{}{}{}{}", colour, spaces, msg, styler.reset());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Styler {
        Styler::new(false)
    }

    fn render_to_string(msg: &str, src: &str, pos: u32, line: u32) -> String {
        let mut out = Vec::new();
        render(msg, "test.qz", src.as_bytes(), &mut out, pos, line, false, plain());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn caret_lands_under_the_offset() {
        let out = render_to_string("bad", "let x = ?;", 8, 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "In test.qz:1");
        assert_eq!(lines[1], "let x = ?;");
        assert_eq!(lines[2], "~~~~~~~~^~");
        assert_eq!(lines[3], "        bad");
    }

    #[test]
    fn render_is_bounded_by_the_line() {
        let out = render_to_string("oops", "first\nsecond\nthird", 8, 2);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "second");
        assert_eq!(lines[2], "~~^~~~");
    }

    #[test]
    fn offset_past_eof_clamps() {
        let out = render_to_string("late", "ab", 99, 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "ab");
        assert_eq!(lines[2], "~^");
    }

    #[test]
    fn offset_at_start_of_buffer() {
        let out = render_to_string("first", "xyz", 0, 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "xyz");
        assert_eq!(lines[2], "^~~");
        assert_eq!(lines[3], "first");
    }

    #[test]
    fn counts_are_tracked_separately() {
        let mut collector = ErrorCollector::new();
        collector.store_error("e1", InputFileId(1), 0, 1);
        collector.store_error("e2", InputFileId(2), 0, 1);
        collector.store_warning("w1", InputFileId(1), 0, 1);
        assert_eq!(collector.error_count(), 2);
        assert_eq!(collector.warning_count(), 1);
        assert!(collector.has_errors());
        assert_eq!(collector.for_file(InputFileId(1)).len(), 2);
        assert_eq!(collector.for_file(InputFileId(2)).len(), 1);
        assert!(collector.for_file(InputFileId(3)).is_empty());
    }
}
