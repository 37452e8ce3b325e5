//! Span-based source editing with source map output.
//!
//! Edits are collected as `(start, end, replacement)` splices against the
//! untouched original text and only materialized in `finish`, so every offset
//! the caller holds stays valid for the whole pass.

use serde::{Deserialize, Serialize};
use sourcemap::SourceMapBuilder;
use tracing::warn;

/// Output of one transform pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transformed {
    pub code: String,
    /// Source map v3 JSON against the pass input.
    pub map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Splice {
    start: usize,
    end: usize,
    content: String,
}

pub struct SourceEdit<'s> {
    original: &'s str,
    intro: String,
    splices: Vec<Splice>,
}

impl<'s> SourceEdit<'s> {
    pub fn new(original: &'s str) -> Self {
        Self {
            original,
            intro: String::new(),
            splices: Vec::new(),
        }
    }

    pub fn original(&self) -> &'s str {
        self.original
    }

    /// Inserts text before everything else, including earlier prepends.
    pub fn prepend(&mut self, content: &str) {
        self.intro.insert_str(0, content);
    }

    /// Replaces `[start, end)` of the original text.
    ///
    /// An overwrite that encloses earlier splices supersedes them. Returns
    /// false (and changes nothing) when the range is out of bounds, not on a
    /// char boundary, nested inside an earlier splice, or partially overlaps one.
    pub fn overwrite(&mut self, start: usize, end: usize, content: &str) -> bool {
        if start > end
            || end > self.original.len()
            || !self.original.is_char_boundary(start)
            || !self.original.is_char_boundary(end)
        {
            warn!(start, end, len = self.original.len(), "splice out of bounds");
            return false;
        }
        if start == end && content.is_empty() {
            return true;
        }

        for splice in &self.splices {
            let encloses = start <= splice.start && splice.end <= end;
            let disjoint = end <= splice.start || splice.end <= start;
            if !encloses && !disjoint {
                return false;
            }
        }

        self.splices
            .retain(|splice| !(start <= splice.start && splice.end <= end));
        let index = self
            .splices
            .iter()
            .position(|splice| splice.start >= end)
            .unwrap_or(self.splices.len());
        self.splices.insert(
            index,
            Splice {
                start,
                end,
                content: content.to_string(),
            },
        );
        true
    }

    pub fn remove(&mut self, start: usize, end: usize) -> bool {
        self.overwrite(start, end, "")
    }

    pub fn has_changed(&self) -> bool {
        !self.intro.is_empty() || !self.splices.is_empty()
    }

    /// Materializes the edited text together with a source map.
    pub fn finish(self, source_name: &str) -> Transformed {
        let mut builder = SourceMapBuilder::new(None);
        let source_id = builder.add_source(source_name);
        builder.set_source_contents(source_id, Some(self.original));

        let mut out = String::with_capacity(self.original.len() + self.intro.len());
        let mut orig = LinePos::default();
        let mut gen = LinePos::default();

        out.push_str(&self.intro);
        gen.advance(&self.intro);

        let mut cursor = 0;
        for splice in &self.splices {
            copy_original(
                &self.original[cursor..splice.start],
                &mut out,
                &mut builder,
                source_id,
                &mut orig,
                &mut gen,
            );
            if !splice.content.is_empty() {
                builder.add_raw(
                    gen.line,
                    gen.col,
                    orig.line,
                    orig.col,
                    Some(source_id),
                    None,
                    false,
                );
                out.push_str(&splice.content);
                gen.advance(&splice.content);
            }
            orig.advance(&self.original[splice.start..splice.end]);
            cursor = splice.end;
        }
        copy_original(
            &self.original[cursor..],
            &mut out,
            &mut builder,
            source_id,
            &mut orig,
            &mut gen,
        );

        let mut map = Vec::new();
        let map = match builder.into_sourcemap().to_writer(&mut map) {
            Ok(()) => Some(String::from_utf8_lossy(&map).into_owned()),
            Err(e) => {
                warn!(source = source_name, error = %e, "failed to serialize source map");
                None
            }
        };

        Transformed { code: out, map }
    }
}

/// Copies an unchanged chunk, mapping its start and every line start inside it.
fn copy_original(
    chunk: &str,
    out: &mut String,
    builder: &mut SourceMapBuilder,
    source_id: u32,
    orig: &mut LinePos,
    gen: &mut LinePos,
) {
    if chunk.is_empty() {
        return;
    }
    builder.add_raw(gen.line, gen.col, orig.line, orig.col, Some(source_id), None, false);

    let mut chars = chunk.chars().peekable();
    while let Some(ch) = chars.next() {
        out.push(ch);
        orig.step(ch);
        gen.step(ch);
        if ch == '\n' && chars.peek().is_some() {
            builder.add_raw(gen.line, gen.col, orig.line, orig.col, Some(source_id), None, false);
        }
    }
}

/// Zero-based line and UTF-16 column, the units source maps are expressed in.
#[derive(Debug, Default, Clone, Copy)]
struct LinePos {
    line: u32,
    col: u32,
}

impl LinePos {
    fn step(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += ch.len_utf16() as u32;
        }
    }

    fn advance(&mut self, text: &str) {
        for ch in text.chars() {
            self.step(ch);
        }
    }
}
