//! Main library for the reverse-uroman project.
//!
//! This library provides the `ReverseUroman` struct, the entry point for turning
//! romanized (Latin-alphabet) text back into a target script. It loads
//! hand-authored rule tables once, builds a span lattice per input, and picks a
//! greedy longest-match path through it.
//!
//! ```
//! # use reverse_uroman::ReverseUroman;
//! let uroman = ReverseUroman::new();
//! assert_eq!(uroman.convert("salam", "Arabic"), "سلام");
//! ```

#![allow(clippy::too_many_arguments)]

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::Serialize;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, trace, warn};

pub use crate::cache::DEFAULT_CACHE_CAPACITY;
pub use crate::core::{Direction, LoadReport, RuleSource, ScriptDescriptor, SkippedLine, TableReport};
pub use crate::edge::{Annotation, Edge, SOURCE_SCRIPT};
pub use crate::fallback::has_fallback_table;
pub use crate::rule::{ReverseRule, RuleLineError};
pub use crate::utils::decode_unicode_escapes;
use crate::cache::{CacheKey, ResultCache};
use crate::core::ReverseUromanInner;
use crate::lattice::Lattice;

mod cache;
mod core;
mod edge;
mod fallback;
mod lattice;
mod rule;
mod utils;

/// Output format of a conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RomFormat {
    /// The best path's target text, concatenated.
    #[default]
    Str,
    /// The best path as offset-aligned edges.
    Edges,
    /// Reserved for a view of competing edges that were not chosen. Its
    /// semantics are not defined yet, so it currently yields the same result
    /// as [`RomFormat::Str`].
    Alts,
    /// Every edge of the lattice, including those the best path superseded.
    Lattice,
}

pub(crate) use rom_format::IsEdgeFormat;
pub(crate) use rom_format::IsStrFormat;
pub(crate) use rom_format::RomFormatType;

pub mod rom_format {
    use crate::{ConversionError, RomFormat};

    pub struct Str;
    pub struct Edges;
    pub struct Alts;
    pub struct Lattice;

    pub trait RomFormatType {
        type Output;
        const FORMAT: RomFormat;
    }

    impl RomFormatType for Str {
        type Output = String;
        const FORMAT: RomFormat = RomFormat::Str;
    }

    impl RomFormatType for Edges {
        type Output = Result<String, ConversionError>;
        const FORMAT: RomFormat = RomFormat::Edges;
    }

    impl RomFormatType for Alts {
        type Output = String;
        const FORMAT: RomFormat = RomFormat::Alts;
    }

    impl RomFormatType for Lattice {
        type Output = Result<String, ConversionError>;
        const FORMAT: RomFormat = RomFormat::Lattice;
    }

    pub trait IsStrFormat {}
    pub trait IsEdgeFormat {}

    impl IsStrFormat for Str {}
    impl IsStrFormat for Alts {}
    impl IsEdgeFormat for Edges {}
    impl IsEdgeFormat for Lattice {}
}

/// A conversion result whose shape is fixed by the format type `F`.
pub struct ConversionOutput<F: RomFormatType> {
    pub(crate) result: ConversionResult,
    _marker: PhantomData<F>,
}

impl<F: RomFormatType> ConversionOutput<F> {
    pub fn to_string(self) -> F::Output
    where
        F::Output: From<ConversionResult>,
    {
        self.result.into()
    }

    pub fn into_result(self) -> ConversionResult {
        self.result
    }
}

impl<F: RomFormatType + IsStrFormat> ConversionOutput<F> {
    pub fn as_str(&self) -> &str {
        match &self.result {
            ConversionResult::Str(s) => s,
            ConversionResult::Edges(_) => unreachable!("string formats always produce text"),
        }
    }
}

impl<F: RomFormatType + IsEdgeFormat> ConversionOutput<F> {
    pub fn to_edges(self) -> Vec<Edge> {
        match self.result {
            ConversionResult::Edges(edges) => edges,
            ConversionResult::Str(_) => unreachable!("edge formats always produce edges"),
        }
    }

    pub fn as_edges(&self) -> &[Edge] {
        match &self.result {
            ConversionResult::Edges(edges) => edges,
            ConversionResult::Str(_) => unreachable!("edge formats always produce edges"),
        }
    }
}

impl<'a, F> IntoIterator for &'a ConversionOutput<F>
where
    F: RomFormatType + IsEdgeFormat,
{
    type Item = &'a Edge;
    type IntoIter = std::slice::Iter<'a, Edge>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_edges().iter()
    }
}

impl<F> IntoIterator for ConversionOutput<F>
where
    F: RomFormatType + IsEdgeFormat,
{
    type Item = Edge;
    type IntoIter = std::vec::IntoIter<Edge>;

    fn into_iter(self) -> Self::IntoIter {
        self.to_edges().into_iter()
    }
}

impl<F: RomFormatType> fmt::Display for ConversionOutput<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.result, f)
    }
}

/// Text for string formats; edges for edge formats.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ConversionResult {
    Str(String),
    Edges(Vec<Edge>),
}

impl ConversionResult {
    /// Text as-is, or edges as pretty-printed JSON.
    pub fn to_string(&self) -> Result<String, ConversionError> {
        match self {
            ConversionResult::Str(s) => Ok(s.clone()),
            ConversionResult::Edges(edges) => Ok(serde_json::to_string_pretty(edges)?),
        }
    }

    /// Text as-is, or edges as single-line JSON (one result per output line).
    pub fn to_json_line(&self) -> Result<String, ConversionError> {
        match self {
            ConversionResult::Str(s) => Ok(s.clone()),
            ConversionResult::Edges(edges) => Ok(serde_json::to_string(edges)?),
        }
    }
}

impl From<ConversionResult> for String {
    /// Edge results collapse to their concatenated target text.
    fn from(res: ConversionResult) -> Self {
        match res {
            ConversionResult::Str(s) => s,
            ConversionResult::Edges(edges) => edges.iter().map(Edge::txt).collect(),
        }
    }
}

impl From<ConversionResult> for Result<String, ConversionError> {
    fn from(res: ConversionResult) -> Self {
        res.to_string()
    }
}

impl fmt::Display for ConversionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_string() {
            Ok(s) => write!(f, "{s}"),
            Err(e) => write!(f, "Error: {e:?}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to serialize the result to JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Counters describing cache behavior since the engine was built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Lattices constructed; a cache hit builds none.
    pub lattices_built: usize,
    pub cached_entries: usize,
    pub capacity: usize,
}

/// Configures and builds a [`ReverseUroman`].
#[derive(Debug, Clone)]
pub struct ReverseUromanBuilder {
    source: RuleSource,
    cache_capacity: usize,
}

impl Default for ReverseUromanBuilder {
    fn default() -> Self {
        Self {
            source: RuleSource::Embedded,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl ReverseUromanBuilder {
    /// Read `reverse_*.txt` (and `scripts.txt`, if present) from `dir` instead
    /// of the built-in tables. Missing files leave their script without rules.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source = RuleSource::Directory(dir.into());
        self
    }

    /// Use in-memory rule tables, given as (provenance, content) pairs.
    pub fn rule_tables<I, P, C>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        self.source = RuleSource::Inline(
            tables
                .into_iter()
                .map(|(p, c)| (p.into(), c.into()))
                .collect(),
        );
        self
    }

    pub fn rule_source(mut self, source: RuleSource) -> Self {
        self.source = source;
        self
    }

    /// Maximum number of cached results; `0` disables caching.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> ReverseUroman {
        ReverseUroman {
            inner: Arc::new(ReverseUromanInner::new(&self.source)),
            cache: Arc::new(ResultCache::new(self.cache_capacity)),
            lattices_built: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// The main struct for reverse romanization.
///
/// It owns an immutable rule store and a result cache. Clones share both, so
/// one engine can serve many threads; separately built engines are independent.
#[derive(Debug, Clone)]
pub struct ReverseUroman {
    inner: Arc<ReverseUromanInner>,
    cache: Arc<ResultCache>,
    lattices_built: Arc<AtomicUsize>,
}

impl Default for ReverseUroman {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseUroman {
    /// An engine over the built-in rule tables with the default cache size.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ReverseUromanBuilder {
        ReverseUromanBuilder::default()
    }

    /// An engine over the rule tables found in `dir`.
    pub fn from_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self::builder().data_dir(dir).build()
    }

    /// Diagnostics from loading the rule tables.
    pub fn load_report(&self) -> &LoadReport {
        &self.inner.load_report
    }

    /// Descriptor for `script` (case-insensitive, alternative names accepted).
    pub fn script(&self, script: &str) -> Option<&ScriptDescriptor> {
        self.inner.script(script)
    }

    /// The rules loaded for exactly `source`, across all scripts, in load order.
    pub fn rules_for(&self, source: &str) -> &[ReverseRule] {
        self.inner.rules.get(source).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.cache.hits(),
            misses: self.cache.misses(),
            lattices_built: self.lattices_built.load(Ordering::Relaxed),
            cached_entries: self.cache.len(),
            capacity: self.cache.capacity(),
        }
    }

    /// Converts `s` into `script`, returning the best-path text.
    ///
    /// Unknown scripts are not an error: letters fall back to themselves and
    /// everything else passes through.
    ///
    /// # Example
    /// ```
    /// # use reverse_uroman::ReverseUroman;
    /// # let uroman = ReverseUroman::new();
    /// assert_eq!(uroman.convert("shukran", "Arabic"), "شكرا");
    /// assert_eq!(uroman.convert("hello world", "Swahili"), "hello world");
    /// assert_eq!(uroman.convert("abc", "NoSuchScript"), "abc");
    /// ```
    pub fn convert(&self, s: &str, script: &str) -> String {
        self.convert_string::<rom_format::Str>(s, script).to_string()
    }

    /// Converts `s` into `script` with the output shape fixed at compile time.
    ///
    /// # Example
    /// ```
    /// # use reverse_uroman::{ReverseUroman, rom_format};
    /// # let uroman = ReverseUroman::new();
    /// let edges = uroman.convert_string::<rom_format::Edges>("salam alaykum", "Arabic");
    ///
    /// for edge in &edges {
    ///     println!("{edge}");
    /// }
    /// assert_eq!(edges.as_edges().len(), 3);
    /// ```
    pub fn convert_string<F: RomFormatType>(&self, s: &str, script: &str) -> ConversionOutput<F> {
        ConversionOutput {
            result: self.convert_cached(s, script, F::FORMAT),
            _marker: PhantomData,
        }
    }

    /// Decodes `\uXXXX` escapes before converting.
    pub fn convert_escaped<F: RomFormatType>(&self, s: &str, script: &str) -> ConversionOutput<F> {
        let s = decode_unicode_escapes(s);
        self.convert_string::<F>(&s, script)
    }

    /// Converts `s` into `script` using a runtime-selected format.
    ///
    /// # Example
    /// ```
    /// # use reverse_uroman::{ReverseUroman, RomFormat};
    /// # let uroman = ReverseUroman::new();
    /// let result = uroman.convert_with_format(
    ///     "sh",
    ///     "Arabic",
    ///     Some(RomFormat::Edges),
    /// );
    ///
    /// let json = result.to_string().unwrap();
    ///
    /// println!("{json}");
    /// ```
    pub fn convert_with_format(
        &self,
        s: &str,
        script: &str,
        rom_format: Option<RomFormat>,
    ) -> ConversionResult {
        self.convert_cached(s, script, rom_format.unwrap_or_default())
    }

    /// Decodes `\uXXXX` escapes and then converts with a runtime-selected format.
    pub fn convert_escaped_with_format(
        &self,
        s: &str,
        script: &str,
        rom_format: Option<RomFormat>,
    ) -> ConversionResult {
        let s = decode_unicode_escapes(s);
        self.convert_with_format(&s, script, rom_format)
    }

    fn convert_cached(&self, s: &str, script: &str, rom_format: RomFormat) -> ConversionResult {
        let key = CacheKey {
            text: s.to_string(),
            script: script.to_string(),
            format: rom_format,
        };

        if let Some(hit) = self.cache.get(&key) {
            trace!(script, ?rom_format, "cache hit");
            return hit;
        }

        let result = self.convert_uncached(s, script, rom_format);
        if !self.cache.insert(key, result.clone()) {
            debug!(capacity = self.cache.capacity(), "result cache full; not caching");
        }
        result
    }

    fn convert_uncached(&self, s: &str, script: &str, rom_format: RomFormat) -> ConversionResult {
        self.lattices_built.fetch_add(1, Ordering::Relaxed);
        let lat = Lattice::build(s, &self.inner, script);
        let n = lat.max_vertex;

        match rom_format {
            RomFormat::Str | RomFormat::Alts => ConversionResult::Str(
                lat.best_rom_edge_path(0, n)
                    .iter()
                    .map(Edge::txt)
                    .collect::<String>(),
            ),
            RomFormat::Edges => ConversionResult::Edges(lat.best_rom_edge_path(0, n)),
            RomFormat::Lattice => ConversionResult::Edges(lat.all_edges()),
        }
    }

    fn convert_line(
        &self,
        line: &str,
        default_script: &str,
        rom_format: RomFormat,
        decode_unicode: bool,
    ) -> Result<String, ConversionError> {
        let (script, text, directive) = match line.strip_prefix(SCRIPT_DIRECTIVE) {
            Some(rest) => {
                let mut parts = rest.splitn(2, char::is_whitespace);
                let script = parts
                    .next()
                    .filter(|name| !name.is_empty())
                    .unwrap_or(default_script);
                (script, parts.next().unwrap_or(""), true)
            }
            None => (default_script, line, false),
        };

        let result = if decode_unicode {
            self.convert_escaped_with_format(text, script, Some(rom_format))
        } else {
            self.convert_with_format(text, script, Some(rom_format))
        };
        let output = result.to_json_line()?;

        Ok(match (directive, rom_format) {
            (true, RomFormat::Str | RomFormat::Alts) => format!("{SCRIPT_DIRECTIVE}{script} {output}"),
            _ => output,
        })
    }

    /// Converts a stream of text line by line and writes one result per line.
    ///
    /// A line of the form `::script NAME text` converts `text` into `NAME`
    /// instead of `script`. Edge formats are written as single-line JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if reading, writing, or JSON serialization fails.
    pub fn convert_file<R: BufRead, W: Write>(
        &self,
        mut reader: R,
        mut writer: W,
        script: &str,
        rom_format: RomFormat,
        max_lines: Option<usize>,
        decode_unicode: bool,
    ) -> Result<(), ConversionError> {
        let mut line_number = 0;
        let mut non_utf8_lines = 0;
        let mut buffer = vec![];

        while max_lines.is_none_or(|max| line_number < max)
            && reader.read_until(b'\n', &mut buffer)? > 0
        {
            line_number += 1;

            let output = {
                let line_str = String::from_utf8_lossy(&buffer);
                if matches!(line_str, std::borrow::Cow::Owned(_)) {
                    non_utf8_lines += 1;
                    warn!(line = line_number, "non-UTF-8 input replaced with U+FFFD");
                }
                let line = line_str.trim_end_matches('\n').trim_end_matches('\r');
                self.convert_line(line, script, rom_format, decode_unicode)?
            };
            writeln!(writer, "{output}")?;
            buffer.clear();
        }

        if non_utf8_lines > 0 {
            warn!(lines = non_utf8_lines, "input contained non-UTF-8 lines");
        }

        writer.flush()?;
        Ok(())
    }

    /// Like [`ReverseUroman::convert_file`], but converts all lines in parallel.
    ///
    /// The whole input is read into memory first; output order is preserved.
    pub fn convert_file_parallel<R: BufRead, W: Write>(
        &self,
        reader: R,
        mut writer: W,
        script: &str,
        rom_format: RomFormat,
        max_lines: Option<usize>,
        decode_unicode: bool,
    ) -> Result<(), ConversionError> {
        let mut lines: Vec<String> = Vec::new();
        for (index, bytes) in reader.split(b'\n').enumerate() {
            if max_lines.is_some_and(|max| index >= max) {
                break;
            }
            let bytes = bytes?;
            let line = match String::from_utf8(bytes) {
                Ok(line) => line,
                Err(err) => {
                    warn!(line = index + 1, "non-UTF-8 input replaced with U+FFFD");
                    String::from_utf8_lossy(err.as_bytes()).into_owned()
                }
            };
            lines.push(line.trim_end_matches('\r').to_string());
        }

        let results: Vec<String> = lines
            .par_iter()
            .map(|line| self.convert_line(line, script, rom_format, decode_unicode))
            .collect::<Result<_, _>>()?;

        for output in results {
            writeln!(writer, "{output}")?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Per-line target override in batch input: `::script Turkish Eskisehir`.
pub const SCRIPT_DIRECTIVE: &str = "::script ";
