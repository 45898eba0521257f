//! Leaf records back to JSON, incrementally
//!
//! [`JsonReconstructor`] takes records in path order (ascending or
//! descending) and writes the JSON document they describe to any
//! [`Write`]. Only the chain of currently open containers is kept in memory.
//!
//! Output formatting goes through a `serde_json` [`Formatter`], so compact and
//! pretty output share one code path.

use crate::error::{Error, Result};
use crate::key;
use crate::options::{GetOptions, SortOrder};
use crate::record::{LeafRecord, Scalar};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};
use std::io::{self, Write};

/// Shaping options applied while writing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconstructOptions {
    /// Records arrive in descending path order
    pub descending: bool,
    /// Stop after this many top-level children
    pub limit_to_first: Option<usize>,
    /// Collapse subtrees deeper than this to `true`
    pub depth: Option<usize>,
    /// JSONP callback wrapping the output
    pub callback: Option<String>,
}

impl From<&GetOptions> for ReconstructOptions {
    fn from(options: &GetOptions) -> Self {
        ReconstructOptions {
            descending: options.order == SortOrder::Desc,
            limit_to_first: options.limit_to_first,
            depth: options.depth,
            callback: options.callback.clone(),
        }
    }
}

/// Whether the caller should keep feeding records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep going
    Continue,
    /// The output is complete (top-level limit reached)
    Stop,
}

#[derive(Debug)]
struct Frame {
    /// Token under which the container sits in its parent (empty for the root)
    key: String,
    is_array: bool,
    next_index: u64,
    first: bool,
}

/// Streaming writer of JSON documents from ordered leaf records
///
/// ```
/// use jsondb_core::reconstruct::{JsonReconstructor, ReconstructOptions};
/// use jsondb_core::flatten::flatten;
/// use jsondb_core::record::IndexSet;
///
/// let records = flatten(&br#"{"b":1,"c":[10,20]}"#[..], "/a/", &IndexSet::new()).unwrap();
/// let mut writer = JsonReconstructor::compact(Vec::new(), "/a/", ReconstructOptions::default()).unwrap();
/// for record in &records {
///     writer.write_record(record).unwrap();
/// }
/// let out = writer.finish().unwrap();
/// assert_eq!(out, br#"{"b":1,"c":[10,20]}"#);
/// ```
pub struct JsonReconstructor<W: Write, F: Formatter> {
    out: Option<W>,
    formatter: F,
    base: String,
    options: ReconstructOptions,
    frames: Vec<Frame>,
    started: bool,
    closed: bool,
    top_level_seen: usize,
    last_top: Option<String>,
    last_shallow: Option<String>,
}

impl<W: Write> JsonReconstructor<W, CompactFormatter> {
    /// Compact output
    pub fn compact(out: W, base: &str, options: ReconstructOptions) -> Result<Self> {
        Self::new(out, CompactFormatter, base, options)
    }
}

impl<W: Write> JsonReconstructor<W, PrettyFormatter<'static>> {
    /// Indented output
    pub fn pretty(out: W, base: &str, options: ReconstructOptions) -> Result<Self> {
        Self::new(out, PrettyFormatter::new(), base, options)
    }
}

impl<W: Write, F: Formatter> JsonReconstructor<W, F> {
    /// Writer for records below `base` (a stored path such as `/a/`)
    pub fn new(out: W, formatter: F, base: &str, options: ReconstructOptions) -> Result<Self> {
        if !base.starts_with(key::SEPARATOR) || !base.ends_with(key::SEPARATOR) {
            return Err(Error::invalid_input(format!(
                "'{}' is not a stored path",
                base
            )));
        }
        Ok(JsonReconstructor {
            out: Some(out),
            formatter,
            base: base.to_string(),
            options,
            frames: Vec::new(),
            started: false,
            closed: false,
            top_level_seen: 0,
            last_top: None,
            last_shallow: None,
        })
    }

    /// Write one record
    pub fn write_record(&mut self, record: &LeafRecord) -> Result<Flow> {
        self.write_row(record.path(), record.value(), record.ovalue())
    }

    /// Write one row given as its stored columns
    pub fn write_row(&mut self, path: &str, value: &str, ovalue: Option<&str>) -> Result<Flow> {
        if self.closed {
            return Err(Error::invalid_input("reconstructor already closed"));
        }
        let relative = path.strip_prefix(self.base.as_str()).ok_or_else(|| {
            Error::corruption(format!("'{}' is outside of '{}'", path, self.base))
        })?;
        let mut tokens: Vec<&str> = key::tokens(relative).collect();

        if let (Some(limit), Some(top)) = (self.options.limit_to_first, tokens.first()) {
            if self.last_top.as_deref() != Some(*top) {
                if self.top_level_seen >= limit {
                    return Ok(Flow::Stop);
                }
                self.top_level_seen += 1;
                self.last_top = Some(top.to_string());
            }
        }

        let mut shallow = false;
        if let Some(depth) = self.options.depth {
            if tokens.len() > depth {
                tokens.truncate(depth);
                let marker = tokens.join("/");
                if self.last_shallow.as_deref() == Some(marker.as_str()) {
                    return Ok(Flow::Continue);
                }
                self.last_shallow = Some(marker);
                shallow = true;
            }
        }

        let scalar = if shallow {
            Scalar::Bool(true)
        } else {
            Scalar::decode(value, ovalue)?
        };
        self.write_leaf(&tokens, &scalar)?;
        Ok(Flow::Continue)
    }

    /// Close open containers and the callback; writes `null` if nothing was
    /// written. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        while !self.frames.is_empty() {
            self.close_frame()?;
        }
        if !self.started {
            self.begin_output()?;
            self.formatter.write_null(writer(&mut self.out)?)?;
        }
        let out = writer(&mut self.out)?;
        if self.options.callback.is_some() {
            out.write_all(b")")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Close and hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        self.close()?;
        self.out
            .take()
            .ok_or_else(|| Error::invalid_input("reconstructor already finished"))
    }

    fn write_leaf(&mut self, tokens: &[&str], scalar: &Scalar<'_>) -> Result<()> {
        if tokens.is_empty() {
            if self.started {
                return Err(Error::corruption(format!(
                    "value at '{}' next to other values",
                    self.base
                )));
            }
            self.begin_output()?;
            return self.write_scalar(scalar);
        }

        let n = tokens.len();
        let limit = self.frames.len().min(n);
        let mut shared = usize::from(!self.frames.is_empty());
        while shared < limit && self.frames[shared].key == tokens[shared - 1] {
            shared += 1;
        }
        while self.frames.len() > shared {
            self.close_frame()?;
        }

        if self.frames.is_empty() {
            if self.started {
                return Err(Error::corruption(format!(
                    "value at '{}' next to other values",
                    self.base
                )));
            }
            self.begin_output()?;
            self.open_container(String::new(), key::is_array_token(tokens[0]))?;
        }
        for i in self.frames.len()..n {
            self.begin_member(tokens[i - 1])?;
            self.open_container(tokens[i - 1].to_string(), key::is_array_token(tokens[i]))?;
        }
        self.begin_member(tokens[n - 1])?;
        self.write_scalar(scalar)?;
        self.end_member()
    }

    fn begin_output(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        if let Some(callback) = &self.options.callback {
            let out = writer(&mut self.out)?;
            out.write_all(callback.as_bytes())?;
            out.write_all(b"(")?;
        }
        Ok(())
    }

    fn open_container(&mut self, key: String, is_array: bool) -> Result<()> {
        let out = writer(&mut self.out)?;
        if is_array {
            self.formatter.begin_array(out)?;
        } else {
            self.formatter.begin_object(out)?;
        }
        self.frames.push(Frame {
            key,
            is_array,
            next_index: 0,
            first: true,
        });
        Ok(())
    }

    fn close_frame(&mut self) -> Result<()> {
        if let Some(frame) = self.frames.pop() {
            let out = writer(&mut self.out)?;
            if frame.is_array {
                self.formatter.end_array(out)?;
            } else {
                self.formatter.end_object(out)?;
            }
            if !self.frames.is_empty() {
                self.end_member()?;
            }
        }
        Ok(())
    }

    /// Start a member of the innermost container: an object key or an array
    /// slot, padding skipped positions with `null` in ascending order
    fn begin_member(&mut self, token: &str) -> Result<()> {
        let descending = self.options.descending;
        let is_array = key::is_array_token(token);
        let out = writer(&mut self.out)?;
        let frame = self
            .frames
            .last_mut()
            .ok_or_else(|| Error::corruption("member outside of a container"))?;
        if frame.is_array != is_array {
            return Err(Error::corruption(format!(
                "container '{}' mixes array positions and object fields",
                frame.key
            )));
        }

        if is_array {
            let index = key::parse_array_token(token)?;
            if !descending {
                while frame.next_index < index {
                    self.formatter.begin_array_value(&mut *out, frame.first)?;
                    self.formatter.write_null(&mut *out)?;
                    self.formatter.end_array_value(&mut *out)?;
                    frame.first = false;
                    frame.next_index += 1;
                }
            }
            self.formatter.begin_array_value(&mut *out, frame.first)?;
            frame.next_index = index.saturating_add(1);
        } else {
            self.formatter.begin_object_key(&mut *out, frame.first)?;
            serde_json::to_writer(&mut *out, token).map_err(io::Error::from)?;
            self.formatter.end_object_key(&mut *out)?;
            self.formatter.begin_object_value(&mut *out)?;
        }
        frame.first = false;
        Ok(())
    }

    fn end_member(&mut self) -> Result<()> {
        let out = writer(&mut self.out)?;
        match self.frames.last() {
            Some(frame) if frame.is_array => self.formatter.end_array_value(out)?,
            Some(_) => self.formatter.end_object_value(out)?,
            None => {}
        }
        Ok(())
    }

    fn write_scalar(&mut self, scalar: &Scalar<'_>) -> Result<()> {
        let out = writer(&mut self.out)?;
        match scalar {
            Scalar::Null => self.formatter.write_null(out)?,
            Scalar::Bool(b) => self.formatter.write_bool(out, *b)?,
            Scalar::Number(literal) => self.formatter.write_number_str(out, literal)?,
            Scalar::String(s) => serde_json::to_writer(out, s).map_err(io::Error::from)?,
        }
        Ok(())
    }
}

impl<W: Write, F: Formatter> Drop for JsonReconstructor<W, F> {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

fn writer<W>(out: &mut Option<W>) -> Result<&mut W> {
    out.as_mut()
        .ok_or_else(|| Error::invalid_input("reconstructor already finished"))
}

/// Render records below `base` with the shaping and formatting of `options`
///
/// Records must already be filtered, bounded and sorted per `options.order`.
pub fn records_to_string<'r, I>(records: I, base: &str, options: &GetOptions) -> Result<String>
where
    I: IntoIterator<Item = &'r LeafRecord>,
{
    let shaping = ReconstructOptions::from(options);
    let bytes = if options.pretty_print {
        drive(JsonReconstructor::pretty(Vec::new(), base, shaping)?, records)?
    } else {
        drive(JsonReconstructor::compact(Vec::new(), base, shaping)?, records)?
    };
    String::from_utf8(bytes).map_err(|e| Error::corruption(e.to_string()))
}

fn drive<'r, I, W, F>(mut reconstructor: JsonReconstructor<W, F>, records: I) -> Result<W>
where
    I: IntoIterator<Item = &'r LeafRecord>,
    W: Write,
    F: Formatter,
{
    for record in records {
        if reconstructor.write_record(record)? == Flow::Stop {
            break;
        }
    }
    reconstructor.finish()
}
