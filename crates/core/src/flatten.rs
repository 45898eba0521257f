//! JSON to leaf records
//!
//! The [`Flattener`] consumes exactly one value from a [`JsonTokenReader`]
//! and emits one [`LeafRecord`] per scalar, addressed below a base path.
//! Empty objects and arrays produce no record.

use crate::error::{Error, Result};
use crate::key::{self, SEPARATOR};
use crate::record::{self, IndexSet, LeafRecord, NULL_VALUE};
use crate::token::{JsonTokenReader, Token};
use std::io::Read;

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object { path_len: usize },
    Array { path_len: usize, next_index: u64 },
}

impl Frame {
    fn path_len(&self) -> usize {
        match self {
            Frame::Object { path_len } | Frame::Array { path_len, .. } => *path_len,
        }
    }
}

/// Streams tokens into leaf records
#[derive(Debug, Clone, Copy)]
pub struct Flattener<'a> {
    indexes: &'a IndexSet,
}

impl<'a> Flattener<'a> {
    /// Flattener tagging records of the given declared indexes
    pub fn new(indexes: &'a IndexSet) -> Self {
        Flattener { indexes }
    }

    /// Read one value and pass its records to `emit`, in document order
    ///
    /// `base` is a stored path (`/a/`). Returns the number of records.
    pub fn flatten_value<R, F>(
        &self,
        tokens: &mut JsonTokenReader<R>,
        base: &str,
        mut emit: F,
    ) -> Result<u64>
    where
        R: Read,
        F: FnMut(LeafRecord) -> Result<()>,
    {
        let mut path = String::from(base);
        let mut stack: Vec<Frame> = Vec::new();
        let mut count = 0u64;

        loop {
            let token = tokens
                .next_token()?
                .ok_or_else(|| Error::parse(tokens.offset(), "expected a JSON value"))?;

            match token {
                Token::FieldName(name) => {
                    key::validate_key(&name)?;
                    match stack.last() {
                        Some(Frame::Object { path_len }) => path.truncate(*path_len),
                        _ => return Err(Error::parse(tokens.offset(), "field outside object")),
                    }
                    path.push_str(&name);
                    path.push(SEPARATOR);
                    continue;
                }
                Token::EndObject | Token::EndArray => {
                    let frame = stack
                        .pop()
                        .ok_or_else(|| Error::parse(tokens.offset(), "unbalanced container"))?;
                    path.truncate(frame.path_len());
                }
                value => {
                    if let Some(Frame::Array {
                        path_len,
                        next_index,
                    }) = stack.last_mut()
                    {
                        path.truncate(*path_len);
                        path.push_str(&key::array_token(*next_index));
                        path.push(SEPARATOR);
                        *next_index += 1;
                    }
                    match value {
                        Token::StartObject => stack.push(Frame::Object {
                            path_len: path.len(),
                        }),
                        Token::StartArray => stack.push(Frame::Array {
                            path_len: path.len(),
                            next_index: 0,
                        }),
                        scalar => {
                            emit(self.leaf(&path, scalar)?)?;
                            count += 1;
                        }
                    }
                }
            }

            if stack.is_empty() {
                return Ok(count);
            }
        }
    }

    fn leaf(&self, path: &str, token: Token) -> Result<LeafRecord> {
        let (value, ovalue) = match token {
            Token::Null => (NULL_VALUE.to_string(), None),
            Token::Bool(b) => (record::encode_bool(b), Some(b.to_string())),
            Token::String(s) => (record::encode_string(&s), None),
            Token::Number(literal) => (record::encode_number(&literal)?, Some(literal)),
            other => {
                return Err(Error::invalid_input(format!(
                    "{:?} is not a scalar",
                    other
                )))
            }
        };
        Ok(LeafRecord::new(
            path,
            value,
            ovalue,
            self.indexes.index_key_for(path),
        ))
    }
}

/// Flatten a complete document into memory
///
/// ```
/// use jsondb_core::flatten::flatten;
/// use jsondb_core::record::IndexSet;
///
/// let records = flatten(&br#"{"b":1,"c":[10,20]}"#[..], "/a/", &IndexSet::new()).unwrap();
/// assert_eq!(records.len(), 3);
/// assert_eq!(records[0].path(), "/a/b/");
/// ```
pub fn flatten<R: Read>(reader: R, base: &str, indexes: &IndexSet) -> Result<Vec<LeafRecord>> {
    let mut tokens = JsonTokenReader::new(reader);
    let mut records = Vec::new();
    Flattener::new(indexes).flatten_value(&mut tokens, base, |r| {
        records.push(r);
        Ok(())
    })?;
    tokens.finish()?;
    Ok(records)
}
