use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// The location of a node in the compiled source, as given by solc's `src`
/// attribute, `offset:length:fileIndex`.
///
/// Offsets and lengths are in bytes. The file index is `-1` for nodes the
/// compiler synthesized.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Span {
    offset: usize,
    length: usize,
    file_index: i64,
}

impl Span {
    pub fn new(offset: usize, length: usize, file_index: i64) -> Span {
        Span {
            offset,
            length,
            file_index,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn file_index(&self) -> i64 {
        self.file_index
    }

    /// Recover the verbatim text this span covers, if it lies within `source`.
    pub fn text<'s>(&self, source: &'s str) -> Option<&'s str> {
        if self.length == 0 {
            return None;
        }
        source.get(self.offset..self.offset.checked_add(self.length)?)
    }
}

impl FromStr for Span {
    type Err = Error;

    fn from_str(s: &str) -> Result<Span, Error> {
        let invalid = || Error::InvalidSourceLocation(s.to_string());

        let mut parts = s.split(':');
        let offset = parts
            .next()
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(invalid)?;
        let length = parts
            .next()
            .and_then(|p| p.parse::<usize>().ok())
            .ok_or_else(invalid)?;
        let file_index = parts
            .next()
            .and_then(|p| p.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Span::new(offset, length, file_index))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.offset, self.length, self.file_index)
    }
}
