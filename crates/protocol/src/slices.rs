//! Compact list of slice indices that still need transferring.
//!
//! On the wire the list is `{"Slices": [..]}`: strictly increasing indices,
//! optionally followed by [`TAIL_SENTINEL`], which stands for every index
//! after the last listed one. `[-1]` alone therefore means "everything",
//! `[3, -1]` means "3 and every later index", and `[]` means "nothing".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Wire value marking an open-ended tail.
pub const TAIL_SENTINEL: i64 = -1;

/// Slice indices still missing on one side of a transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SliceSeq", into = "SliceSeq")]
pub struct MissingSlices {
    listed: Vec<u32>,
    open_tail: bool,
}

#[derive(Serialize, Deserialize)]
struct SliceSeq {
    #[serde(rename = "Slices", default, deserialize_with = "crate::null_as_empty")]
    slices: Vec<i64>,
}

impl MissingSlices {
    /// Every slice is missing (a fresh transfer).
    pub fn all() -> Self {
        Self {
            listed: Vec::new(),
            open_tail: true,
        }
    }

    /// No slice is missing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds a list from explicit indices and a tail flag.
    ///
    /// `listed` must be strictly increasing.
    pub fn from_parts(listed: Vec<u32>, open_tail: bool) -> Result<Self, ProtocolError> {
        if let Some(pair) = listed.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ProtocolError::InvalidSliceList(format!(
                "indices not strictly increasing: {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self { listed, open_tail })
    }

    /// Decodes the wire form, validating ordering and sentinel placement.
    pub fn from_wire(values: &[i64]) -> Result<Self, ProtocolError> {
        let (body, open_tail) = match values.split_last() {
            Some((&TAIL_SENTINEL, rest)) => (rest, true),
            _ => (values, false),
        };

        let mut listed = Vec::with_capacity(body.len());
        for &value in body {
            if value == TAIL_SENTINEL {
                return Err(ProtocolError::InvalidSliceList(
                    "tail sentinel must be the final element".into(),
                ));
            }
            let index = u32::try_from(value).map_err(|_| {
                ProtocolError::InvalidSliceList(format!("index out of range: {value}"))
            })?;
            listed.push(index);
        }

        Self::from_parts(listed, open_tail)
    }

    /// Encodes the wire form.
    pub fn to_wire(&self) -> Vec<i64> {
        let mut values: Vec<i64> = self.listed.iter().map(|&i| i64::from(i)).collect();
        if self.open_tail {
            values.push(TAIL_SENTINEL);
        }
        values
    }

    /// Explicitly listed indices, without the tail.
    pub fn listed(&self) -> &[u32] {
        &self.listed
    }

    /// Returns `true` if the list ends with the open-ended tail.
    pub fn has_open_tail(&self) -> bool {
        self.open_tail
    }

    /// Returns `true` if nothing is missing.
    pub fn is_empty(&self) -> bool {
        self.listed.is_empty() && !self.open_tail
    }

    /// Returns `true` if every slice is missing.
    pub fn is_all(&self) -> bool {
        self.listed.is_empty() && self.open_tail
    }

    /// First index covered by the open tail, if any.
    pub fn tail_start(&self) -> Option<u32> {
        if !self.open_tail {
            return None;
        }
        Some(self.listed.last().map_or(0, |&last| last.saturating_add(1)))
    }

    /// Lowest missing index, if any.
    pub fn first(&self) -> Option<u32> {
        self.listed.first().copied().or_else(|| self.tail_start())
    }

    /// Returns `true` if `index` is missing.
    pub fn contains(&self, index: u32) -> bool {
        self.listed.binary_search(&index).is_ok()
            || self.tail_start().is_some_and(|start| index >= start)
    }

    /// Expands the list into concrete indices below `slice_count`, ascending.
    pub fn indices(&self, slice_count: u32) -> impl Iterator<Item = u32> + '_ {
        let tail = match self.tail_start() {
            Some(start) => start..slice_count,
            None => 0..0,
        };
        self.listed
            .iter()
            .copied()
            .take_while(move |&i| i < slice_count)
            .chain(tail)
    }

    /// Number of missing indices below `slice_count`.
    pub fn count(&self, slice_count: u32) -> usize {
        self.indices(slice_count).count()
    }
}

impl TryFrom<SliceSeq> for MissingSlices {
    type Error = ProtocolError;

    fn try_from(seq: SliceSeq) -> Result<Self, Self::Error> {
        Self::from_wire(&seq.slices)
    }
}

impl From<MissingSlices> for SliceSeq {
    fn from(missing: MissingSlices) -> Self {
        Self {
            slices: missing.to_wire(),
        }
    }
}

impl fmt::Display for MissingSlices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (n, index) in self.listed.iter().enumerate() {
            if n > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{index}")?;
        }
        if let Some(start) = self.tail_start() {
            if !self.listed.is_empty() {
                f.write_str(", ")?;
            }
            write!(f, "{start}..")?;
        }
        f.write_str("]")
    }
}
