//! Operation logs
//!
//! A log is a flat binary array of fixed-width records, read through a
//! whole-file read-only memory mapping ([`mapped::MappedArray`]). Two layouts
//! exist:
//!
//! - **records**: tagged [`OperationRecord`]s, 24 bytes each
//! - **keys**: raw native-endian `u64` keys, 8 bytes each
//!
//! # Record layout
//!
//! ```text
//! offset  0: u64  operand 0 (key / lower key)
//! offset  8: u64  operand 1 (value / upper key, 0 when unused)
//! offset 16: u32  operation kind (see OpKind)
//! offset 20: u32  padding, written as 0
//! ```
//!
//! The file length must be an exact multiple of the record width; anything
//! else is rejected before a worker starts.

pub mod mapped;
pub mod writer;

use crate::error::BenchError;
use crate::Result;
use std::fmt;

/// Width in bytes of one [`OperationRecord`]
pub const RECORD_SIZE: usize = 24;

/// Operation kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OpKind {
    Empty = 0,
    Get = 1,
    Update = 2,
    Predecessor = 3,
    Scan = 4,
    Insert = 5,
    Remove = 6,
}

impl OpKind {
    pub const ALL: [OpKind; 7] = [
        OpKind::Empty,
        OpKind::Get,
        OpKind::Update,
        OpKind::Predecessor,
        OpKind::Scan,
        OpKind::Insert,
        OpKind::Remove,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Empty => "empty",
            OpKind::Get => "get",
            OpKind::Update => "update",
            OpKind::Predecessor => "predecessor",
            OpKind::Scan => "scan",
            OpKind::Insert => "insert",
            OpKind::Remove => "remove",
        }
    }
}

impl TryFrom<u32> for OpKind {
    type Error = BenchError;

    fn try_from(tag: u32) -> std::result::Result<Self, Self::Error> {
        OpKind::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| BenchError::LogFormat(format!("unknown operation kind {}", tag)))
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One on-disk log record
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationRecord {
    pub operands: [u64; 2],
    pub kind: u32,
    _pad: u32,
}

const _: () = assert!(std::mem::size_of::<OperationRecord>() == RECORD_SIZE);

// SAFETY: plain-old-data, every bit pattern is a valid value; kinds are
// checked when decoded.
unsafe impl mapped::FixedRecord for OperationRecord {}

impl OperationRecord {
    pub fn new(kind: OpKind, first: u64, second: u64) -> Self {
        Self {
            operands: [first, second],
            kind: kind as u32,
            _pad: 0,
        }
    }

    pub fn op_kind(&self) -> std::result::Result<OpKind, BenchError> {
        OpKind::try_from(self.kind)
    }

    /// Typed view of the record
    pub fn decode(&self) -> std::result::Result<Operation, BenchError> {
        let [a, b] = self.operands;
        Ok(match self.op_kind()? {
            OpKind::Empty => Operation::Empty,
            OpKind::Get => Operation::Get { key: a },
            OpKind::Update => Operation::Update { key: a, value: b },
            OpKind::Predecessor => Operation::Predecessor { key: a },
            OpKind::Scan => Operation::Scan { low: a, high: b },
            OpKind::Insert => Operation::Insert { key: a, value: b },
            OpKind::Remove => Operation::Remove { key: a },
        })
    }

    /// Serialized form, native endian like the mapping that reads it back
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[0..8].copy_from_slice(&self.operands[0].to_ne_bytes());
        out[8..16].copy_from_slice(&self.operands[1].to_ne_bytes());
        out[16..20].copy_from_slice(&self.kind.to_ne_bytes());
        out
    }
}

/// Decoded log operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Empty,
    Get { key: u64 },
    Update { key: u64, value: u64 },
    Predecessor { key: u64 },
    Scan { low: u64, high: u64 },
    Insert { key: u64, value: u64 },
    Remove { key: u64 },
}

impl Operation {
    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Empty => OpKind::Empty,
            Operation::Get { .. } => OpKind::Get,
            Operation::Update { .. } => OpKind::Update,
            Operation::Predecessor { .. } => OpKind::Predecessor,
            Operation::Scan { .. } => OpKind::Scan,
            Operation::Insert { .. } => OpKind::Insert,
            Operation::Remove { .. } => OpKind::Remove,
        }
    }

    /// Key the operation addresses (lower bound for scans)
    pub fn key(&self) -> Option<u64> {
        match *self {
            Operation::Empty => None,
            Operation::Get { key }
            | Operation::Update { key, .. }
            | Operation::Predecessor { key }
            | Operation::Insert { key, .. }
            | Operation::Remove { key } => Some(key),
            Operation::Scan { low, .. } => Some(low),
        }
    }
}

impl From<Operation> for OperationRecord {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Empty => OperationRecord::new(OpKind::Empty, 0, 0),
            Operation::Get { key } => OperationRecord::new(OpKind::Get, key, 0),
            Operation::Update { key, value } => OperationRecord::new(OpKind::Update, key, value),
            Operation::Predecessor { key } => OperationRecord::new(OpKind::Predecessor, key, 0),
            Operation::Scan { low, high } => OperationRecord::new(OpKind::Scan, low, high),
            Operation::Insert { key, value } => OperationRecord::new(OpKind::Insert, key, value),
            Operation::Remove { key } => OperationRecord::new(OpKind::Remove, key, 0),
        }
    }
}

/// Per-kind record counts of a log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    counts: [u64; 7],
}

impl OpCounts {
    pub fn get(&self, kind: OpKind) -> u64 {
        self.counts[kind as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

impl fmt::Display for OpCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for kind in OpKind::ALL {
            let n = self.get(kind);
            if n == 0 {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", kind, n)?;
            first = false;
        }
        Ok(())
    }
}

/// Check every record's kind and count them
///
/// Runs once at load time so workers never meet an undecodable record.
pub fn validate_records(records: &[OperationRecord]) -> Result<OpCounts> {
    let mut counts = OpCounts::default();
    for (i, record) in records.iter().enumerate() {
        let kind = record
            .op_kind()
            .map_err(|e| BenchError::LogFormat(format!("record {}: {}", i, e)))?;
        counts.counts[kind as usize] += 1;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<OperationRecord>(), 24);
        assert_eq!(std::mem::align_of::<OperationRecord>(), 8);

        let bytes = OperationRecord::new(OpKind::Scan, 1, 2).to_bytes();
        assert_eq!(&bytes[0..8], &1u64.to_ne_bytes());
        assert_eq!(&bytes[8..16], &2u64.to_ne_bytes());
        assert_eq!(&bytes[16..20], &4u32.to_ne_bytes());
        assert_eq!(&bytes[20..24], &[0u8; 4]);
    }

    #[test]
    fn test_decode_all_kinds() {
        let ops = [
            Operation::Empty,
            Operation::Get { key: 1 },
            Operation::Update { key: 2, value: 3 },
            Operation::Predecessor { key: 4 },
            Operation::Scan { low: 5, high: 9 },
            Operation::Insert { key: 6, value: 7 },
            Operation::Remove { key: 8 },
        ];
        for op in ops {
            let record = OperationRecord::from(op);
            assert_eq!(record.kind, op.kind() as u32);
            assert_eq!(record.decode().unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut record = OperationRecord::new(OpKind::Get, 1, 0);
        record.kind = 7;
        assert!(matches!(record.decode(), Err(BenchError::LogFormat(_))));
    }

    #[test]
    fn test_validate_records_counts_kinds() {
        let records = vec![
            OperationRecord::new(OpKind::Get, 1, 0),
            OperationRecord::new(OpKind::Get, 2, 0),
            OperationRecord::new(OpKind::Insert, 3, 3),
        ];
        let counts = validate_records(&records).unwrap();
        assert_eq!(counts.get(OpKind::Get), 2);
        assert_eq!(counts.get(OpKind::Insert), 1);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.to_string(), "get=2, insert=1");
    }

    #[test]
    fn test_validate_records_reports_position() {
        let mut bad = OperationRecord::new(OpKind::Get, 1, 0);
        bad.kind = 42;
        let records = vec![OperationRecord::new(OpKind::Get, 1, 0), bad];
        let err = validate_records(&records).unwrap_err();
        assert!(err.to_string().contains("record 1"));
    }

    #[test]
    fn test_operation_key() {
        assert_eq!(Operation::Empty.key(), None);
        assert_eq!(Operation::Scan { low: 3, high: 10 }.key(), Some(3));
        assert_eq!(Operation::Update { key: 5, value: 1 }.key(), Some(5));
    }
}
