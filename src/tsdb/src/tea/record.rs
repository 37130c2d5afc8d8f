use std::path::Path;

use bytes::{Buf, BufMut};
use chrono::{DateTime, Utc};
use common_base::point::EntitySample;
use iotdb_utils::time::unix_millis_to_time;

use crate::error::{Result, TsdbError};

pub(crate) const TEA_FILE_MAGIC: &[u8; 4] = b"TEA1";
pub(crate) const TEA_FILE_VERSION: u8 = 1;
pub const TEA_FILE_HEADER_SIZE: usize = 4 + 1;

/// timestamp(8) + entity_id(8) + value(8)
pub const TEA_ITEM_SIZE: usize = 8 + 8 + 8;

/// TeaFileHeader is the 5 byte preamble of every day and archive file.
///
/// ┌─────────────┬───────────┐
/// │ magic "TEA1"│  version  │
/// │     4B      │    1B     │
/// └─────────────┴───────────┘
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeaFileHeader {
    version: u8,
}

impl TeaFileHeader {
    pub fn new() -> Self {
        Self {
            version: TEA_FILE_VERSION,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(TEA_FILE_MAGIC);
        buf.put_u8(self.version);
    }

    pub fn decode(mut data: &[u8], path: &Path) -> Result<Self> {
        if data.len() < TEA_FILE_HEADER_SIZE {
            return Err(corrupted(path, "not enough data for header"));
        }
        if &data[..TEA_FILE_MAGIC.len()] != TEA_FILE_MAGIC {
            return Err(corrupted(path, "invalid magic"));
        }
        data.advance(TEA_FILE_MAGIC.len());

        let version = data.get_u8();
        if version != TEA_FILE_VERSION {
            return Err(corrupted(path, &format!("unsupported version {}", version)));
        }
        Ok(Self { version })
    }
}

impl Default for TeaFileHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// TeaItem is one fixed size record, big endian:
///
/// ┌──────────────────┬──────────────┬──────────┐
/// │ timestamp ms(i64)│ entity_id    │ value    │
/// │        8B        │     8B       │   8B     │
/// └──────────────────┴──────────────┴──────────┘
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeaItem {
    pub timestamp: DateTime<Utc>,
    pub entity_id: i64,
    pub value: f64,
}

impl TeaItem {
    pub fn new(entity_id: i64, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            entity_id,
            value,
        }
    }

    pub fn encode_to<B: BufMut>(&self, buf: &mut B) {
        buf.put_i64(self.timestamp.timestamp_millis());
        buf.put_i64(self.entity_id);
        buf.put_f64(self.value);
    }

    pub fn decode(mut data: &[u8], path: &Path) -> Result<Self> {
        if data.len() < TEA_ITEM_SIZE {
            return Err(corrupted(path, "not enough data for record"));
        }

        let millis = data.get_i64();
        let entity_id = data.get_i64();
        let value = data.get_f64();

        let timestamp = unix_millis_to_time(millis)
            .ok_or_else(|| corrupted(path, &format!("timestamp out of range: {}", millis)))?;
        Ok(Self {
            timestamp,
            entity_id,
            value,
        })
    }
}

impl From<TeaItem> for EntitySample {
    fn from(item: TeaItem) -> Self {
        EntitySample::new(item.entity_id, item.value, item.timestamp)
    }
}

fn corrupted(path: &Path, reason: &str) -> TsdbError {
    TsdbError::Corrupted {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use bytes::BytesMut;
    use chrono::{TimeZone, Utc};

    use crate::error::TsdbError;
    use crate::tea::{TeaFileHeader, TeaItem, TEA_FILE_HEADER_SIZE, TEA_ITEM_SIZE};

    #[test]
    fn test_record_layout() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let item = TeaItem::new(42, -1.5, ts);

        let mut buf = BytesMut::new();
        item.encode_to(&mut buf);
        assert_eq!(buf.len(), TEA_ITEM_SIZE);
        assert_eq!(&buf[..8], &1_700_000_000_123_i64.to_be_bytes());
        assert_eq!(&buf[8..16], &42_i64.to_be_bytes());
        assert_eq!(&buf[16..], &(-1.5_f64).to_be_bytes());

        let back = TeaItem::decode(&buf, Path::new("x.tea")).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_header() {
        let mut buf = BytesMut::new();
        TeaFileHeader::new().encode_to(&mut buf);
        assert_eq!(&buf[..], b"TEA1\x01");
        assert_eq!(buf.len(), TEA_FILE_HEADER_SIZE);

        let path = Path::new("x.tea");
        assert_eq!(TeaFileHeader::decode(&buf, path).unwrap().version(), 1);
        assert!(matches!(
            TeaFileHeader::decode(b"SSEG\x01", path),
            Err(TsdbError::Corrupted { .. })
        ));
        assert!(matches!(
            TeaFileHeader::decode(b"TEA", path),
            Err(TsdbError::Corrupted { .. })
        ));
    }
}
