use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;
use nom::bytes::complete::take;
use nom::number::complete::{le_i64, le_u32, u8 as frame_u8};
use nom::IResult;

use crate::error::ArchiveError;
use crate::model::{Record, RecordKind};

// Archive layout: a 6-byte file header (magic + format version) followed by
// back-to-back record frames until end of file.
//
// Frame: [timestamp_ms i64][kind u8][len u32][crc32 u32][payload len bytes]
pub const ARCHIVE_MAGIC: &[u8; 4] = b"SPS1";
pub const ARCHIVE_VERSION: u16 = 1;
const FILE_HEADER_LEN: usize = 6;

struct RawFrame<'a> {
    timestamp_ms: i64,
    kind_tag: u8,
    crc: u32,
    payload: &'a [u8],
}

fn parse_frame(input: &[u8]) -> IResult<&[u8], RawFrame<'_>> {
    let (input, timestamp_ms) = le_i64(input)?;
    let (input, kind_tag) = frame_u8(input)?;
    let (input, len) = le_u32(input)?;
    let (input, crc) = le_u32(input)?;
    let (input, payload) = take(len)(input)?;
    Ok((
        input,
        RawFrame {
            timestamp_ms,
            kind_tag,
            crc,
            payload,
        },
    ))
}

fn crc32(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Single-pass scan over one archive file, yielding records strictly in file
/// order. The file is mapped read-only; payloads are copied out per record.
pub struct ArchiveReader {
    mmap: Mmap,
    offset: usize,
}

impl ArchiveReader {
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < FILE_HEADER_LEN {
            return Err(ArchiveError::Corrupt("file shorter than header"));
        }
        if &mmap[..4] != ARCHIVE_MAGIC {
            return Err(ArchiveError::Unsupported("bad magic"));
        }
        let version = u16::from_le_bytes([mmap[4], mmap[5]]);
        if version != ARCHIVE_VERSION {
            return Err(ArchiveError::Unsupported("unknown format version"));
        }

        Ok(Self {
            mmap,
            offset: FILE_HEADER_LEN,
        })
    }

    fn next_record(&mut self) -> Result<Option<Record>, ArchiveError> {
        let input = &self.mmap[self.offset..];
        if input.is_empty() {
            return Ok(None);
        }

        let (rest, frame) =
            parse_frame(input).map_err(|_| ArchiveError::Corrupt("truncated record frame"))?;
        let kind = RecordKind::from_tag(frame.kind_tag)
            .ok_or(ArchiveError::Corrupt("unknown record kind"))?;
        if crc32(frame.payload) != frame.crc {
            return Err(ArchiveError::Corrupt("crc mismatch"));
        }

        self.offset = self.mmap.len() - rest.len();
        Ok(Some(Record {
            timestamp_ms: frame.timestamp_ms,
            kind,
            payload: frame.payload.to_vec(),
        }))
    }
}

impl Iterator for ArchiveReader {
    type Item = Result<Record, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Appends framed records with computed checksums. Used by tooling and tests
/// to synthesize archives; the service itself only ever reads.
pub struct ArchiveWriter {
    file: File,
}

impl ArchiveWriter {
    pub fn create(path: &Path) -> Result<Self, ArchiveError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(ARCHIVE_MAGIC)?;
        file.write_all(&ARCHIVE_VERSION.to_le_bytes())?;
        Ok(Self { file })
    }

    pub fn append(&mut self, record: &Record) -> Result<(), ArchiveError> {
        self.file.write_all(&record.timestamp_ms.to_le_bytes())?;
        self.file.write_all(&[record.kind.tag()])?;
        self.file
            .write_all(&(record.payload.len() as u32).to_le_bytes())?;
        self.file.write_all(&crc32(&record.payload).to_le_bytes())?;
        self.file.write_all(&record.payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_records() -> Vec<Record> {
        vec![
            Record {
                timestamp_ms: 1_516_600_800_000,
                kind: RecordKind::Plan,
                payload: b"P1".to_vec(),
            },
            Record {
                timestamp_ms: 1_516_600_800_000,
                kind: RecordKind::Field,
                payload: b"F1".to_vec(),
            },
            Record {
                timestamp_ms: 1_516_600_801_000,
                kind: RecordKind::Engine,
                payload: vec![0x00, 0xff, 0x10],
            },
        ]
    }

    fn write_archive(path: &Path, records: &[Record]) {
        let mut writer = ArchiveWriter::create(path).unwrap();
        for record in records {
            writer.append(record).unwrap();
        }
    }

    #[test]
    fn scans_records_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.sps");
        let records = sample_records();
        write_archive(&path, &records);

        let scanned: Vec<Record> = ArchiveReader::open(&path)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(scanned, records);
    }

    #[test]
    fn empty_archive_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.sps");
        write_archive(&path, &[]);

        assert_eq!(ArchiveReader::open(&path).unwrap().count(), 0);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.sps");
        fs::write(&path, b"NOPE\x01\x00").unwrap();

        assert!(matches!(
            ArchiveReader::open(&path),
            Err(ArchiveError::Unsupported(_))
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.sps");
        fs::write(&path, b"SPS1\x63\x00").unwrap();

        assert!(matches!(
            ArchiveReader::open(&path),
            Err(ArchiveError::Unsupported(_))
        ));
    }

    #[test]
    fn detects_flipped_payload_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.sps");
        write_archive(&path, &sample_records());

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let result: Result<Vec<Record>, ArchiveError> =
            ArchiveReader::open(&path).unwrap().collect();
        assert!(matches!(result, Err(ArchiveError::Corrupt("crc mismatch"))));
    }

    #[test]
    fn detects_truncated_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.sps");
        write_archive(&path, &sample_records());

        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 1);
        fs::write(&path, &bytes).unwrap();

        let result: Result<Vec<Record>, ArchiveError> =
            ArchiveReader::open(&path).unwrap().collect();
        assert!(matches!(result, Err(ArchiveError::Corrupt(_))));
    }

    #[test]
    fn detects_unknown_kind_tag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("day.sps");
        write_archive(
            &path,
            &[Record {
                timestamp_ms: 0,
                kind: RecordKind::Plan,
                payload: b"P1".to_vec(),
            }],
        );

        let mut bytes = fs::read(&path).unwrap();
        // kind byte sits right after the file header and the timestamp
        bytes[FILE_HEADER_LEN + 8] = 0x7f;
        fs::write(&path, &bytes).unwrap();

        let result: Result<Vec<Record>, ArchiveError> =
            ArchiveReader::open(&path).unwrap().collect();
        assert!(matches!(
            result,
            Err(ArchiveError::Corrupt("unknown record kind"))
        ));
    }
}
