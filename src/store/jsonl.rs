//! JSON-lines file sink: one serialized document per line.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{BulkPersister, StoreError};
use crate::document::TestCaseDocument;

/// Appends documents to a JSONL file.
///
/// A batch lands whole or not at all: it is serialized in memory first, and a
/// failed write truncates the file back to its previous length.
#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Creates a sink that appends to `path`, creating the file when missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_batch(&self, documents: &[TestCaseDocument]) -> Result<usize, StoreError> {
        let mut buffer = Vec::new();
        for document in documents {
            serde_json::to_writer(&mut buffer, document)?;
            buffer.push(b'\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        append_or_rollback(&mut file, &buffer)?;
        Ok(documents.len())
    }
}

impl BulkPersister for JsonlStore {
    async fn insert_many(&self, documents: &[TestCaseDocument]) -> Result<usize, StoreError> {
        self.write_batch(documents)
    }
}

/// Append target that can be cut back to an earlier length.
trait Truncate: Write {
    fn current_len(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

fn append_or_rollback<T: Truncate>(target: &mut T, bytes: &[u8]) -> io::Result<()> {
    let start = target.current_len()?;
    let written = target.write_all(bytes).and_then(|()| target.flush());
    if let Err(err) = written {
        if let Err(rollback) = target.truncate_to(start) {
            warn!(error = %rollback, len = start, "failed to truncate partial jsonl batch");
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentAssembler, DocumentParts};

    fn document(id: &str) -> TestCaseDocument {
        DocumentAssembler
            .assemble(DocumentParts {
                test_case_id: id.to_string(),
                steps: "Step 1: Open app".to_string(),
                ..DocumentParts::default()
            })
            .expect("assemble")
    }

    #[tokio::test]
    async fn appends_one_line_per_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonlStore::new(dir.path().join("cases.jsonl"));
        let stored = store
            .insert_many(&[document("TC-1"), document("TC-2")])
            .await
            .expect("first batch");
        assert_eq!(stored, 2);
        store
            .insert_many(&[document("TC-3")])
            .await
            .expect("second batch");

        let contents = std::fs::read_to_string(store.path()).expect("read output");
        let ids: Vec<String> = contents
            .lines()
            .map(|line| {
                let doc: TestCaseDocument = serde_json::from_str(line).expect("valid line");
                doc.test_case_id
            })
            .collect();
        assert_eq!(ids, vec!["TC-1", "TC-2", "TC-3"]);
    }

    /// Accepts `capacity` bytes, then fails like a full disk.
    struct ShortDisk {
        data: Vec<u8>,
        capacity: usize,
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.data.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Truncate for ShortDisk {
        fn current_len(&self) -> io::Result<u64> {
            Ok(self.data.len() as u64)
        }

        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn failed_append_leaves_previous_contents_untouched() {
        let mut disk = ShortDisk {
            data: b"{\"earlier\":1}\n".to_vec(),
            capacity: 24,
        };
        let before = disk.data.clone();
        let err = append_or_rollback(&mut disk, b"{\"a\":1}\n{\"b\":2}\n{\"c\":3}\n")
            .expect_err("disk fills up mid-batch");
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert_eq!(disk.data, before);
    }

    #[test]
    fn successful_append_extends_the_target() {
        let mut disk = ShortDisk {
            data: Vec::new(),
            capacity: 64,
        };
        append_or_rollback(&mut disk, b"{}\n").expect("append");
        assert_eq!(disk.data, b"{}\n");
    }

    #[tokio::test]
    async fn unwritable_path_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonlStore::new(dir.path().join("missing").join("cases.jsonl"));
        let err = store
            .insert_many(&[document("TC-1")])
            .await
            .expect_err("missing parent directory");
        assert!(matches!(err, StoreError::Io(_)));
    }
}
