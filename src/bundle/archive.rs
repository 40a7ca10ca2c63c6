use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Error, Result};
use crate::types::Bundle;

/// Name of the trailing manifest entry inside a downloaded archive.
pub const MANIFEST_NAME: &str = "bundle.json";

/// One manifest row: the original filename for a content-hash entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub hash: String,
}

fn zip_err(e: zip::result::ZipError) -> Error {
    Error::Storage(std::io::Error::other(e))
}

/// Packages a set of bundles into a single zip streamed to `sink`.
///
/// Entries are named by content hash, never by original filename, so
/// colliding or hostile names cannot clash or traverse paths; the manifest
/// written last maps each hash back to its original name. Identical content
/// is stored once even when several bundles share a hash. A bundle whose
/// backing file is missing is omitted from both the entries and the manifest.
///
/// `sink` only needs `Write`: the zip writer's seek-backs to patch each
/// entry's local header land in a window buffer that is flushed downstream
/// entry by entry, so at most one entry is ever held in memory and finished
/// entries reach the sink while later ones are still being packed.
pub fn build_archive<W: Write>(sink: W, bundle_dir: &Path, bundles: &[Bundle]) -> Result<()> {
    let window = WindowWriter::new(sink);
    let control = window.clone();
    let mut zip = ZipWriter::new(window);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut manifest: Vec<ManifestEntry> = Vec::with_capacity(bundles.len());
    let mut written: HashSet<&str> = HashSet::new();

    for bundle in bundles {
        if !written.contains(bundle.hash.as_str()) {
            let path = bundle_dir.join(&bundle.hash);
            let mut file = match File::open(&path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(
                        hash = %bundle.hash,
                        "skipping bundle with missing backing file: {e}"
                    );
                    continue;
                }
            };

            // Starting the next entry patches the previous one's local
            // header; everything before the new header is then final.
            let mark = control.position();
            zip.start_file(bundle.hash.clone(), options).map_err(zip_err)?;
            control.release_to(mark)?;

            std::io::copy(&mut file, &mut zip)?;
            written.insert(bundle.hash.as_str());
        }

        manifest.push(ManifestEntry {
            name: bundle.name.clone(),
            hash: bundle.hash.clone(),
        });
    }

    let mark = control.position();
    zip.start_file(MANIFEST_NAME, options).map_err(zip_err)?;
    control.release_to(mark)?;

    let manifest = serde_json::to_vec(&manifest).map_err(std::io::Error::other)?;
    zip.write_all(&manifest)?;

    zip.finish().map_err(zip_err)?;
    control.release_all()?;
    Ok(())
}

struct Window<W: Write> {
    sink: W,
    buf: Vec<u8>,
    base: u64,
    pos: u64,
}

/// A `Write + Seek` facade over a plain `Write` sink.
///
/// Bytes accumulate in a window starting at `base`; seeks are honored within
/// the window only. `release_to` flushes a finalized prefix downstream and
/// advances `base`, after which that region can no longer be revisited.
struct WindowWriter<W: Write> {
    state: Rc<RefCell<Window<W>>>,
}

impl<W: Write> Clone for WindowWriter<W> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<W: Write> WindowWriter<W> {
    fn new(sink: W) -> Self {
        Self {
            state: Rc::new(RefCell::new(Window {
                sink,
                buf: Vec::new(),
                base: 0,
                pos: 0,
            })),
        }
    }

    fn position(&self) -> u64 {
        self.state.borrow().pos
    }

    fn release_to(&self, upto: u64) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        if upto <= state.base {
            return Ok(());
        }
        let n = ((upto - state.base) as usize).min(state.buf.len());
        state.sink.write_all(&state.buf[..n])?;
        state.buf.drain(..n);
        state.base += n as u64;
        Ok(())
    }

    fn release_all(&self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        state.sink.write_all(&state.buf)?;
        state.base += state.buf.len() as u64;
        state.buf.clear();
        state.sink.flush()
    }
}

impl<W: Write> Write for WindowWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        if state.pos < state.base {
            return Err(io::Error::other("write into released window"));
        }
        let off = (state.pos - state.base) as usize;
        if off > state.buf.len() {
            return Err(io::Error::other("write past end of window"));
        }
        let overlap = data.len().min(state.buf.len() - off);
        state.buf[off..off + overlap].copy_from_slice(&data[..overlap]);
        state.buf.extend_from_slice(&data[overlap..]);
        state.pos += data.len() as u64;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.borrow_mut().sink.flush()
    }
}

impl<W: Write> Seek for WindowWriter<W> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let mut state = self.state.borrow_mut();
        let end = state.base + state.buf.len() as u64;
        let target = match pos {
            SeekFrom::Start(p) => i128::from(p),
            SeekFrom::End(d) => i128::from(end) + i128::from(d),
            SeekFrom::Current(d) => i128::from(state.pos) + i128::from(d),
        };
        if target < i128::from(state.base) || target > i128::from(end) {
            return Err(io::Error::other("seek outside buffered window"));
        }
        state.pos = target as u64;
        Ok(state.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileType;
    use chrono::Utc;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn bundle(id: i64, name: &str, hash: &str) -> Bundle {
        Bundle {
            id,
            release_id: 7,
            hash: hash.to_string(),
            name: name.to_string(),
            file_type: FileType::from_filename(name),
            created_at: Utc::now(),
        }
    }

    fn write_content(dir: &Path, hash: &str, content: &[u8]) {
        std::fs::write(dir.join(hash), content).unwrap();
    }

    fn archive_bytes(dir: &Path, bundles: &[Bundle]) -> Vec<u8> {
        let mut bytes = Vec::new();
        build_archive(&mut bytes, dir, bundles).unwrap();
        bytes
    }

    fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
        let mut entry = archive.by_name(name).unwrap();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_entries_and_trailing_manifest() {
        let dir = TempDir::new().unwrap();
        let h1 = "11".repeat(32);
        let h2 = "22".repeat(32);
        write_content(dir.path(), &h1, b"content-a");
        write_content(dir.path(), &h2, b"content-b");

        let bundles = [bundle(1, "a.bin", &h1), bundle(2, "b.bin", &h2)];
        let bytes = archive_bytes(dir.path(), &bundles);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec![h1.clone(), h2.clone(), MANIFEST_NAME.to_string()]);

        assert_eq!(read_entry(&mut archive, &h1), b"content-a");
        assert_eq!(read_entry(&mut archive, &h2), b"content-b");

        let manifest: Vec<ManifestEntry> =
            serde_json::from_slice(&read_entry(&mut archive, MANIFEST_NAME)).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!((manifest[0].name.as_str(), manifest[0].hash.as_str()), ("a.bin", h1.as_str()));
        assert_eq!((manifest[1].name.as_str(), manifest[1].hash.as_str()), ("b.bin", h2.as_str()));
    }

    #[test]
    fn test_shared_hash_stored_once() {
        let dir = TempDir::new().unwrap();
        let h = "33".repeat(32);
        write_content(dir.path(), &h, b"shared");

        let bundles = [bundle(1, "a.bin", &h), bundle(2, "b.bin", &h)];
        let bytes = archive_bytes(dir.path(), &bundles);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2); // one content entry + manifest

        let manifest: Vec<ManifestEntry> =
            serde_json::from_slice(&read_entry(&mut archive, MANIFEST_NAME)).unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].name, "a.bin");
        assert_eq!(manifest[1].name, "b.bin");
    }

    #[test]
    fn test_missing_backing_file_omitted() {
        let dir = TempDir::new().unwrap();
        let present = "44".repeat(32);
        let absent = "55".repeat(32);
        write_content(dir.path(), &present, b"here");

        let bundles = [bundle(1, "here.bin", &present), bundle(2, "gone.bin", &absent)];
        let bytes = archive_bytes(dir.path(), &bundles);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        assert!(archive.by_name(&absent).is_err());

        let manifest: Vec<ManifestEntry> =
            serde_json::from_slice(&read_entry(&mut archive, MANIFEST_NAME)).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].name, "here.bin");
    }

    #[test]
    fn test_empty_release_is_manifest_only() {
        let dir = TempDir::new().unwrap();
        let bytes = archive_bytes(dir.path(), &[]);

        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1);
        let manifest: Vec<ManifestEntry> =
            serde_json::from_slice(&read_entry(&mut archive, MANIFEST_NAME)).unwrap();
        assert!(manifest.is_empty());
    }

    #[derive(Clone, Default)]
    struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedSink {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_window_writer_patches_before_release() {
        let sink = SharedSink::default();
        let mut w = WindowWriter::new(sink.clone());

        w.write_all(b"abcdef").unwrap();
        w.seek(SeekFrom::Start(1)).unwrap();
        w.write_all(b"X").unwrap();
        w.seek(SeekFrom::End(0)).unwrap();

        // The patched prefix reaches the sink while the tail is still open.
        w.release_to(4).unwrap();
        assert_eq!(*sink.0.borrow(), b"aXcd");

        w.write_all(b"gh").unwrap();
        w.release_all().unwrap();
        assert_eq!(*sink.0.borrow(), b"aXcdefgh");
    }

    #[test]
    fn test_window_writer_rejects_seek_into_released_region() {
        let sink = SharedSink::default();
        let mut w = WindowWriter::new(sink);

        w.write_all(b"abcdef").unwrap();
        let control = w.clone();
        control.release_to(4).unwrap();

        assert!(w.seek(SeekFrom::Start(2)).is_err());
        assert!(w.seek(SeekFrom::Start(4)).is_ok());
    }

    #[test]
    fn test_large_entries_stream_through_write_only_sink() {
        let dir = TempDir::new().unwrap();
        let h1 = "66".repeat(32);
        let h2 = "77".repeat(32);
        let big = vec![0xa5u8; 256 * 1024];
        write_content(dir.path(), &h1, &big);
        write_content(dir.path(), &h2, b"tail");

        let sink = SharedSink::default();
        let bundles = [bundle(1, "big.bin", &h1), bundle(2, "tail.bin", &h2)];
        build_archive(sink.clone(), dir.path(), &bundles).unwrap();

        let bytes = sink.0.borrow().clone();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
        assert_eq!(read_entry(&mut archive, &h1), big);
        assert_eq!(read_entry(&mut archive, &h2), b"tail");
    }
}
