use memmap2::MmapMut;
use std::{
    fs::{self, File, OpenOptions, Permissions},
    io,
    os::unix::fs::{OpenOptionsExt, PermissionsExt},
    path::{Path, PathBuf},
};

/// Access mode for segments shared with unrelated processes.
pub const SHARED_MODE: u32 = 0o666;

/// What `open_or_create` found at the segment path before mapping it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// No file existed; a fresh zero-filled one was created.
    Created,
    /// A file of sufficient size already existed and was reused as-is.
    Existing,
    /// A file existed but was smaller than requested; it was removed and recreated.
    ReplacedStale { old_len: u64 },
}

/// A read-write shared mapping of a file (typically under `/dev/shm`).
///
/// Dropping the mapping unmaps it from this process only. The backing file
/// stays in place so later attachers see the same bytes.
pub struct SharedMapping {
    _file: File,
    mmap: MmapMut,
    path: PathBuf,
}

impl SharedMapping {
    /// Open the file at `path`, creating it if needed, and map exactly `size_bytes`.
    ///
    /// Existing contents are never truncated. A non-empty file shorter than
    /// `size_bytes` was left by an older layout and is removed before a fresh
    /// one is created.
    pub fn open_or_create<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<(Self, Attach)> {
        let path = path.as_ref();
        let mut attach = Attach::Created;

        match fs::metadata(path) {
            // Zero length means a peer is mid-creation, not an old layout.
            Ok(meta) if meta.len() > 0 && meta.len() < size_bytes => {
                Self::remove(path)?;
                attach = Attach::ReplacedStale { old_len: meta.len() };
            }
            Ok(_) => attach = Attach::Existing,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .mode(SHARED_MODE)
            .open(path)?;

        // Another process may have created the file between the metadata probe
        // and the open, so the length is checked again on the real handle.
        if file.metadata()?.len() < size_bytes {
            file.set_len(size_bytes)?;
            // Creation mode is filtered by the umask; peers need write access too.
            file.set_permissions(Permissions::from_mode(SHARED_MODE))?;
        }

        let mmap = unsafe { memmap2::MmapOptions::new().len(size_bytes as usize).map_mut(&file)? };

        Ok((
            Self {
                _file: file,
                mmap,
                path: path.to_path_buf(),
            },
            attach,
        ))
    }

    /// Remove the backing file system-wide. Existing mappings stay valid.
    pub fn remove<P: AsRef<Path>>(path: P) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    #[cfg(test)]
    fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    #[cfg(test)]
    fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.mmap
    }

    /// Return raw pointer to start of the mapped data
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_then_reuses_without_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg");

        let (mut first, attach) = SharedMapping::open_or_create(&path, 4096).unwrap();
        assert_eq!(attach, Attach::Created);
        first.as_mut_slice()[10] = 0xAB;
        drop(first);

        let (second, attach) = SharedMapping::open_or_create(&path, 4096).unwrap();
        assert_eq!(attach, Attach::Existing);
        assert_eq!(second.as_slice()[10], 0xAB);
        assert_eq!(second.len(), 4096);
    }

    #[test]
    fn smaller_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg");
        std::fs::write(&path, [0xFFu8; 100]).unwrap();

        let (m, attach) = SharedMapping::open_or_create(&path, 4096).unwrap();
        assert_eq!(attach, Attach::ReplacedStale { old_len: 100 });
        assert!(m.as_slice().iter().all(|b| *b == 0));
    }

    #[test]
    fn mappings_share_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg");

        let (mut a, _) = SharedMapping::open_or_create(&path, 64).unwrap();
        let (b, _) = SharedMapping::open_or_create(&path, 64).unwrap();
        a.as_mut_slice()[0] = 7;
        assert_eq!(b.as_slice()[0], 7);
    }

    #[test]
    fn remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        SharedMapping::remove(dir.path().join("nope")).unwrap();
    }
}
