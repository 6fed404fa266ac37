use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use rand::Rng;
use tracing::debug;

use crate::error::IntakeError;

/// File-backed counter that issues monotonically increasing subject numbers.
///
/// The backing file holds the last issued value as decimal ASCII. Every
/// issuance locks the file exclusively for the whole read-increment-write
/// sequence, so concurrent callers never observe or persist the same value.
#[derive(Clone, Debug)]
pub struct CounterStore {
    path: PathBuf,
}

impl CounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the backing file holding `0` if it does not exist yet.
    pub fn initialize(&self) -> Result<(), IntakeError> {
        if self.path.exists() {
            return Ok(());
        }
        let mut file = File::create(&self.path).map_err(IntakeError::CounterReadWrite)?;
        file.write_all(b"0")
            .map_err(IntakeError::CounterReadWrite)?;
        set_world_readable(&file)?;
        Ok(())
    }

    /// Issues the next subject number.
    ///
    /// Blocking (file lock plus synchronous I/O); async callers go through
    /// [`CounterStore::issue`].
    pub fn next(&self) -> Result<u64, IntakeError> {
        self.initialize()?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(IntakeError::CounterReadWrite)?;

        // Released on every exit path when the guard drops.
        let guard = LockGuard::acquire(file)?;

        let mut contents = String::new();
        (&guard.file)
            .read_to_string(&mut contents)
            .map_err(IntakeError::CounterReadWrite)?;

        // Corrupt or empty content counts as 0 rather than wedging issuance.
        let current: u64 = contents.trim().parse().unwrap_or(0);
        let next = current + 1;

        (&guard.file)
            .set_len(0)
            .map_err(IntakeError::CounterReadWrite)?;
        (&guard.file)
            .seek(SeekFrom::Start(0))
            .map_err(IntakeError::CounterReadWrite)?;
        (&guard.file)
            .write_all(next.to_string().as_bytes())
            .map_err(IntakeError::CounterReadWrite)?;
        (&guard.file)
            .sync_all()
            .map_err(IntakeError::CounterReadWrite)?;

        debug!(current, next, "counter incremented");
        Ok(next)
    }

    /// Async wrapper that moves the lock-and-rewrite off the runtime.
    pub async fn issue(&self) -> Result<u64, IntakeError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.next())
            .await
            .map_err(|err| {
                IntakeError::CounterReadWrite(std::io::Error::other(err.to_string()))
            })?
    }
}

struct LockGuard {
    file: File,
}

impl LockGuard {
    fn acquire(file: File) -> Result<Self, IntakeError> {
        file.lock_exclusive()
            .map_err(IntakeError::LockAcquisition)?;
        Ok(Self { file })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Pseudo-random 7-digit number substituted when issuance fails.
pub fn fallback_number() -> u64 {
    rand::thread_rng().gen_range(1_000_000..=9_999_999)
}

#[cfg(unix)]
fn set_world_readable(file: &File) -> Result<(), IntakeError> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(std::fs::Permissions::from_mode(0o644))
        .map_err(IntakeError::CounterReadWrite)
}

#[cfg(not(unix))]
fn set_world_readable(_file: &File) -> Result<(), IntakeError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::thread;

    use super::*;

    #[test]
    fn fresh_store_counts_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = CounterStore::new(dir.path().join("counter.txt"));

        assert_eq!(store.next().unwrap(), 1);
        assert_eq!(store.next().unwrap(), 2);
        assert_eq!(store.next().unwrap(), 3);
    }

    #[test]
    fn persists_value_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.txt");

        assert_eq!(CounterStore::new(&path).next().unwrap(), 1);
        assert_eq!(CounterStore::new(&path).next().unwrap(), 2);

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "2");
    }

    #[test]
    fn corrupt_content_resets_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.txt");
        std::fs::write(&path, "not a number").unwrap();

        let store = CounterStore::new(&path);
        assert_eq!(store.next().unwrap(), 1);
        assert_eq!(store.next().unwrap(), 2);
    }

    #[test]
    fn resumes_from_existing_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.txt");
        std::fs::write(&path, "41").unwrap();

        assert_eq!(CounterStore::new(&path).next().unwrap(), 42);
    }

    #[test]
    fn concurrent_issuance_yields_contiguous_unique_values() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 25;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counter.txt");
        std::fs::write(&path, "100").unwrap();

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let store = CounterStore::new(&path);
                thread::spawn(move || {
                    (0..PER_THREAD)
                        .map(|_| store.next().unwrap())
                        .collect::<Vec<u64>>()
                })
            })
            .collect();

        let mut issued = BTreeSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(issued.insert(value), "duplicate subject number {value}");
            }
        }

        let expected: BTreeSet<u64> = (101..=100 + (THREADS * PER_THREAD) as u64).collect();
        assert_eq!(issued, expected);
    }

    #[test]
    fn fallback_number_is_seven_digits() {
        for _ in 0..100 {
            let n = fallback_number();
            assert!((1_000_000..=9_999_999).contains(&n));
        }
    }
}
