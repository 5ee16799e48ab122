use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::debug;

const POLL: Duration = Duration::from_millis(10);
const DEFAULT_WAIT: Duration = Duration::from_secs(5);

/// Exclusive hold on one store file for the life of a command.
///
/// The lock lives in a sibling `<store>.lock` file, so stores sharing a
/// directory never contend. The holder's pid is written into it for the
/// error shown to a second process.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
    path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("could not open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store is busy ({path}){}", holder_suffix(.holder))]
    Busy { path: PathBuf, holder: Option<u32> },
}

fn holder_suffix(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!(", held by dlog pid {}", pid),
        None => String::new(),
    }
}

/// `store.json` → `store.json.lock`
pub fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store".into());
    name.push(".lock");
    store_path.with_file_name(name)
}

impl StoreLock {
    /// Lock the store at `store_path`, waiting up to `wait` for another
    /// process to let go.
    pub fn acquire(store_path: &Path, wait: Duration) -> Result<Self, LockError> {
        let path = lock_path_for(store_path);
        let open_err = |source| LockError::Open {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(open_err)?;

        let deadline = Instant::now() + wait;
        while !try_flock(&file) {
            if Instant::now() >= deadline {
                let holder = read_holder(&mut file);
                return Err(LockError::Busy { path, holder });
            }
            std::thread::sleep(POLL);
        }
        debug!("locked {}", path.display());

        // the pid is informational only; a failed write does not lose the lock
        if let Err(e) = write_holder(&mut file) {
            debug!("could not record pid in {}: {}", path.display(), e);
        }
        Ok(StoreLock { _file: file, path })
    }

    pub fn acquire_default(store_path: &Path) -> Result<Self, LockError> {
        Self::acquire(store_path, DEFAULT_WAIT)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

// The lock file is never removed; a waiting process may hold its inode.

fn write_holder(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut text = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut text).ok()?;
    text.trim().parse().ok()
}

#[cfg(unix)]
fn try_flock(file: &File) -> bool {
    use std::os::unix::io::AsRawFd;
    unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) == 0 }
}

#[cfg(not(unix))]
fn try_flock(_file: &File) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_file_sits_beside_the_store() {
        assert_eq!(
            lock_path_for(Path::new("/data/store.json")),
            PathBuf::from("/data/store.json.lock")
        );
        assert_eq!(lock_path_for(Path::new("log.json")), PathBuf::from("log.json.lock"));
    }

    #[test]
    fn relock_after_drop() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("store.json");
        let lock = StoreLock::acquire_default(&store).unwrap();
        assert!(lock.path().exists());
        drop(lock);
        assert!(StoreLock::acquire_default(&store).is_ok());
    }

    #[test]
    fn creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("nested/data/store.json");
        let _lock = StoreLock::acquire_default(&store).unwrap();
        assert!(tmp.path().join("nested/data/store.json.lock").exists());
    }

    #[cfg(unix)]
    #[test]
    fn second_holder_sees_the_pid() {
        let tmp = TempDir::new().unwrap();
        let store = tmp.path().join("store.json");
        let _first = StoreLock::acquire_default(&store).unwrap();
        let err = StoreLock::acquire(&store, Duration::from_millis(50)).unwrap_err();
        match err {
            LockError::Busy { holder, .. } => assert_eq!(holder, Some(std::process::id())),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn stores_in_one_directory_do_not_contend() {
        let tmp = TempDir::new().unwrap();
        let _a = StoreLock::acquire_default(&tmp.path().join("a.json")).unwrap();
        assert!(StoreLock::acquire(&tmp.path().join("b.json"), Duration::from_millis(50)).is_ok());
    }
}
