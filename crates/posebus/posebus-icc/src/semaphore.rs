//! Named POSIX semaphore used as the cross-process channel lock.
//!
//! The semaphore is created with an initial count of 1 and only ever posted
//! after a successful wait, so it behaves as a mutex shared by name between
//! unrelated processes. Unlike a `flock` the kernel does not release it when
//! the holder dies; timed waits let callers notice that and re-create it.

use std::ffi::CString;
use std::io;
use std::time::Duration;

/// Permissions requested for newly created semaphores (subject to umask).
const SEM_MODE: libc::c_uint = 0o666;

pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String,
}

// SAFETY: a process-shared semaphore handle is usable from any thread; all
// operations on it are thread-safe per POSIX.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

impl NamedSemaphore {
    /// Opens the semaphore `name`, creating it unlocked if it does not exist.
    pub fn open(name: &str) -> io::Result<Self> {
        let c_name = c_name(name)?;
        // SAFETY: c_name is a valid NUL-terminated string; mode and value are
        // passed as the unsigned ints sem_open expects for O_CREAT.
        let sem = unsafe {
            libc::sem_open(c_name.as_ptr(), libc::O_CREAT, SEM_MODE, 1 as libc::c_uint)
        };
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    /// Removes the name system-wide. Handles already open keep working on
    /// the old semaphore. A missing name is not an error.
    pub fn unlink(name: &str) -> io::Result<()> {
        let c_name = c_name(name)?;
        // SAFETY: c_name is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(c_name.as_ptr()) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENOENT) {
            Ok(())
        } else {
            Err(err)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blocks until the semaphore is acquired.
    ///
    /// With `Some(timeout)` gives up after roughly that long and returns an
    /// error of kind `TimedOut`. Interrupted waits are retried.
    pub fn wait(&self, timeout: Option<Duration>) -> io::Result<()> {
        match timeout {
            None => self.wait_forever(),
            Some(timeout) => self.wait_timeout(timeout),
        }
    }

    fn wait_forever(&self) -> io::Result<()> {
        loop {
            // SAFETY: self.sem is a live handle from sem_open.
            if unsafe { libc::sem_wait(self.sem) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn wait_timeout(&self, timeout: Duration) -> io::Result<()> {
        // sem_timedwait takes an absolute CLOCK_REALTIME deadline.
        let deadline = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            + timeout;
        let ts = libc::timespec {
            tv_sec: deadline.as_secs() as libc::time_t,
            tv_nsec: deadline.subsec_nanos() as libc::c_long,
        };
        loop {
            // SAFETY: self.sem is a live handle; ts is a valid timespec.
            if unsafe { libc::sem_timedwait(self.sem, &ts) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::ETIMEDOUT) => return Err(io::ErrorKind::TimedOut.into()),
                _ => return Err(err),
            }
        }
    }

    // No sem_timedwait outside Linux; poll with a short sleep instead.
    #[cfg(not(target_os = "linux"))]
    fn wait_timeout(&self, timeout: Duration) -> io::Result<()> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            // SAFETY: self.sem is a live handle from sem_open.
            if unsafe { libc::sem_trywait(self.sem) } == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) => {
                    if std::time::Instant::now() >= deadline {
                        return Err(io::ErrorKind::TimedOut.into());
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                _ => return Err(err),
            }
        }
    }

    pub fn post(&self) -> io::Result<()> {
        // SAFETY: self.sem is a live handle from sem_open.
        if unsafe { libc::sem_post(self.sem) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // Close only; the name stays registered for other processes.
        // SAFETY: self.sem came from sem_open and is closed exactly once.
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

fn c_name(name: &str) -> io::Result<CString> {
    CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_name(tag: &str) -> String {
        format!("/posebus_semtest_{tag}_{}", std::process::id())
    }

    #[test]
    fn acquire_release_and_timeout() {
        let name = unique_name("timeout");
        let sem = NamedSemaphore::open(&name).unwrap();

        sem.wait(None).unwrap();
        let err = sem.wait(Some(Duration::from_millis(20))).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        sem.post().unwrap();
        sem.wait(Some(Duration::from_millis(20))).unwrap();
        sem.post().unwrap();

        NamedSemaphore::unlink(&name).unwrap();
    }

    #[test]
    fn unlink_missing_is_ok() {
        NamedSemaphore::unlink(&unique_name("missing")).unwrap();
    }

    #[test]
    fn rejects_interior_nul() {
        assert!(NamedSemaphore::open("/bad\0name").is_err());
    }
}
