//! `EventFdNotifier`: Linux `Notifier` implementation.
//!
//! `notify()` adds 1 to the eventfd counter; `wait()` polls the fd and
//! reads it, which resets the counter (eventfd coalescing semantics).

use std::os::unix::io::RawFd;
use std::time::Duration;

use portcall_core::error::{BridgeError, Result};

use super::Notifier;

fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// `poll(2)` timeout for `timeout`, rounded up to whole milliseconds so a
/// short nonzero wait never becomes a non-blocking check.
fn poll_timeout_ms(timeout: Duration) -> libc::c_int {
    timeout.as_nanos().div_ceil(1_000_000).min(i32::MAX as u128) as libc::c_int
}

pub struct EventFdNotifier {
    fd: RawFd,
}

impl EventFdNotifier {
    /// Create a new non-blocking, close-on-exec eventfd.
    pub fn create() -> Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(BridgeError::Os(last_errno()));
        }
        Ok(Self { fd })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Read and reset the counter. `Ok(0)` if nothing was pending.
    fn drain(&self) -> Result<u64> {
        let mut val: u64 = 0;
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = last_errno();
            if errno == libc::EAGAIN {
                return Ok(0);
            }
            return Err(BridgeError::Os(errno));
        }
        Ok(val)
    }
}

impl Notifier for EventFdNotifier {
    fn notify(&self) -> Result<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = last_errno();
            // Counter saturated: a wake-up is already pending.
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(BridgeError::Os(errno));
        }
        Ok(())
    }

    fn wait(&self, timeout: Duration) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, poll_timeout_ms(timeout)) };
        if ret < 0 {
            let errno = last_errno();
            if errno == libc::EINTR {
                return Ok(false);
            }
            return Err(BridgeError::Os(errno));
        }
        if ret == 0 {
            return Ok(false);
        }
        Ok(self.drain()? > 0)
    }

    fn raw_fd(&self) -> Option<i32> {
        Some(self.fd)
    }
}

impl Drop for EventFdNotifier {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_poll_timeout_rounds_up() {
        assert_eq!(poll_timeout_ms(Duration::ZERO), 0);
        assert_eq!(poll_timeout_ms(Duration::from_nanos(1)), 1);
        assert_eq!(poll_timeout_ms(Duration::from_micros(500)), 1);
        assert_eq!(poll_timeout_ms(Duration::from_millis(2)), 2);
        assert_eq!(poll_timeout_ms(Duration::from_micros(2001)), 3);
        assert_eq!(poll_timeout_ms(Duration::MAX), i32::MAX);
    }

    #[test]
    fn test_sub_millisecond_wait_blocks() {
        let n = EventFdNotifier::create().unwrap();
        let start = Instant::now();
        assert!(!n.wait(Duration::from_micros(500)).unwrap());
        assert!(start.elapsed() >= Duration::from_micros(500));
    }
}
