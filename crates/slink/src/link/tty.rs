// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Real serial device access.
//!
//! [`TtyPort`] opens a tty device in raw 8-N-1 mode at a fixed baud rate
//! and exposes it through [`SerialPort`]. Reads use `VMIN = 0, VTIME = 1`:
//! the kernel returns within 100 ms whether or not a byte arrived, which
//! satisfies the bounded-wait contract the parse loops rely on.

use std::ffi::CString;
use std::io;

use super::port::SerialPort;

/// Map a numeric baud rate onto the termios speed constant.
fn speed_for(baud: u32) -> io::Result<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115_200 => libc::B115200,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported baud rate: {baud}"),
            ))
        }
    };
    Ok(speed)
}

/// A raw-mode serial device.
#[derive(Debug)]
pub struct TtyPort {
    fd: libc::c_int,
}

impl TtyPort {
    /// Open `path` at `baud`, 8 data bits, no parity, one stop bit.
    ///
    /// # Errors
    ///
    /// Any open or configuration failure surfaces as the underlying OS
    /// error; an unsupported baud rate reports `InvalidInput`.
    pub fn open(path: &str, baud: u32) -> io::Result<Self> {
        let speed = speed_for(baud)?;
        let cpath = CString::new(path)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;

        // SAFETY: cpath outlives the call; open returns -1 on failure.
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR | libc::O_NOCTTY) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let port = TtyPort { fd };

        // SAFETY: fd is a valid descriptor owned by `port`; termios is a
        // plain-old-data struct the kernel fills in.
        unsafe {
            let mut tio: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut tio) != 0 {
                return Err(io::Error::last_os_error());
            }

            libc::cfmakeraw(&mut tio);
            tio.c_cflag |= libc::CLOCAL | libc::CREAD;
            tio.c_cflag &= !libc::CSTOPB;

            // Bounded per-byte read: return after 100 ms with or without data.
            tio.c_cc[libc::VMIN] = 0;
            tio.c_cc[libc::VTIME] = 1;

            if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
                return Err(io::Error::last_os_error());
            }

            libc::tcflush(fd, libc::TCIOFLUSH);

            if libc::tcsetattr(fd, libc::TCSANOW, &tio) != 0 {
                return Err(io::Error::last_os_error());
            }
        }

        Ok(port)
    }
}

impl SerialPort for TtyPort {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        // SAFETY: fd is open for the lifetime of self; the buffer is one
        // byte on our stack.
        let n = unsafe { libc::read(self.fd, std::ptr::addr_of_mut!(byte).cast(), 1) };
        match n {
            1 => Ok(Some(byte)),
            0 => Ok(None),
            _ => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // SAFETY: fd is open; buf is a valid slice for the given length.
        let n = unsafe { libc::write(self.fd, buf.as_ptr().cast(), buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(n as usize)
    }
}

impl Drop for TtyPort {
    fn drop(&mut self) {
        // SAFETY: fd was opened by us and is closed exactly once.
        unsafe {
            libc::close(self.fd);
        }
    }
}
