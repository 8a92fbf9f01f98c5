//! Serial port byte source.
//!
//! The port is opened read/write, configured for the requested baud rate,
//! 8 data bits, no parity, one stop bit, raw mode, and read without blocking.
//! All platform specifics live in the `imp` module for the build target; the
//! rest of the crate only sees [`SerialPort`] through [`ByteSource`].

use log::info;

use super::{ByteSource, SensorError};

pub struct SerialPort {
    inner: imp::RawPort,
    device: String,
}

impl SerialPort {
    /// Open and configure `device`, e.g. `/dev/ttyUSB0` or `COM3`.
    pub fn open(device: &str, baud_rate: u32) -> Result<Self, SensorError> {
        let inner = imp::RawPort::open(device, baud_rate)?;
        info!("{device}: opened at {baud_rate} baud, 8N1");
        Ok(Self {
            inner,
            device: device.to_owned(),
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl ByteSource for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        self.inner.read(buf)
    }
}

impl core::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SerialPort")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

#[cfg(unix)]
mod imp {
    use std::ffi::CString;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

    use log::{debug, warn};

    use crate::sensors::SensorError;

    pub(super) struct RawPort {
        /// Closed on drop
        fd: OwnedFd,
    }

    impl RawPort {
        pub(super) fn open(device: &str, baud_rate: u32) -> Result<Self, SensorError> {
            let speed = speed_for(baud_rate).ok_or_else(|| SensorError::UnsupportedBaudRate {
                device: device.to_owned(),
                baud_rate,
            })?;

            let path = CString::new(device).map_err(|_| SensorError::OpenFailed {
                device: device.to_owned(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "device path contains NUL"),
            })?;

            // SAFETY: `path` is a valid NUL-terminated string for the duration of the call.
            let fd = unsafe {
                libc::open(
                    path.as_ptr(),
                    libc::O_RDWR | libc::O_NOCTTY | libc::O_NDELAY,
                )
            };
            if fd < 0 {
                return Err(SensorError::OpenFailed {
                    device: device.to_owned(),
                    source: io::Error::last_os_error(),
                });
            }
            // SAFETY: `fd` was just returned by open(2) and is owned by nobody else.
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };

            // A port that refuses the line settings still delivers bytes, just
            // possibly garbled ones. Keep it.
            if let Err(e) = configure(fd.as_raw_fd(), speed) {
                warn!("{device}: failed to apply line settings: {e}");
            }

            Ok(Self { fd })
        }

        pub(super) fn read(&mut self, buf: &mut [u8]) -> usize {
            // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
            let n = unsafe { libc::read(self.fd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() != io::ErrorKind::WouldBlock {
                    debug!("serial read failed: {err}");
                }
                return 0;
            }
            n as usize
        }
    }

    fn configure(fd: RawFd, speed: libc::speed_t) -> io::Result<()> {
        // SAFETY: termios is plain data; tcgetattr fills it before use.
        let mut cfg: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut cfg) } != 0 {
            return Err(io::Error::last_os_error());
        }

        unsafe {
            libc::cfsetispeed(&mut cfg, speed);
            libc::cfsetospeed(&mut cfg, speed);
        }

        cfg.c_cflag &= !(libc::PARENB | libc::CSTOPB | libc::CSIZE);
        cfg.c_cflag |= libc::CS8;
        cfg.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ECHOE | libc::ISIG);

        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &cfg) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn speed_for(baud_rate: u32) -> Option<libc::speed_t> {
        let speed = match baud_rate {
            1200 => libc::B1200,
            2400 => libc::B2400,
            4800 => libc::B4800,
            9600 => libc::B9600,
            19200 => libc::B19200,
            38400 => libc::B38400,
            57600 => libc::B57600,
            115200 => libc::B115200,
            230400 => libc::B230400,
            _ => return None,
        };
        Some(speed)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_missing_device() {
            let err = RawPort::open("/dev/this-port-does-not-exist", 9600).err();
            assert!(matches!(err, Some(SensorError::OpenFailed { .. })));
        }

        #[test]
        fn test_unsupported_baud() {
            let err = RawPort::open("/dev/null", 12345).err();
            assert!(matches!(
                err,
                Some(SensorError::UnsupportedBaudRate { baud_rate: 12345, .. })
            ));
        }

        #[test]
        fn test_non_tty_reads_as_empty() {
            // /dev/null opens fine but is no tty: configuration fails with a
            // warning and reads report end of stream as zero bytes.
            let mut port = RawPort::open("/dev/null", 9600).expect("open /dev/null");
            let mut buf = [0u8; 1];
            assert_eq!(port.read(&mut buf), 0);
        }
    }
}

#[cfg(windows)]
mod imp {
    use std::ffi::CString;
    use std::io;
    use std::ptr;

    use log::{debug, warn};
    use windows_sys::Win32::Devices::Communication::{
        COMMTIMEOUTS, DCB, GetCommState, NOPARITY, ONESTOPBIT, SetCommState, SetCommTimeouts,
    };
    use windows_sys::Win32::Foundation::{
        CloseHandle, GENERIC_READ, GENERIC_WRITE, HANDLE, INVALID_HANDLE_VALUE,
    };
    use windows_sys::Win32::Storage::FileSystem::{CreateFileA, OPEN_EXISTING, ReadFile};

    use crate::sensors::SensorError;

    pub(super) struct RawPort {
        handle: HANDLE,
    }

    impl RawPort {
        pub(super) fn open(device: &str, baud_rate: u32) -> Result<Self, SensorError> {
            let path = CString::new(device).map_err(|_| SensorError::OpenFailed {
                device: device.to_owned(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "device path contains NUL"),
            })?;

            // SAFETY: `path` is NUL-terminated and outlives the call.
            let handle = unsafe {
                CreateFileA(
                    path.as_ptr().cast(),
                    GENERIC_READ | GENERIC_WRITE,
                    0,
                    ptr::null(),
                    OPEN_EXISTING,
                    0,
                    ptr::null_mut(),
                )
            };
            if handle == INVALID_HANDLE_VALUE {
                return Err(SensorError::OpenFailed {
                    device: device.to_owned(),
                    source: io::Error::last_os_error(),
                });
            }

            let port = Self { handle };
            if let Err(e) = port.configure(baud_rate) {
                warn!("{device}: failed to apply line settings: {e}");
            }
            Ok(port)
        }

        fn configure(&self, baud_rate: u32) -> io::Result<()> {
            // SAFETY: DCB is plain data; GetCommState fills it before use.
            let mut dcb: DCB = unsafe { std::mem::zeroed() };
            dcb.DCBlength = size_of::<DCB>() as u32;
            if unsafe { GetCommState(self.handle, &mut dcb) } == 0 {
                return Err(io::Error::last_os_error());
            }
            dcb.BaudRate = baud_rate;
            dcb.ByteSize = 8;
            dcb.StopBits = ONESTOPBIT;
            dcb.Parity = NOPARITY;
            if unsafe { SetCommState(self.handle, &dcb) } == 0 {
                return Err(io::Error::last_os_error());
            }

            // Return from ReadFile within ~50 ms even when nothing arrives.
            let timeouts = COMMTIMEOUTS {
                ReadIntervalTimeout: 50,
                ReadTotalTimeoutMultiplier: 10,
                ReadTotalTimeoutConstant: 50,
                WriteTotalTimeoutMultiplier: 0,
                WriteTotalTimeoutConstant: 0,
            };
            if unsafe { SetCommTimeouts(self.handle, &timeouts) } == 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        }

        pub(super) fn read(&mut self, buf: &mut [u8]) -> usize {
            let mut read: u32 = 0;
            let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
            // SAFETY: `buf` is valid for writes of `len` bytes; no overlapped I/O.
            let ok = unsafe {
                ReadFile(
                    self.handle,
                    buf.as_mut_ptr(),
                    len,
                    &mut read,
                    ptr::null_mut(),
                )
            };
            if ok == 0 {
                debug!("serial read failed: {}", io::Error::last_os_error());
                return 0;
            }
            read as usize
        }
    }

    impl Drop for RawPort {
        fn drop(&mut self) {
            // SAFETY: the handle came from CreateFileA and is closed exactly once.
            unsafe {
                CloseHandle(self.handle);
            }
        }
    }
}
