//! Transport layer abstraction for bootloader communication
//!
//! The protocol runs over any blocking byte stream with a bounded read
//! timeout. A read that sees no data within the timeout returns what it has
//! so far; it is up to the caller to treat a short result as a failure.

use crate::error::{ProtocolError, Result};
use crate::protocol::MAX_LINE_LEN;

/// Transport trait for reading and writing bytes
pub trait Transport {
    /// Write all bytes to the transport
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Flush any buffered data
    fn flush(&mut self) -> Result<()>;

    /// Read up to `buf.len()` bytes
    ///
    /// Keeps reading until the buffer is full or the read timeout expires.
    /// Returns the number of bytes read, 0 if nothing arrived in time.
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read one text line
    ///
    /// Reads until `\n` or until the read timeout expires. The result is
    /// decoded lossily and stripped of surrounding whitespace, so a timeout
    /// yields an empty string. A line longer than [`MAX_LINE_LEN`] is a
    /// [`ProtocolError::MalformedResponse`].
    fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let mut byte = [0u8];
        loop {
            if self.read_up_to(&mut byte)? == 0 {
                break;
            }
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
            if line.len() >= MAX_LINE_LEN {
                return Err(ProtocolError::MalformedResponse(format!(
                    "no end of line within {} bytes",
                    MAX_LINE_LEN
                )));
            }
        }
        Ok(String::from_utf8_lossy(&line).trim().to_string())
    }

    /// Close the underlying connection
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        (**self).write_all(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_up_to(buf)
    }

    fn read_line(&mut self) -> Result<String> {
        (**self).read_line()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

#[cfg(feature = "serial")]
pub mod serial {
    //! Serial port transport and USB device discovery

    use super::*;
    use crate::protocol::{BOOTLOADER_PID, BOOTLOADER_VID, DEFAULT_BAUD, READ_TIMEOUT};
    use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
    use std::io::{self, Read, Write};
    use std::time::{Duration, Instant};

    /// A USB serial port seen during enumeration
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct UsbSerialDevice {
        /// OS device path (e.g. "/dev/ttyACM0" or "COM3")
        pub port_name: String,
        /// USB vendor ID
        pub vid: u16,
        /// USB product ID
        pub pid: u16,
        /// USB product string, if reported
        pub product: Option<String>,
        /// USB serial number, if reported
        pub serial_number: Option<String>,
    }

    impl UsbSerialDevice {
        /// True if the identifier pair matches exactly
        pub fn matches(&self, vendor_id: u16, product_id: u16) -> bool {
            self.vid == vendor_id && self.pid == product_id
        }

        /// True if this is an Eternity bootloader
        pub fn is_bootloader(&self) -> bool {
            self.matches(BOOTLOADER_VID, BOOTLOADER_PID)
        }
    }

    /// Enumerate all USB serial ports
    ///
    /// Ports that are not USB devices cannot report an identifier pair and
    /// are skipped.
    pub fn list_devices() -> Result<Vec<UsbSerialDevice>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .filter_map(|port| match port.port_type {
                SerialPortType::UsbPort(info) => Some(UsbSerialDevice {
                    port_name: port.port_name,
                    vid: info.vid,
                    pid: info.pid,
                    product: info.product,
                    serial_number: info.serial_number,
                }),
                _ => None,
            })
            .collect())
    }

    /// Pick the first device with the given identifier pair
    pub fn select_device(
        devices: &[UsbSerialDevice],
        vendor_id: u16,
        product_id: u16,
    ) -> Result<&UsbSerialDevice> {
        devices
            .iter()
            .find(|dev| dev.matches(vendor_id, product_id))
            .ok_or(ProtocolError::DeviceNotFound {
                vendor_id,
                product_id,
            })
    }

    /// Find the serial port of a device by USB vendor/product ID
    pub fn discover(vendor_id: u16, product_id: u16) -> Result<String> {
        let devices = list_devices()?;
        let device = select_device(&devices, vendor_id, product_id)?;
        log::debug!(
            "Found {:04X}:{:04X} at {}",
            vendor_id,
            product_id,
            device.port_name
        );
        Ok(device.port_name.clone())
    }

    /// Fill `buf` from `reader` until it is full or `deadline` passes
    ///
    /// `arm` is called before every read with the time left, so a reader
    /// with its own timeout never blocks past the deadline. Returns the
    /// number of bytes read.
    fn fill_before<R, F>(
        reader: &mut R,
        buf: &mut [u8],
        deadline: Instant,
        mut arm: F,
    ) -> io::Result<usize>
    where
        R: Read + ?Sized,
        F: FnMut(&mut R, Duration) -> io::Result<()>,
    {
        let mut filled = 0;
        while filled < buf.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            arm(reader, remaining)?;
            match reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    /// Serial port transport
    pub struct SerialTransport {
        port: Option<Box<dyn SerialPort>>,
    }

    impl SerialTransport {
        /// Open a serial port with the specified baud rate
        ///
        /// Uses 115200 baud if none is given. The read timeout is fixed.
        pub fn open(device: &str, baud: Option<u32>) -> Result<Self> {
            let baud_rate = baud.unwrap_or(DEFAULT_BAUD);

            let port = serialport::new(device, baud_rate)
                .data_bits(DataBits::Eight)
                .parity(Parity::None)
                .stop_bits(StopBits::One)
                .flow_control(FlowControl::None)
                .timeout(READ_TIMEOUT)
                .open()?;

            log::info!("Opened serial port {} at {} baud", device, baud_rate);

            Ok(Self { port: Some(port) })
        }

        fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
            self.port
                .as_mut()
                .ok_or_else(|| ProtocolError::Io("serial port is closed".into()))
        }
    }

    impl Transport for SerialTransport {
        fn write_all(&mut self, data: &[u8]) -> Result<()> {
            Write::write_all(self.port()?, data)?;
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Write::flush(self.port()?)?;
            Ok(())
        }

        /// One read timeout bounds the whole call, however the bytes trickle in
        fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
            let deadline = Instant::now() + READ_TIMEOUT;
            let port = self.port()?;
            let filled = fill_before(port, buf, deadline, |port, remaining| {
                port.set_timeout(remaining).map_err(io::Error::from)
            })?;
            Ok(filled)
        }

        fn close(&mut self) -> Result<()> {
            if let Some(port) = self.port.take() {
                log::info!(
                    "Closed serial port {}",
                    port.name().unwrap_or_else(|| "<unnamed>".into())
                );
            }
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn device(name: &str, vid: u16, pid: u16) -> UsbSerialDevice {
            UsbSerialDevice {
                port_name: name.to_string(),
                vid,
                pid,
                product: None,
                serial_number: None,
            }
        }

        #[test]
        fn test_select_first_exact_match() {
            let devices = vec![
                device("/dev/ttyACM0", 0x2E8A, 0x000A),
                device("/dev/ttyACM1", 0xCAFE, 0x4000),
                device("/dev/ttyACM2", BOOTLOADER_VID, BOOTLOADER_PID),
                device("/dev/ttyACM3", BOOTLOADER_VID, BOOTLOADER_PID),
            ];

            let found = select_device(&devices, BOOTLOADER_VID, BOOTLOADER_PID).unwrap();
            assert_eq!(found.port_name, "/dev/ttyACM2");
            assert!(found.is_bootloader());
        }

        /// Hands out one byte per read, pausing before each
        struct TrickleReader {
            delay: Duration,
            reads: usize,
        }

        impl Read for TrickleReader {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                std::thread::sleep(self.delay);
                self.reads += 1;
                buf[0] = b'x';
                Ok(1)
            }
        }

        #[test]
        fn test_fill_before_stops_at_deadline() {
            let mut reader = TrickleReader {
                delay: Duration::from_millis(20),
                reads: 0,
            };
            let mut armed = Vec::new();
            let mut buf = [0u8; 256];

            let start = Instant::now();
            let deadline = start + Duration::from_millis(100);
            let n = fill_before(&mut reader, &mut buf, deadline, |_, remaining| {
                armed.push(remaining);
                Ok(())
            })
            .unwrap();

            assert!(n > 0 && n < buf.len(), "read {} bytes", n);
            assert_eq!(n, reader.reads);
            assert!(start.elapsed() < Duration::from_millis(500));
            // Each read is armed with what is left of the single deadline
            assert!(armed.windows(2).all(|w| w[1] < w[0]));
            assert!(armed.iter().all(|&t| t <= Duration::from_millis(100)));
        }

        #[test]
        fn test_fill_before_full_buffer() {
            let mut data: &[u8] = &[1, 2, 3, 4, 5];
            let mut buf = [0u8; 4];
            let deadline = Instant::now() + READ_TIMEOUT;
            let n = fill_before(&mut data, &mut buf, deadline, |_, _| Ok(())).unwrap();
            assert_eq!(n, 4);
            assert_eq!(buf, [1, 2, 3, 4]);
        }

        #[test]
        fn test_fill_before_expired_deadline_reads_nothing() {
            let mut data: &[u8] = &[1, 2, 3];
            let mut buf = [0u8; 3];
            let n = fill_before(&mut data, &mut buf, Instant::now(), |_, _| Ok(())).unwrap();
            assert_eq!(n, 0);
        }

        #[test]
        fn test_select_not_found() {
            let devices = vec![device("/dev/ttyUSB0", 0x0403, 0x6001)];
            assert!(matches!(
                select_device(&devices, BOOTLOADER_VID, BOOTLOADER_PID),
                Err(ProtocolError::DeviceNotFound {
                    vendor_id: 0xCAFE,
                    product_id: 0x6940
                })
            ));
            assert!(select_device(&[], 1, 2).is_err());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A device that streams the same byte forever
    struct Babbling {
        byte: u8,
        reads: usize,
    }

    impl Transport for Babbling {
        fn write_all(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.reads += 1;
            assert!(self.reads <= 10 * MAX_LINE_LEN, "line read never gave up");
            buf.fill(self.byte);
            Ok(buf.len())
        }
    }

    /// Replays a fixed byte sequence, then times out
    struct Canned<'a>(&'a [u8]);

    impl Transport for Canned<'_> {
        fn write_all(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
            let n = buf.len().min(self.0.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0 = &self.0[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_read_line_without_newline_is_bounded() {
        let mut device = Babbling { byte: b'x', reads: 0 };
        assert!(matches!(
            device.read_line(),
            Err(ProtocolError::MalformedResponse(_))
        ));
        assert_eq!(device.reads, MAX_LINE_LEN);
    }

    #[test]
    fn test_read_line_trims_and_stops_at_newline() {
        let mut device = Canned(b"ack\r\nerr timeout\r\n");
        assert_eq!(device.read_line().unwrap(), "ack");
        assert_eq!(device.read_line().unwrap(), "err timeout");
        assert_eq!(device.read_line().unwrap(), "");
    }

    #[test]
    fn test_read_line_at_length_limit() {
        let mut line = vec![b'a'; MAX_LINE_LEN - 1];
        line.push(b'\n');
        let mut device = Canned(&line);
        assert_eq!(device.read_line().unwrap().len(), MAX_LINE_LEN - 1);
    }
}
