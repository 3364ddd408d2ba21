//! eternity-dummy - In-memory bootloader emulator for testing
//!
//! This crate provides a transport that behaves like a device running the
//! Eternity bootloader: it parses EOT-terminated commands, answers with the
//! firmware's `ack` and `err ...` lines and keeps the program area of the
//! flash in memory. It's useful for testing and development without real
//! hardware.
//!
//! The `info` reply is the six-field line the host parses
//! (`name sha version date flash_size bootloader_size`). Firmware builds
//! that prefix it with a `bootloader` token are not emulated.
//!
//! Faults can be injected per address to exercise error paths, and every
//! command received is logged so tests can check wire ordering.

use chrono::NaiveDate;
use eternity_protocol::error::{ProtocolError, Result};
use eternity_protocol::protocol::{Command, DeviceInfo, EOT, PAGE_SIZE, SECTOR_SIZE};
use eternity_protocol::Transport;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Command buffer size of the firmware, including the EOT byte
const CMD_BUF_SIZE: usize = 128;

/// Configuration for the dummy bootloader
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Information reported by `info`
    pub info: DeviceInfo,
}

impl Default for DummyConfig {
    fn default() -> Self {
        let build_date = NaiveDate::from_ymd_opt(2024, 1, 15)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .unwrap_or_default();
        Self {
            info: DeviceInfo {
                device_name: "eternity".into(),
                git_commit_sha: "abc123".into(),
                protocol_version: "1".into(),
                build_date,
                flash_size: 2 * 1024 * 1024,
                bootloader_size: 64 * 1024,
            },
        }
    }
}

/// A fault injected at a specific address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Answer the command with this line instead of `ack`
    Refuse(String),
    /// Answer a read with only this many bytes
    ShortRead(usize),
}

/// Lifecycle state of the emulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Accepting commands
    Bootloader,
    /// Received `jump`, running the main program
    MainProgram,
    /// Received `reset`, rebooted into the bootloader
    Rebooted,
}

struct Inner {
    config: DummyConfig,
    /// Program area, indexed from the first byte after the bootloader
    flash: Vec<u8>,
    cmd_buf: Vec<u8>,
    /// Address and received bytes of a write waiting for its payload
    pending_write: Option<(u32, Vec<u8>)>,
    output: VecDeque<u8>,
    commands: Vec<String>,
    faults: HashMap<(&'static str, u32), Fault>,
    state: DeviceState,
    closed: bool,
}

impl Inner {
    fn print_line(&mut self, line: &str) {
        self.output.extend(line.as_bytes());
        self.output.extend(b"\r\n");
    }

    fn receive(&mut self, data: &[u8]) {
        for &byte in data {
            if let Some((addr, mut payload)) = self.pending_write.take() {
                payload.push(byte);
                if payload.len() == PAGE_SIZE {
                    self.program(addr, &payload);
                } else {
                    self.pending_write = Some((addr, payload));
                }
                continue;
            }

            if byte == EOT {
                let cmd = String::from_utf8_lossy(&self.cmd_buf).into_owned();
                self.cmd_buf.clear();
                self.handle_command(&cmd);
                continue;
            }

            self.cmd_buf.push(byte);
            if self.cmd_buf.len() >= CMD_BUF_SIZE {
                self.cmd_buf.clear();
                self.print_line("err command buffer overflow");
            }
        }
    }

    /// Parse and validate an address the way the firmware does
    fn parse_address(&mut self, arg: &str) -> Option<u32> {
        let digits = arg
            .strip_prefix("0x")
            .or_else(|| arg.strip_prefix("0X"))
            .unwrap_or(arg);
        let addr = match u32::from_str_radix(digits, 16) {
            Ok(addr) => addr,
            Err(_) => {
                self.print_line("err invalid input");
                return None;
            }
        };
        if addr as usize > self.flash.len() {
            self.print_line("err address out of range");
            return None;
        }
        if addr as usize % PAGE_SIZE != 0 {
            self.print_line("err address not aligned");
            return None;
        }
        Some(addr)
    }

    fn fault(&self, verb: &'static str, addr: u32) -> Option<Fault> {
        self.faults.get(&(verb, addr)).cloned()
    }

    fn handle_command(&mut self, cmd: &str) {
        log::trace!("dummy: <- {:?}", cmd);
        self.commands.push(cmd.to_string());

        if self.state != DeviceState::Bootloader {
            // Nobody is listening any more
            return;
        }

        let args: Vec<&str> = cmd.split(' ').filter(|s| !s.is_empty()).collect();
        match args.as_slice() {
            [] => {}
            ["read", arg] => {
                let Some(addr) = self.parse_address(arg) else {
                    return;
                };
                let start = addr as usize;
                let end = (start + PAGE_SIZE).min(self.flash.len());
                let mut page = self.flash[start..end].to_vec();
                match self.fault("read", addr) {
                    Some(Fault::ShortRead(n)) => page.truncate(n),
                    Some(Fault::Refuse(line)) => {
                        self.print_line(&line);
                        return;
                    }
                    None => {}
                }
                self.output.extend(page);
            }
            ["write", arg] => {
                let Some(addr) = self.parse_address(arg) else {
                    return;
                };
                if let Some(Fault::Refuse(line)) = self.fault("write", addr) {
                    self.print_line(&line);
                    return;
                }
                if addr as usize + PAGE_SIZE > self.flash.len() {
                    self.print_line("err address out of range");
                    return;
                }
                self.print_line("ack");
                self.pending_write = Some((addr, Vec::with_capacity(PAGE_SIZE)));
            }
            ["erase", arg] => {
                let Some(addr) = self.parse_address(arg) else {
                    return;
                };
                if addr as usize % SECTOR_SIZE != 0 {
                    self.print_line("err address not aligned");
                    return;
                }
                if let Some(Fault::Refuse(line)) = self.fault("erase", addr) {
                    self.print_line(&line);
                    return;
                }
                let start = addr as usize;
                let end = (start + SECTOR_SIZE).min(self.flash.len());
                self.flash[start..end].fill(0xFF);
                self.print_line("ack");
            }
            ["info"] => {
                let line = self.config.info.to_string();
                self.print_line(&line);
            }
            ["jump"] => self.state = DeviceState::MainProgram,
            ["reset"] => self.state = DeviceState::Rebooted,
            _ => self.print_line("err unknown command"),
        }
    }

    fn program(&mut self, addr: u32, payload: &[u8]) {
        let start = addr as usize;
        // Flash programming: can only change 1 -> 0
        for (cell, &byte) in self.flash[start..start + PAGE_SIZE].iter_mut().zip(payload) {
            *cell &= byte;
        }
    }
}

/// Dummy bootloader
///
/// Cloning yields another handle to the same emulated device, so a test can
/// keep one handle for inspection while the client owns the other as its
/// transport.
#[derive(Clone)]
pub struct DummyBootloader {
    inner: Arc<Mutex<Inner>>,
}

impl DummyBootloader {
    /// Create a new dummy bootloader with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let program_space = config.info.program_space() as usize;
        Self {
            inner: Arc::new(Mutex::new(Inner {
                config,
                flash: vec![0xFF; program_space],
                cmd_buf: Vec::with_capacity(CMD_BUF_SIZE),
                pending_write: None,
                output: VecDeque::new(),
                commands: Vec::new(),
                faults: HashMap::new(),
                state: DeviceState::Bootloader,
                closed: false,
            })),
        }
    }

    /// Create a new dummy bootloader with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy of the program area
    pub fn flash(&self) -> Vec<u8> {
        self.lock().flash.clone()
    }

    /// Overwrite the program area starting at `offset`
    pub fn load(&self, offset: usize, data: &[u8]) {
        let mut inner = self.lock();
        let offset = offset.min(inner.flash.len());
        let end = (offset + data.len()).min(inner.flash.len());
        let len = end.saturating_sub(offset);
        inner.flash[offset..end].copy_from_slice(&data[..len]);
    }

    /// Commands received so far, without the EOT byte
    pub fn commands(&self) -> Vec<String> {
        self.lock().commands.clone()
    }

    /// Lifecycle state of the device
    pub fn state(&self) -> DeviceState {
        self.lock().state
    }

    /// True once the host closed the connection
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Inject a fault for a command verb at an address
    pub fn inject(&self, command: Command, fault: Fault) {
        if let Some(addr) = command.address() {
            self.lock().faults.insert((command.verb(), addr), fault);
        }
    }
}

impl Default for DummyBootloader {
    fn default() -> Self {
        Self::new_default()
    }
}

impl Transport for DummyBootloader {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(ProtocolError::Io("dummy bootloader is closed".into()));
        }
        inner.receive(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(ProtocolError::Io("dummy bootloader is closed".into()));
        }
        let n = buf.len().min(inner.output.len());
        for (slot, byte) in buf.iter_mut().zip(inner.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}
