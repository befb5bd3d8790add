#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};
use embedded_hal_async::delay::DelayNs;

pub const MUX: u8 = 0x70;
pub const MAG: u8 = 0x1E;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Select(u8),
    MagWrite { channel: u8, reg: u8, value: u8 },
    MagRead { channel: u8, reg: u8 },
}

/// Multiplexer plus one HMC5883L per channel, scripted per test.
#[derive(Debug, Default)]
pub struct FakeBus {
    selected: Option<u8>,
    dead_channels: HashSet<u8>,
    failing_reads: HashSet<u8>,
    readings: HashMap<u8, VecDeque<(i16, i16, i16)>>,
    ids: HashMap<u8, [u8; 3]>,
    pub log: Vec<Transfer>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The multiplexer NACKs any attempt to select `channel`.
    pub fn kill_channel(&mut self, channel: u8) {
        self.dead_channels.insert(channel);
    }

    pub fn revive_channel(&mut self, channel: u8) {
        self.dead_channels.remove(&channel);
    }

    /// Data register reads on `channel` fail with a bus error.
    pub fn fail_reads(&mut self, channel: u8) {
        self.failing_reads.insert(channel);
    }

    /// Queues a sample for `channel`; the last one keeps repeating.
    pub fn push_reading(&mut self, channel: u8, x: i16, y: i16, z: i16) {
        self.readings.entry(channel).or_default().push_back((x, y, z));
    }

    pub fn set_identity(&mut self, channel: u8, id: [u8; 3]) {
        self.ids.insert(channel, id);
    }

    /// Channels selected so far, in order, ignoring disable-all writes.
    pub fn selections(&self) -> Vec<u8> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transfer::Select(mask) if *mask != 0 => Some(mask.trailing_zeros() as u8),
                _ => None,
            })
            .collect()
    }

    pub fn mag_writes(&self) -> Vec<(u8, u8, u8)> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Transfer::MagWrite {
                    channel,
                    reg,
                    value,
                } => Some((*channel, *reg, *value)),
                _ => None,
            })
            .collect()
    }

    fn next_reading(&mut self, channel: u8) -> (i16, i16, i16) {
        match self.readings.get_mut(&channel) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().copied().unwrap_or_default(),
            None => (0, 0, 0),
        }
    }

    fn mux_transaction(&mut self, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let mask = bytes[0];
                    self.log.push(Transfer::Select(mask));
                    if mask == 0 {
                        self.selected = None;
                        continue;
                    }
                    let channel = mask.trailing_zeros() as u8;
                    if self.dead_channels.contains(&channel) {
                        self.selected = None;
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                    }
                    self.selected = Some(channel);
                }
                Operation::Read(_) => return Err(ErrorKind::Other),
            }
        }
        Ok(())
    }

    fn mag_transaction(&mut self, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
        let channel = self
            .selected
            .ok_or(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address))?;
        let mut reg = 0u8;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    reg = bytes[0];
                    if bytes.len() == 2 {
                        self.log.push(Transfer::MagWrite {
                            channel,
                            reg,
                            value: bytes[1],
                        });
                    }
                }
                Operation::Read(buffer) => {
                    self.log.push(Transfer::MagRead { channel, reg });
                    match reg {
                        0x03 => {
                            if self.failing_reads.contains(&channel) {
                                return Err(ErrorKind::Bus);
                            }
                            let (x, y, z) = self.next_reading(channel);
                            let mut data = [0u8; 6];
                            data[0..2].copy_from_slice(&x.to_be_bytes());
                            data[2..4].copy_from_slice(&z.to_be_bytes());
                            data[4..6].copy_from_slice(&y.to_be_bytes());
                            buffer.copy_from_slice(&data[..buffer.len()]);
                        }
                        0x09 => buffer[0] = 0x01,
                        0x0A => {
                            let id = self.ids.get(&channel).copied().unwrap_or(*b"H43");
                            buffer.copy_from_slice(&id[..buffer.len()]);
                        }
                        _ => return Err(ErrorKind::Other),
                    }
                }
            }
        }
        Ok(())
    }
}

impl ErrorType for FakeBus {
    type Error = ErrorKind;
}

impl I2c for FakeBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        match address {
            MUX => self.mux_transaction(operations),
            MAG => self.mag_transaction(operations),
            _ => Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)),
        }
    }
}

/// Returns immediately and records every requested wait in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct FakeDelay {
    waits_ms: Rc<RefCell<Vec<u32>>>,
}

impl FakeDelay {
    pub fn waits_ms(&self) -> Vec<u32> {
        self.waits_ms.borrow().clone()
    }
}

impl DelayNs for FakeDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.waits_ms.borrow_mut().push(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.waits_ms.borrow_mut().push(ms);
    }
}
