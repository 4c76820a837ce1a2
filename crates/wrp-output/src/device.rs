//! Device (unit) numbers for open result files.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OutputError, Result};

pub const DEFAULT_FIRST_DEVICE: u32 = 11;
pub const DEFAULT_LAST_DEVICE: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceNumber(u32);

impl DeviceNumber {
    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Display for DeviceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of device numbers for newly opened files.
pub trait DeviceAllocator {
    /// Return a number that is not in use by any other open file.
    fn acquire(&mut self) -> Result<DeviceNumber>;

    /// Give a number back once its file is closed.
    fn release(&mut self, device: DeviceNumber);
}

impl<A: DeviceAllocator + ?Sized> DeviceAllocator for &mut A {
    fn acquire(&mut self) -> Result<DeviceNumber> {
        (**self).acquire()
    }

    fn release(&mut self, device: DeviceNumber) {
        (**self).release(device);
    }
}

/// Hands out the lowest free unit in `first..=last`.
#[derive(Debug, Clone)]
pub struct UnitPool {
    first: u32,
    last: u32,
    in_use: BTreeSet<u32>,
}

impl UnitPool {
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first > last {
            return Err(OutputError::Config(format!(
                "device range {first}..={last} is empty"
            )));
        }
        Ok(Self {
            first,
            last,
            in_use: BTreeSet::new(),
        })
    }

    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }

    pub fn is_in_use(&self, device: DeviceNumber) -> bool {
        self.in_use.contains(&device.get())
    }
}

impl Default for UnitPool {
    fn default() -> Self {
        Self {
            first: DEFAULT_FIRST_DEVICE,
            last: DEFAULT_LAST_DEVICE,
            in_use: BTreeSet::new(),
        }
    }
}

impl DeviceAllocator for UnitPool {
    fn acquire(&mut self) -> Result<DeviceNumber> {
        let unit = (self.first..=self.last)
            .find(|unit| !self.in_use.contains(unit))
            .ok_or(OutputError::DevicesExhausted {
                first: self.first,
                last: self.last,
            })?;
        self.in_use.insert(unit);
        debug!(unit, "acquired device");
        Ok(DeviceNumber(unit))
    }

    fn release(&mut self, device: DeviceNumber) {
        if self.in_use.remove(&device.get()) {
            debug!(unit = device.get(), "released device");
        }
    }
}
