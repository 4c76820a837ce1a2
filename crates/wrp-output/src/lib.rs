//! Result-output file handling for step-wise finite-element output.
//!
//! This crate provides:
//! - **Step file names** with a fixed 7-digit step field (`wnbe0000042`,
//!   `wns0000007_text`, ...)
//! - **Channel selection** between Patran binary/formatted pairs and flat
//!   text/stream files
//! - **Open/close lifecycle** through [`OutputFileController`], with open
//!   files returned to the caller in a [`HandleTable`]
//! - **Device numbers** from a pluggable [`DeviceAllocator`]
//! - **Post-close compression** of flat text files through a [`Compressor`]
//! - **JSON configuration** for the output directory, channels and devices
//!
//! Writing the result records themselves is left to the caller.

pub mod channel;
pub mod compress;
mod config;
mod controller;
pub mod device;
mod error;
mod handles;
pub mod name;

pub use channel::{
    AccessMode, ChannelPlan, ChannelSet, FileLayout, OutputChannel, OutputKind, Representation,
};
pub use compress::{CommandCompressor, Compressor, NoCompression};
pub use config::{CONFIG_SCHEMA_VERSION, OutputConfig, load_config, save_config};
pub use controller::{Operation, OutputFileController, OutputRequest};
pub use device::{DeviceAllocator, DeviceNumber, UnitPool};
pub use error::{OutputError, Result};
pub use handles::{HandleTable, OpenFile};
pub use name::{FileName, NameBuffer, NameError, NamePrefix, encode};
