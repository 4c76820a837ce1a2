//! JSON configuration of the output directory, channels, devices and compression.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelSet, OutputChannel, OutputKind};
use crate::compress::{CommandCompressor, DEFAULT_COMPRESS_PROGRAM, default_compress_args};
use crate::controller::{OutputFileController, OutputRequest};
use crate::device::{DEFAULT_FIRST_DEVICE, DEFAULT_LAST_DEVICE, UnitPool};
use crate::error::{OutputError, Result};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub schema_version: u32,
    pub directory: PathBuf,
    pub stress_output: bool,
    pub channels: ChannelSet,
    pub compress_flat_text: bool,
    pub first_device: u32,
    pub last_device: u32,
    pub compress_program: String,
    pub compress_args: Vec<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            directory: PathBuf::from("."),
            stress_output: false,
            channels: ChannelSet::from([OutputChannel::PatranBinary]),
            compress_flat_text: false,
            first_device: DEFAULT_FIRST_DEVICE,
            last_device: DEFAULT_LAST_DEVICE,
            compress_program: DEFAULT_COMPRESS_PROGRAM.to_string(),
            compress_args: default_compress_args(),
        }
    }
}

impl OutputConfig {
    pub fn request(&self, step: u32) -> OutputRequest {
        OutputRequest::new(
            step,
            OutputKind::from_stress_flag(self.stress_output),
            self.channels.clone(),
        )
        .with_compression(self.compress_flat_text)
    }

    pub fn unit_pool(&self) -> Result<UnitPool> {
        UnitPool::new(self.first_device, self.last_device)
    }

    pub fn compressor(&self) -> CommandCompressor {
        CommandCompressor::new(self.compress_program.clone(), self.compress_args.clone())
    }

    pub fn controller(&self) -> Result<OutputFileController<UnitPool, CommandCompressor>> {
        Ok(OutputFileController::new(
            self.directory.clone(),
            self.unit_pool()?,
            self.compressor(),
        ))
    }

    fn validate(self) -> Result<Self> {
        if self.schema_version != CONFIG_SCHEMA_VERSION {
            return Err(OutputError::Config(format!(
                "unsupported schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
                self.schema_version
            )));
        }
        if self.compress_program.trim().is_empty() {
            return Err(OutputError::Config("compress_program is empty".to_string()));
        }
        Ok(self)
    }
}

pub fn save_config(path: impl AsRef<Path>, config: &OutputConfig) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let bytes = serde_json::to_vec_pretty(config)?;
    fs::write(path, bytes)?;
    Ok(())
}

pub fn load_config(path: impl AsRef<Path>) -> Result<OutputConfig> {
    let bytes = fs::read(path)?;
    let config: OutputConfig = serde_json::from_slice(&bytes)?;
    config.validate()
}
