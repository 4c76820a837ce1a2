//! Open result files, owned by the caller between open and close.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::channel::{AccessMode, FileLayout, OutputChannel, Representation};
use crate::device::DeviceNumber;
use crate::error::{OutputError, Result};
use crate::name::FileName;

#[derive(Debug)]
pub struct OpenFile {
    device: DeviceNumber,
    layout: FileLayout,
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OpenFile {
    /// Create or truncate the file at `path`. An existing file is reused.
    pub(crate) fn create(
        device: DeviceNumber,
        layout: FileLayout,
        path: PathBuf,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| OutputError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            device,
            layout,
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn device(&self) -> DeviceNumber {
        self.device
    }

    pub fn channel(&self) -> OutputChannel {
        self.layout.channel
    }

    pub fn name(&self) -> &FileName {
        &self.layout.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn access(&self) -> AccessMode {
        self.layout.access
    }

    pub fn representation(&self) -> Representation {
        self.layout.representation
    }

    /// Flush and close, keeping the file on disk. Returns its path.
    pub(crate) fn close(mut self) -> Result<PathBuf> {
        let flushed = self
            .writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_all());
        match flushed {
            Ok(()) => Ok(self.path),
            Err(source) => Err(OutputError::Close {
                path: self.path,
                source,
            }),
        }
    }
}

impl Write for OpenFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Open files keyed by channel.
#[derive(Debug, Default)]
pub struct HandleTable {
    files: BTreeMap<OutputChannel, OpenFile>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn contains(&self, channel: OutputChannel) -> bool {
        self.files.contains_key(&channel)
    }

    pub fn get(&self, channel: OutputChannel) -> Option<&OpenFile> {
        self.files.get(&channel)
    }

    pub fn get_mut(&mut self, channel: OutputChannel) -> Option<&mut OpenFile> {
        self.files.get_mut(&channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OpenFile> + '_ {
        self.files.values()
    }

    pub fn channels(&self) -> Vec<OutputChannel> {
        self.files.keys().copied().collect()
    }

    pub fn devices(&self) -> Vec<(OutputChannel, DeviceNumber)> {
        self.files
            .iter()
            .map(|(channel, file)| (*channel, file.device()))
            .collect()
    }

    pub(crate) fn insert(&mut self, file: OpenFile) {
        self.files.insert(file.channel(), file);
    }

    pub(crate) fn take(&mut self, channel: OutputChannel) -> Option<OpenFile> {
        self.files.remove(&channel)
    }
}
