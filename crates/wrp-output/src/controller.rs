//! Open/close lifecycle of the result files for one output event.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::channel::{ChannelPlan, ChannelSet, OutputChannel, OutputKind};
use crate::compress::Compressor;
use crate::device::DeviceAllocator;
use crate::error::{OutputError, Result};
use crate::handles::{HandleTable, OpenFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Open,
    Close,
}

/// Output settings for one step, as seen by both open and close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRequest {
    pub step: u32,
    pub kind: OutputKind,
    pub channels: ChannelSet,
    pub compress_on_close: bool,
}

impl OutputRequest {
    pub fn new(step: u32, kind: OutputKind, channels: ChannelSet) -> Self {
        Self {
            step,
            kind,
            channels,
            compress_on_close: false,
        }
    }

    pub fn with_compression(mut self, compress_on_close: bool) -> Self {
        self.compress_on_close = compress_on_close;
        self
    }
}

/// Opens and closes step result files in `directory`.
///
/// The controller keeps nothing between calls: open files travel in the
/// [`HandleTable`] the caller passes back on close.
pub struct OutputFileController<A, C> {
    directory: PathBuf,
    allocator: A,
    compressor: C,
}

impl<A: DeviceAllocator, C: Compressor> OutputFileController<A, C> {
    pub fn new(directory: impl Into<PathBuf>, allocator: A, compressor: C) -> Self {
        Self {
            directory: directory.into(),
            allocator,
            compressor,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn compressor(&self) -> &C {
        &self.compressor
    }

    pub fn execute(
        &mut self,
        operation: Operation,
        request: &OutputRequest,
        handles: HandleTable,
    ) -> Result<HandleTable> {
        match operation {
            Operation::Open => self.open(request, handles),
            Operation::Close => self.close(request, handles),
        }
    }

    pub fn open(
        &mut self,
        request: &OutputRequest,
        mut handles: HandleTable,
    ) -> Result<HandleTable> {
        let plan = request.channels.plan()?;
        if matches!(plan, ChannelPlan::Patran { .. })
            && request.channels.iter().any(|channel| !channel.is_patran())
        {
            debug!(step = request.step, "flat channels ignored alongside patran output");
        }

        let channels = plan.channels();
        if let Some(&open) = channels.iter().find(|&&channel| handles.contains(channel)) {
            return Err(OutputError::ChannelAlreadyOpen(open));
        }

        let mut opened: Vec<OpenFile> = Vec::with_capacity(channels.len());
        for channel in channels {
            match self.open_channel(channel, request) {
                Ok(file) => opened.push(file),
                Err(err) => {
                    for file in opened {
                        self.allocator.release(file.device());
                        let _ = file.close();
                    }
                    return Err(err);
                }
            }
        }

        for file in opened {
            handles.insert(file);
        }
        Ok(handles)
    }

    /// Close every planned channel, even after a failure; the first error
    /// is returned once all of them have been attempted.
    pub fn close(
        &mut self,
        request: &OutputRequest,
        mut handles: HandleTable,
    ) -> Result<HandleTable> {
        let plan = request.channels.plan()?;
        let mut first_error: Option<OutputError> = None;

        for channel in plan.channels() {
            let Some(file) = handles.take(channel) else {
                first_error.get_or_insert(OutputError::MissingHandle(channel));
                continue;
            };
            let device = file.device();
            let closed = file.close();
            self.allocator.release(device);

            match closed {
                Ok(path) => {
                    debug!(
                        %channel,
                        device = device.get(),
                        path = %path.display(),
                        "closed result file"
                    );
                    if channel == OutputChannel::FlatText && request.compress_on_close {
                        self.compressor.compress(&path);
                    }
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            None => Ok(handles),
            Some(err) => {
                // The table cannot be handed back, so nothing left in it may
                // keep a device.
                for channel in handles.channels() {
                    if let Some(file) = handles.take(channel) {
                        self.allocator.release(file.device());
                        let _ = file.close();
                    }
                }
                Err(err)
            }
        }
    }

    fn open_channel(
        &mut self,
        channel: OutputChannel,
        request: &OutputRequest,
    ) -> Result<OpenFile> {
        let layout = channel.layout(request.kind, request.step)?;
        let path = self.directory.join(layout.name.as_str());
        let device = self.allocator.acquire()?;
        match OpenFile::create(device, layout, path) {
            Ok(file) => {
                debug!(
                    %channel,
                    device = device.get(),
                    path = %file.path().display(),
                    access = ?file.access(),
                    representation = ?file.representation(),
                    "opened result file"
                );
                Ok(file)
            }
            Err(err) => {
                self.allocator.release(device);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::NoCompression;
    use crate::device::UnitPool;
    use std::cell::RefCell;
    use std::fs;
    use std::io::Write;

    #[derive(Default)]
    struct RecordingCompressor {
        calls: RefCell<Vec<PathBuf>>,
    }

    impl Compressor for RecordingCompressor {
        fn compress(&self, path: &Path) {
            self.calls.borrow_mut().push(path.to_path_buf());
        }
    }

    fn controller_in(dir: &Path) -> OutputFileController<UnitPool, NoCompression> {
        OutputFileController::new(dir, UnitPool::default(), NoCompression)
    }

    fn recording_controller_in(
        dir: &Path,
    ) -> OutputFileController<UnitPool, RecordingCompressor> {
        OutputFileController::new(dir, UnitPool::default(), RecordingCompressor::default())
    }

    fn request(step: u32, stress: bool, channels: &[OutputChannel]) -> OutputRequest {
        OutputRequest::new(
            step,
            OutputKind::from_stress_flag(stress),
            channels.iter().copied().collect(),
        )
    }

    #[test]
    fn opens_patran_binary_with_kind_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller_in(dir.path());

        for (stress, expected) in [(false, "wnbe0000042"), (true, "wnbs0000042")] {
            let req = request(42, stress, &[OutputChannel::PatranBinary]);
            let handles = controller
                .execute(Operation::Open, &req, HandleTable::new())
                .unwrap();
            let file = handles.get(OutputChannel::PatranBinary).unwrap();
            assert_eq!(file.name().as_str(), expected);
            assert!(dir.path().join(expected).exists());

            let rest = controller.execute(Operation::Close, &req, handles).unwrap();
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn both_patran_channels_get_distinct_devices() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller_in(dir.path());
        let req = request(
            9,
            false,
            &[OutputChannel::PatranBinary, OutputChannel::PatranFormatted],
        );

        let handles = controller.open(&req, HandleTable::new()).unwrap();
        let binary = handles.get(OutputChannel::PatranBinary).unwrap();
        let formatted = handles.get(OutputChannel::PatranFormatted).unwrap();
        assert_ne!(binary.device(), formatted.device());
        assert_eq!(binary.name().as_str(), "wnbe0000009");
        assert_eq!(formatted.name().as_str(), "wnfe0000009");
        assert_eq!(controller.allocator().in_use(), 2);

        let rest = controller.close(&req, handles).unwrap();
        assert!(rest.is_empty());
        assert_eq!(controller.allocator().in_use(), 0);
        assert!(dir.path().join("wnbe0000009").exists());
        assert!(dir.path().join("wnfe0000009").exists());
    }

    #[test]
    fn patran_request_skips_flat_channels() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller_in(dir.path());
        let req = request(
            1,
            true,
            &[OutputChannel::PatranFormatted, OutputChannel::FlatText],
        );

        let handles = controller.open(&req, HandleTable::new()).unwrap();
        assert_eq!(handles.len(), 1);
        assert!(!dir.path().join("wns0000001_text").exists());
        controller.close(&req, handles).unwrap();
    }

    #[test]
    fn compresses_closed_flat_text_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = recording_controller_in(dir.path());
        let req = request(7, true, &[OutputChannel::FlatText]).with_compression(true);

        let mut handles = controller.open(&req, HandleTable::new()).unwrap();
        writeln!(handles.get_mut(OutputChannel::FlatText).unwrap(), "1 2 3").unwrap();
        controller.close(&req, handles).unwrap();

        let calls = controller.compressor().calls.borrow();
        assert_eq!(calls.as_slice(), [dir.path().join("wns0000007_text")]);
        assert_eq!(fs::read_to_string(&calls[0]).unwrap(), "1 2 3\n");
    }

    #[test]
    fn no_compression_without_request_or_for_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = recording_controller_in(dir.path());

        let text = request(7, false, &[OutputChannel::FlatText]);
        let handles = controller.open(&text, HandleTable::new()).unwrap();
        controller.close(&text, handles).unwrap();

        let stream = request(7, false, &[OutputChannel::FlatStream]).with_compression(true);
        let handles = controller.open(&stream, HandleTable::new()).unwrap();
        assert_eq!(
            handles.get(OutputChannel::FlatStream).unwrap().name().as_str(),
            "wne0000007_stream"
        );
        controller.close(&stream, handles).unwrap();

        assert!(controller.compressor().calls.borrow().is_empty());
    }

    #[test]
    fn close_without_handle_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller_in(dir.path());
        let req = request(
            3,
            false,
            &[OutputChannel::PatranBinary, OutputChannel::PatranFormatted],
        );

        let open_binary = request(3, false, &[OutputChannel::PatranBinary]);
        let handles = controller.open(&open_binary, HandleTable::new()).unwrap();
        let err = controller
            .close(&req, handles)
            .expect_err("formatted handle is missing");
        assert!(matches!(
            err,
            OutputError::MissingHandle(OutputChannel::PatranFormatted)
        ));
        assert_eq!(controller.allocator().in_use(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_close_still_closes_remaining_channels() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/dev/full", dir.path().join("wnbe0000001")).unwrap();
        let mut controller = controller_in(dir.path());
        let req = request(
            1,
            false,
            &[OutputChannel::PatranBinary, OutputChannel::PatranFormatted],
        );

        let mut handles = controller.open(&req, HandleTable::new()).unwrap();
        handles
            .get_mut(OutputChannel::PatranBinary)
            .unwrap()
            .write_all(b"x")
            .unwrap();
        writeln!(handles.get_mut(OutputChannel::PatranFormatted).unwrap(), "step 1").unwrap();

        let err = controller
            .close(&req, handles)
            .expect_err("writing to a full device must fail");
        assert!(
            matches!(err, OutputError::Close { ref path, .. } if path.ends_with("wnbe0000001"))
        );
        assert_eq!(controller.allocator().in_use(), 0);
        assert_eq!(
            fs::read_to_string(dir.path().join("wnfe0000001")).unwrap(),
            "step 1\n"
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_close_releases_unrelated_handles() {
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink("/dev/full", dir.path().join("wne0000002_stream")).unwrap();
        let mut controller = controller_in(dir.path());
        let patran = request(2, false, &[OutputChannel::PatranBinary]);
        let flat = request(2, false, &[OutputChannel::FlatStream]);

        let handles = controller.open(&patran, HandleTable::new()).unwrap();
        let mut handles = controller.open(&flat, handles).unwrap();
        handles
            .get_mut(OutputChannel::FlatStream)
            .unwrap()
            .write_all(b"x")
            .unwrap();

        let err = controller.close(&flat, handles).expect_err("full device");
        assert!(matches!(err, OutputError::Close { .. }));
        assert_eq!(controller.allocator().in_use(), 0);
    }

    #[test]
    fn reopening_an_open_channel_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller_in(dir.path());
        let req = request(3, false, &[OutputChannel::FlatStream]);

        let handles = controller.open(&req, HandleTable::new()).unwrap();
        let err = controller.open(&req, handles).expect_err("channel already open");
        assert!(matches!(
            err,
            OutputError::ChannelAlreadyOpen(OutputChannel::FlatStream)
        ));
    }

    #[test]
    fn failed_open_releases_devices() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller_in(&dir.path().join("not-created"));
        let req = request(
            3,
            false,
            &[OutputChannel::PatranBinary, OutputChannel::PatranFormatted],
        );

        let err = controller
            .open(&req, HandleTable::new())
            .expect_err("directory is missing");
        assert!(matches!(err, OutputError::Open { .. }));
        assert_eq!(controller.allocator().in_use(), 0);
    }

    #[test]
    fn unrelated_handles_survive_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = controller_in(dir.path());
        let patran = request(5, false, &[OutputChannel::PatranBinary]);
        let flat = request(5, false, &[OutputChannel::FlatStream]);

        let handles = controller.open(&patran, HandleTable::new()).unwrap();
        let handles = controller.open(&flat, handles).unwrap();
        let handles = controller.close(&flat, handles).unwrap();
        assert_eq!(handles.len(), 1);
        assert!(handles.contains(OutputChannel::PatranBinary));
        controller.close(&patran, handles).unwrap();
    }
}
