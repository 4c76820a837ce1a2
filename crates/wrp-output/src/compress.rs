//! Post-close compression of flat text files.

use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use tracing::{debug, warn};

pub const DEFAULT_COMPRESS_PROGRAM: &str = "gzip";

/// `-f` lets a rerun step replace the archive left by the previous run.
pub fn default_compress_args() -> Vec<String> {
    vec!["-f".to_string()]
}

/// Best-effort compression of a closed file. Failures are never reported
/// back to the caller.
pub trait Compressor {
    fn compress(&self, path: &Path);
}

impl<C: Compressor + ?Sized> Compressor for &C {
    fn compress(&self, path: &Path) {
        (**self).compress(path);
    }
}

impl<C: Compressor + ?Sized> Compressor for Box<C> {
    fn compress(&self, path: &Path) {
        (**self).compress(path);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, _path: &Path) {}
}

/// Runs an external program on the file without waiting for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompressor {
    program: String,
    args: Vec<String>,
}

impl CommandCompressor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for CommandCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESS_PROGRAM, default_compress_args())
    }
}

impl Compressor for CommandCompressor {
    fn compress(&self, path: &Path) {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                debug!(
                    program = %self.program,
                    path = %path.display(),
                    pid = child.id(),
                    "compression started"
                );
                // Reap in the background; the exit status is not inspected.
                thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(err) => {
                warn!(
                    program = %self.program,
                    path = %path.display(),
                    err = %err,
                    "failed to start compression"
                );
            }
        }
    }
}
