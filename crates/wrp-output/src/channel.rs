//! Output channels and the file layout each one produces.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{OutputError, Result};
use crate::name::{FileName, NameBuffer, NameError, NamePrefix, encode_step};

/// Buffer length used for Patran names.
pub const PATRAN_NAME_LEN: usize = 16;

/// Capacity of flat names; `_stream` names fill it exactly.
pub const FLAT_NAME_LEN: usize = 17;

const FLAT_STREAM_SUFFIX: &str = "_stream";
const FLAT_TEXT_SUFFIX: &str = "_text";

/// Which family of results is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    Displacement,
    Stress,
}

impl OutputKind {
    pub fn from_stress_flag(is_stress_output: bool) -> Self {
        if is_stress_output {
            OutputKind::Stress
        } else {
            OutputKind::Displacement
        }
    }

    fn letter(self) -> u8 {
        match self {
            OutputKind::Displacement => b'e',
            OutputKind::Stress => b's',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputChannel {
    PatranBinary,
    PatranFormatted,
    FlatText,
    FlatStream,
}

impl OutputChannel {
    pub const ALL: [OutputChannel; 4] = [
        OutputChannel::PatranBinary,
        OutputChannel::PatranFormatted,
        OutputChannel::FlatText,
        OutputChannel::FlatStream,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputChannel::PatranBinary => "patran-binary",
            OutputChannel::PatranFormatted => "patran-formatted",
            OutputChannel::FlatText => "flat-text",
            OutputChannel::FlatStream => "flat-stream",
        }
    }

    pub fn is_patran(self) -> bool {
        matches!(
            self,
            OutputChannel::PatranBinary | OutputChannel::PatranFormatted
        )
    }

    pub fn access(self) -> AccessMode {
        match self {
            OutputChannel::FlatStream => AccessMode::Stream,
            _ => AccessMode::Sequential,
        }
    }

    pub fn representation(self) -> Representation {
        match self {
            OutputChannel::PatranBinary | OutputChannel::FlatStream => Representation::Unformatted,
            OutputChannel::PatranFormatted | OutputChannel::FlatText => Representation::Formatted,
        }
    }

    /// File name for this channel at `step`.
    pub fn file_name(
        self,
        kind: OutputKind,
        step: u32,
    ) -> std::result::Result<FileName, NameError> {
        match self {
            OutputChannel::PatranBinary | OutputChannel::PatranFormatted => {
                let buffer = NameBuffer::with_len(PATRAN_NAME_LEN)?;
                Ok(encode_step(self.patran_prefix(kind), step, buffer))
            }
            OutputChannel::FlatText | OutputChannel::FlatStream => {
                let mut name = FileName::with_capacity(FLAT_NAME_LEN);
                let stem = [b'w', b'n', kind.letter()];
                name.push_str(std::str::from_utf8(&stem).unwrap_or("wne"))?;
                name.push_step(step)?;
                name.push_str(if self == OutputChannel::FlatStream {
                    FLAT_STREAM_SUFFIX
                } else {
                    FLAT_TEXT_SUFFIX
                })?;
                Ok(name)
            }
        }
    }

    pub fn layout(
        self,
        kind: OutputKind,
        step: u32,
    ) -> std::result::Result<FileLayout, NameError> {
        Ok(FileLayout {
            channel: self,
            kind,
            name: self.file_name(kind, step)?,
            access: self.access(),
            representation: self.representation(),
        })
    }

    fn patran_prefix(self, kind: OutputKind) -> NamePrefix {
        let form = if self == OutputChannel::PatranBinary {
            b'b'
        } else {
            b'f'
        };
        NamePrefix::from_bytes([b'w', b'n', form, kind.letter()])
    }
}

impl Display for OutputChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputChannel {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self> {
        OutputChannel::ALL
            .into_iter()
            .find(|channel| channel.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| OutputError::Config(format!("unknown output channel: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    Sequential,
    Stream,
}

impl AccessMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Sequential => "sequential",
            AccessMode::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Representation {
    Formatted,
    Unformatted,
}

impl Representation {
    pub fn as_str(self) -> &'static str {
        match self {
            Representation::Formatted => "formatted",
            Representation::Unformatted => "unformatted",
        }
    }
}

/// Name and open mode of one channel for one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    pub channel: OutputChannel,
    pub kind: OutputKind,
    pub name: FileName,
    pub access: AccessMode,
    pub representation: Representation,
}

/// Channels requested for one output event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelSet(BTreeSet<OutputChannel>);

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: OutputChannel) -> bool {
        self.0.insert(channel)
    }

    pub fn contains(&self, channel: OutputChannel) -> bool {
        self.0.contains(&channel)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = OutputChannel> + '_ {
        self.0.iter().copied()
    }

    /// Resolve the request into the channels that are actually opened.
    ///
    /// Patran channels win over flat ones; flat text and flat stream are
    /// alternatives.
    pub fn plan(&self) -> Result<ChannelPlan> {
        let binary = self.contains(OutputChannel::PatranBinary);
        let formatted = self.contains(OutputChannel::PatranFormatted);
        if binary || formatted {
            return Ok(ChannelPlan::Patran { binary, formatted });
        }

        match (
            self.contains(OutputChannel::FlatText),
            self.contains(OutputChannel::FlatStream),
        ) {
            (true, true) => Err(OutputError::ConflictingFlatChannels),
            (true, false) => Ok(ChannelPlan::Flat(OutputChannel::FlatText)),
            (false, true) => Ok(ChannelPlan::Flat(OutputChannel::FlatStream)),
            (false, false) => Err(OutputError::NoChannelRequested),
        }
    }
}

impl FromIterator<OutputChannel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = OutputChannel>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[OutputChannel; N]> for ChannelSet {
    fn from(channels: [OutputChannel; N]) -> Self {
        channels.into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPlan {
    Patran { binary: bool, formatted: bool },
    Flat(OutputChannel),
}

impl ChannelPlan {
    pub fn channels(self) -> Vec<OutputChannel> {
        match self {
            ChannelPlan::Patran { binary, formatted } => {
                let mut out = Vec::with_capacity(2);
                if binary {
                    out.push(OutputChannel::PatranBinary);
                }
                if formatted {
                    out.push(OutputChannel::PatranFormatted);
                }
                out
            }
            ChannelPlan::Flat(channel) => vec![channel],
        }
    }
}
