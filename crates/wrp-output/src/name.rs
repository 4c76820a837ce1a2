//! Fixed-width result file names.
//!
//! Every result file carries the analysis step as a 7-digit, zero-padded
//! field behind a short prefix (`wnbe0000042`, `wns0000007_text`, ...).
//! Names are built inside a [`NameBuffer`], whose capacity is checked when
//! the buffer is created rather than at every write.

use std::fmt;

use thiserror::Error;

/// Smallest name buffer the encoder accepts.
pub const MIN_NAME_BUFFER_LEN: usize = 16;

/// Width of the step field.
pub const STEP_DIGITS: usize = 7;

/// Largest step written without remapping.
pub const STEP_REMAP_LIMIT: u32 = 9_999_999;

/// Length of a name prefix handed to [`encode`].
pub const PREFIX_LEN: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("name buffer length {len} is below the required {required} characters")]
    InsufficientBufferLength { len: usize, required: usize },

    #[error("invalid name prefix {0:?}: expected 4 ASCII alphanumeric characters")]
    InvalidPrefix(String),

    #[error("name {name:?} plus {extra:?} exceeds buffer capacity {capacity}")]
    CapacityExceeded {
        name: String,
        extra: String,
        capacity: usize,
    },
}

impl NameError {
    /// Undersized buffers are a configuration error, never a runtime condition.
    pub fn is_fatal(&self) -> bool {
        matches!(self, NameError::InsufficientBufferLength { .. })
    }
}

/// Four-character prefix placed in front of the step field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamePrefix([u8; PREFIX_LEN]);

impl NamePrefix {
    pub fn new(prefix: &str) -> Result<Self, NameError> {
        let bytes = prefix.as_bytes();
        if bytes.len() != PREFIX_LEN || !bytes.iter().all(u8::is_ascii_alphanumeric) {
            return Err(NameError::InvalidPrefix(prefix.to_string()));
        }
        let mut out = [0u8; PREFIX_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub(crate) const fn from_bytes(bytes: [u8; PREFIX_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        // Validated ASCII on every construction path.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for NamePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blank name storage whose capacity has been checked against
/// [`MIN_NAME_BUFFER_LEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameBuffer {
    len: usize,
}

impl NameBuffer {
    pub fn with_len(len: usize) -> Result<Self, NameError> {
        if len < MIN_NAME_BUFFER_LEN {
            return Err(NameError::InsufficientBufferLength {
                len,
                required: MIN_NAME_BUFFER_LEN,
            });
        }
        Ok(Self { len })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start an empty name that may grow up to this buffer's length.
    pub fn into_name(self) -> FileName {
        FileName::with_capacity(self.len)
    }
}

/// A result file name with a fixed capacity.
///
/// The stored text is the significant part of the name; [`FileName::padded`]
/// gives the blank-filled fixed-width form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName {
    text: String,
    capacity: usize,
}

impl FileName {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            capacity,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The name blank-padded to its full capacity.
    pub fn padded(&self) -> String {
        format!("{:<width$}", self.text, width = self.capacity)
    }

    /// Append `extra`, failing if the name would outgrow its capacity.
    pub fn push_str(&mut self, extra: &str) -> Result<(), NameError> {
        if self.text.len() + extra.len() > self.capacity {
            return Err(NameError::CapacityExceeded {
                name: self.text.clone(),
                extra: extra.to_string(),
                capacity: self.capacity,
            });
        }
        self.text.push_str(extra);
        Ok(())
    }

    /// Append the 7-character step field.
    pub fn push_step(&mut self, step: u32) -> Result<(), NameError> {
        let digits = step_digits(step);
        self.push_str(std::str::from_utf8(&digits).unwrap_or("*******"))
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Encodes `step` as the 7-character step field.
///
/// Steps above [`STEP_REMAP_LIMIT`] are remapped by a single subtraction of
/// the limit, so `10_000_000` is written as `0000001`. A remapped value that
/// still needs more than seven digits is written as `*******`.
///
/// # Examples
///
/// ```
/// use wrp_output::name::step_digits;
///
/// assert_eq!(&step_digits(42), b"0000042");
/// assert_eq!(&step_digits(10_000_000), b"0000001");
/// ```
pub fn step_digits(step: u32) -> [u8; STEP_DIGITS] {
    // Not a modulo: steps just past the limit collide with low steps.
    let mut value = if step > STEP_REMAP_LIMIT {
        step - STEP_REMAP_LIMIT
    } else {
        step
    };
    if value > STEP_REMAP_LIMIT {
        return [b'*'; STEP_DIGITS];
    }

    let mut out = [b'0'; STEP_DIGITS];
    for slot in out.iter_mut().rev() {
        *slot = b'0' + (value % 10) as u8;
        value /= 10;
    }
    out
}

/// Builds `prefix` + 7-digit step inside `buffer`.
///
/// Characters past position 11 stay blank for the caller's suffix.
pub fn encode_step(prefix: NamePrefix, step: u32, buffer: NameBuffer) -> FileName {
    let mut name = buffer.into_name();
    // A checked buffer always holds 4 + 7 characters.
    name.text.push_str(prefix.as_str());
    name.text.extend(step_digits(step).iter().map(|&b| b as char));
    name
}

/// Encodes a step file name from a raw prefix and buffer length.
///
/// # Arguments
///
/// * `prefix` - four ASCII alphanumeric characters
/// * `step` - analysis step number
/// * `buffer_len` - capacity of the destination name, at least 16
///
/// # Errors
///
/// [`NameError::InsufficientBufferLength`] when `buffer_len < 16`; this is
/// checked first and is fatal. [`NameError::InvalidPrefix`] for a malformed
/// prefix.
///
/// # Examples
///
/// ```
/// use wrp_output::name::encode;
///
/// let name = encode("wnbe", 42, 16).unwrap();
/// assert_eq!(name.as_str(), "wnbe0000042");
/// assert!(encode("wnbe", 42, 15).unwrap_err().is_fatal());
/// ```
pub fn encode(prefix: &str, step: u32, buffer_len: usize) -> Result<FileName, NameError> {
    let buffer = NameBuffer::with_len(buffer_len)?;
    let prefix = NamePrefix::new(prefix)?;
    Ok(encode_step(prefix, step, buffer))
}
