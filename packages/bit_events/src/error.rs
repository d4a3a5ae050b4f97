//! Definition-time configuration errors.

use std::error::Error;
use std::fmt;

use crate::EventMask;

/// An invalid phase topology was defined.
///
/// These errors are raised synchronously at definition time, never at
/// runtime: they indicate a programming mistake in how the gate was wired
/// up, not a condition the running system can recover from.
#[derive(Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A phase was defined after the gate was sealed by its first await.
    GateSealed,

    /// A phase's new bits overlap bits already owned by an earlier phase.
    BitOverlap {
        /// The overlapping bit positions.
        bits: EventMask,

        /// The name of the phase that already owns them.
        owner: String,
    },

    /// A phase's new bits lie outside the underlying bit-set width.
    MaskTooWide {
        /// The offending mask.
        mask: EventMask,

        /// The width of the underlying bit set, in bits.
        width: u32,
    },
}

impl Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GateSealed => {
                write!(f, "cannot define a phase after the gate has been awaited")
            }
            Self::BitOverlap { bits, owner } => {
                write!(f, "bits {bits} are already owned by phase \"{owner}\"")
            }
            Self::MaskTooWide { mask, width } => {
                write!(f, "mask {mask} has bits outside the {width}-bit event set")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_bits() {
        let error = ConfigurationError::BitOverlap {
            bits: EventMask::bit(3),
            owner: "phase1".to_owned(),
        };
        assert!(error.to_string().contains("0x00000008"));
        assert!(error.to_string().contains("phase1"));

        let error = ConfigurationError::MaskTooWide {
            mask: EventMask::bit(40),
            width: 32,
        };
        assert!(error.to_string().contains("32-bit"));
    }
}
