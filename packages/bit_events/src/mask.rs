//! Typed event bit masks.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// A set of event bit positions, used both to signal events and to describe
/// wait conditions.
///
/// Bit indices are the only identity that producers and consumers share, so
/// masks are deliberately cheap `Copy` values. Combine masks with the usual
/// bitwise operators.
///
/// # Example
///
/// ```rust
/// use bit_events::EventMask;
///
/// const HARDWARE_READY: EventMask = EventMask::bit(0);
/// const DRIVERS_LOADED: EventMask = EventMask::bit(1);
///
/// let phase_one = HARDWARE_READY | DRIVERS_LOADED;
/// assert!(phase_one.contains(HARDWARE_READY));
/// assert!(!HARDWARE_READY.intersects(DRIVERS_LOADED));
/// ```
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
pub struct EventMask(u64);

impl EventMask {
    /// The empty mask, matching no bits.
    pub const NONE: Self = Self(0);

    /// A mask with the single bit at `index` set.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 64 or greater.
    #[must_use]
    pub const fn bit(index: u32) -> Self {
        assert!(index < 64, "bit index out of range (must be below 64)");
        Self(1 << index)
    }

    /// A mask from a raw bit pattern.
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// The raw bit pattern of this mask.
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether no bits are set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is also set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether at least one bit is set in both `self` and `other`.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// A mask with the lowest `width` bits set.
    ///
    /// # Panics
    ///
    /// Panics if `width` is greater than 64.
    #[must_use]
    pub const fn up_to(width: u32) -> Self {
        assert!(width <= 64, "width out of range (must be at most 64)");

        if width == 64 {
            Self(u64::MAX)
        } else {
            Self((1 << width) - 1)
        }
    }
}

impl BitOr for EventMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for EventMask {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for EventMask {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventMask")
            .field(&format_args!("{:#x}", self.0))
            .finish()
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
