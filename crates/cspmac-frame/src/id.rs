//! CSP extended identifier.
//!
//! The 32-bit identifier packs the routing header of a CSP packet:
//!
//! ```text
//! 31 30 29     25 24     20 19      14 13       8 7       0
//! ┌─────┬─────────┬─────────┬──────────┬──────────┬─────────┐
//! │ pri │   src   │   dst   │  dport   │  sport   │  flags  │
//! │ 2b  │   5b    │   5b    │   6b     │   6b     │   8b    │
//! └─────┴─────────┴─────────┴──────────┴──────────┴─────────┘
//! ```
//!
//! The adapter itself only moves the raw value across the wire; the field
//! accessors exist for diagnostics and for building packets by hand.

use std::fmt;

/// Critical priority.
pub const PRIO_CRITICAL: u8 = 0;
/// High priority.
pub const PRIO_HIGH: u8 = 1;
/// Normal priority.
pub const PRIO_NORM: u8 = 2;
/// Low priority.
pub const PRIO_LOW: u8 = 3;

/// HMAC flag.
pub const FLAG_HMAC: u8 = 0x08;
/// XTEA encryption flag.
pub const FLAG_XTEA: u8 = 0x04;
/// Reliable datagram protocol flag.
pub const FLAG_RDP: u8 = 0x02;
/// CRC32 flag.
pub const FLAG_CRC32: u8 = 0x01;

const PRI_SHIFT: u32 = 30;
const SRC_SHIFT: u32 = 25;
const DST_SHIFT: u32 = 20;
const DPORT_SHIFT: u32 = 14;
const SPORT_SHIFT: u32 = 8;

const PRI_MASK: u32 = 0x3;
const HOST_MASK: u32 = 0x1F;
const PORT_MASK: u32 = 0x3F;
const FLAGS_MASK: u32 = 0xFF;

/// A CSP extended identifier in host byte order.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CspId(u32);

impl CspId {
    /// Build an identifier from its fields. Out-of-range values are masked.
    pub fn new(pri: u8, src: u8, dst: u8, dport: u8, sport: u8, flags: u8) -> Self {
        let ext = ((u32::from(pri) & PRI_MASK) << PRI_SHIFT)
            | ((u32::from(src) & HOST_MASK) << SRC_SHIFT)
            | ((u32::from(dst) & HOST_MASK) << DST_SHIFT)
            | ((u32::from(dport) & PORT_MASK) << DPORT_SHIFT)
            | ((u32::from(sport) & PORT_MASK) << SPORT_SHIFT)
            | (u32::from(flags) & FLAGS_MASK);
        Self(ext)
    }

    /// Wrap a raw extended identifier.
    pub const fn from_ext(ext: u32) -> Self {
        Self(ext)
    }

    /// The raw extended identifier.
    pub const fn ext(self) -> u32 {
        self.0
    }

    pub fn pri(self) -> u8 {
        ((self.0 >> PRI_SHIFT) & PRI_MASK) as u8
    }

    pub fn src(self) -> u8 {
        ((self.0 >> SRC_SHIFT) & HOST_MASK) as u8
    }

    pub fn dst(self) -> u8 {
        ((self.0 >> DST_SHIFT) & HOST_MASK) as u8
    }

    pub fn dport(self) -> u8 {
        ((self.0 >> DPORT_SHIFT) & PORT_MASK) as u8
    }

    pub fn sport(self) -> u8 {
        ((self.0 >> SPORT_SHIFT) & PORT_MASK) as u8
    }

    pub fn flags(self) -> u8 {
        (self.0 & FLAGS_MASK) as u8
    }
}

impl From<u32> for CspId {
    fn from(ext: u32) -> Self {
        Self(ext)
    }
}

impl From<CspId> for u32 {
    fn from(id: CspId) -> Self {
        id.0
    }
}

impl fmt::Debug for CspId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CspId({:#010x})", self.0)
    }
}

impl fmt::Display for CspId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pri={} src={} dst={} dport={} sport={} flags={:#04x}",
            self.pri(),
            self.src(),
            self.dst(),
            self.dport(),
            self.sport(),
            self.flags()
        )
    }
}

/// Returns a human-readable name for a priority value.
pub fn priority_name(pri: u8) -> &'static str {
    match pri {
        PRIO_CRITICAL => "CRITICAL",
        PRIO_HIGH => "HIGH",
        PRIO_NORM => "NORM",
        PRIO_LOW => "LOW",
        _ => "INVALID",
    }
}
