//! Adler-32 checksum
//!
//! Streaming implementation of the Adler-32 checksum (RFC 1950). Input is
//! consumed in blocks of at most [`NMAX`] bytes between modulo reductions,
//! which is the largest block for which the 32-bit sums cannot overflow.
//! The result does not depend on how the input is split across
//! [`Adler32::update`] calls.

/// Largest prime smaller than 2^16
const MOD_ADLER: u32 = 65521;

/// Largest n such that 255n(n+1)/2 + (n+1)(MOD_ADLER-1) <= 2^32-1
pub const NMAX: usize = 5552;

/// Running Adler-32 state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Adler32 {
    /// Create a fresh accumulator (`a = 1`, `b = 0`)
    pub const fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Reset to the initial state
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Feed bytes into the accumulator
    pub fn update(&mut self, data: &[u8]) {
        for block in data.chunks(NMAX) {
            for &byte in block {
                self.a += u32::from(byte);
                self.b += self.a;
            }
            self.a %= MOD_ADLER;
            self.b %= MOD_ADLER;
        }
    }

    /// Current checksum value, `(b << 16) | a`
    pub const fn finish(&self) -> u32 {
        (self.b << 16) | self.a
    }
}

/// Compute the Adler-32 checksum of `data` in one call
///
/// # Examples
///
/// ```
/// use packfs_formats::adler32;
///
/// assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
/// ```
pub fn adler32(data: &[u8]) -> u32 {
    let mut hasher = Adler32::new();
    hasher.update(data);
    hasher.finish()
}
