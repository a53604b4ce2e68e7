//! User access permissions (ISO 32000-1 Table 22).

/// The 32-bit `/P` permission field.
///
/// Bits 1-2 are required zero, bits 7-8 and 13-32 required one; the flag
/// methods only touch the meaningful bits in between. Bit numbering below is
/// the standard's 1-based convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    bits: u32,
}

const BIT_PRINT: u32 = 3;
const BIT_MODIFY: u32 = 4;
const BIT_COPY: u32 = 5;
const BIT_ANNOTATE: u32 = 6;
const BIT_FILL_FORMS: u32 = 9;
const BIT_ACCESSIBILITY: u32 = 10;
const BIT_ASSEMBLE: u32 = 11;
const BIT_PRINT_HIGH_QUALITY: u32 = 12;

const REQUIRED_ONES: u32 = 0xFFFF_F0C0;
const REQUIRED_ZEROS: u32 = 0x0000_0003;

impl Permissions {
    /// Everything allowed. This is the writer's default.
    pub fn all() -> Self {
        Self {
            bits: !REQUIRED_ZEROS,
        }
    }

    /// Nothing allowed beyond the bits the format forces on.
    pub fn none() -> Self {
        Self {
            bits: REQUIRED_ONES,
        }
    }

    fn with_bit(mut self, bit: u32, allowed: bool) -> Self {
        let mask = 1u32 << (bit - 1);
        if allowed {
            self.bits |= mask;
        } else {
            self.bits &= !mask;
        }
        self.bits = (self.bits | REQUIRED_ONES) & !REQUIRED_ZEROS;
        self
    }

    pub fn print(self, allowed: bool) -> Self {
        self.with_bit(BIT_PRINT, allowed)
    }

    pub fn modify_contents(self, allowed: bool) -> Self {
        self.with_bit(BIT_MODIFY, allowed)
    }

    pub fn copy(self, allowed: bool) -> Self {
        self.with_bit(BIT_COPY, allowed)
    }

    pub fn modify_annotations(self, allowed: bool) -> Self {
        self.with_bit(BIT_ANNOTATE, allowed)
    }

    pub fn fill_forms(self, allowed: bool) -> Self {
        self.with_bit(BIT_FILL_FORMS, allowed)
    }

    pub fn accessibility(self, allowed: bool) -> Self {
        self.with_bit(BIT_ACCESSIBILITY, allowed)
    }

    pub fn assemble(self, allowed: bool) -> Self {
        self.with_bit(BIT_ASSEMBLE, allowed)
    }

    pub fn print_high_quality(self, allowed: bool) -> Self {
        self.with_bit(BIT_PRINT_HIGH_QUALITY, allowed)
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The signed value written as `/P`.
    pub fn p_value(&self) -> i32 {
        self.bits as i32
    }

    /// Little-endian bytes as mixed into the file encryption key.
    pub fn le_bytes(&self) -> [u8; 4] {
        self.bits.to_le_bytes()
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_minus_four() {
        // Only the two required-zero bits are clear.
        assert_eq!(Permissions::all().p_value(), -4);
    }

    #[test]
    fn test_none_keeps_required_ones() {
        let p = Permissions::none();
        assert_eq!(p.bits() & REQUIRED_ONES, REQUIRED_ONES);
        assert_eq!(p.bits() & (1 << (BIT_PRINT - 1)), 0);
    }

    #[test]
    fn test_flag_toggling() {
        let p = Permissions::none().print(true).copy(true);
        assert_ne!(p.bits() & (1 << (BIT_PRINT - 1)), 0);
        assert_ne!(p.bits() & (1 << (BIT_COPY - 1)), 0);
        assert_eq!(p.bits() & (1 << (BIT_MODIFY - 1)), 0);

        let p = p.print(false);
        assert_eq!(p.bits() & (1 << (BIT_PRINT - 1)), 0);
    }

    #[test]
    fn test_invariant_bits_survive_toggling() {
        let p = Permissions::all().modify_contents(false).assemble(false);
        assert_eq!(p.bits() & REQUIRED_ZEROS, 0);
        assert_eq!(p.bits() & REQUIRED_ONES, REQUIRED_ONES);
    }
}
