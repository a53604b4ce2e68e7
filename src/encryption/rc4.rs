//! RC4 stream cipher.
//!
//! RC4 is retained for compatibility with the classic standard security
//! handler; it is not a cipher to reach for anywhere else.

/// RC4 cipher state.
pub struct Rc4 {
    s: [u8; 256],
    i: usize,
    j: usize,
}

impl Rc4 {
    /// Key-schedule a cipher from raw key bytes. Keys are 1-256 bytes;
    /// the handler only produces 5-16 byte keys.
    pub fn new(key: &[u8]) -> Self {
        debug_assert!(!key.is_empty());
        let mut s = [0u8; 256];
        for (i, slot) in s.iter_mut().enumerate() {
            *slot = i as u8;
        }
        let mut j = 0usize;
        for i in 0..256 {
            j = (j + s[i] as usize + key[i % key.len()] as usize) % 256;
            s.swap(i, j);
        }
        Self { s, i: 0, j: 0 }
    }

    /// Apply the keystream. Encryption and decryption are the same
    /// operation.
    pub fn process(&mut self, data: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(data.len());
        for &byte in data {
            self.i = (self.i + 1) % 256;
            self.j = (self.j + self.s[self.i] as usize) % 256;
            self.s.swap(self.i, self.j);
            let k = self.s[(self.s[self.i] as usize + self.s[self.j] as usize) % 256];
            output.push(byte ^ k);
        }
        output
    }
}

/// One-shot convenience for the single-message uses in the handler.
pub fn rc4_apply(key: &[u8], data: &[u8]) -> Vec<u8> {
    Rc4::new(key).process(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Published RC4 test vectors.
    #[test]
    fn test_known_vectors() {
        assert_eq!(
            rc4_apply(b"Key", b"Plaintext"),
            vec![0xBB, 0xF3, 0x16, 0xE8, 0xD9, 0x40, 0xAF, 0x0A, 0xD3]
        );
        assert_eq!(
            rc4_apply(b"Wiki", b"pedia"),
            vec![0x10, 0x21, 0xBF, 0x04, 0x20]
        );
        assert_eq!(
            rc4_apply(b"Secret", b"Attack at dawn"),
            vec![
                0x45, 0xA0, 0x1F, 0x64, 0x5F, 0xC3, 0x5B, 0x38, 0x35, 0x52, 0x54, 0x4B, 0x9B,
                0xF5
            ]
        );
    }

    #[test]
    fn test_symmetric() {
        let key = b"\x01\x02\x03\x04\x05";
        let plaintext = b"stream payload bytes";
        let ciphertext = rc4_apply(key, plaintext);
        assert_ne!(ciphertext, plaintext);
        assert_eq!(rc4_apply(key, &ciphertext), plaintext);
    }
}
