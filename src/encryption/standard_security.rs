//! Standard security handler, revisions 2 and 3 (RC4).
//!
//! Algorithm numbers in the comments refer to ISO 32000-1 §7.6.3. The
//! AES-based revisions are out of scope; only `/V 1` (40-bit) and `/V 2`
//! (128-bit) files are produced.

use crate::encryption::permissions::Permissions;
use crate::encryption::rc4::rc4_apply;
use crate::objects::ObjectId;

/// Password padding string (ISO 32000-1 Algorithm 2 step a).
pub(crate) const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    /// 40-bit keys, `/V 1 /R 2`.
    R2,
    /// 128-bit keys, `/V 2 /R 3`.
    R3,
}

/// Key material computation for the standard security handler.
#[derive(Debug, Clone)]
pub struct StandardSecurityHandler {
    revision: Revision,
    /// File key length in bytes: 5 for R2, 16 for R3.
    key_length: usize,
}

impl StandardSecurityHandler {
    pub fn rc4_40bit() -> Self {
        Self {
            revision: Revision::R2,
            key_length: 5,
        }
    }

    pub fn rc4_128bit() -> Self {
        Self {
            revision: Revision::R3,
            key_length: 16,
        }
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// The `/V` entry.
    pub fn version_number(&self) -> i64 {
        match self.revision {
            Revision::R2 => 1,
            Revision::R3 => 2,
        }
    }

    /// The `/R` entry.
    pub fn revision_number(&self) -> i64 {
        match self.revision {
            Revision::R2 => 2,
            Revision::R3 => 3,
        }
    }

    /// The `/Length` entry, in bits.
    pub fn key_length_bits(&self) -> i64 {
        (self.key_length * 8) as i64
    }

    /// Truncate or pad the password to exactly 32 bytes.
    fn pad_password(password: &str) -> [u8; 32] {
        let bytes = password.as_bytes();
        let take = bytes.len().min(32);
        let mut padded = [0u8; 32];
        padded[..take].copy_from_slice(&bytes[..take]);
        padded[take..].copy_from_slice(&PADDING[..32 - take]);
        padded
    }

    /// Algorithm 3: the `/O` entry.
    pub fn compute_owner_entry(&self, owner_password: &str, user_password: &str) -> [u8; 32] {
        let mut digest = md5::compute(Self::pad_password(owner_password)).0;
        if self.revision == Revision::R3 {
            for _ in 0..50 {
                digest = md5::compute(digest).0;
            }
        }
        let key = &digest[..self.key_length];

        let mut value = rc4_apply(key, &Self::pad_password(user_password));
        if self.revision == Revision::R3 {
            for round in 1..=19u8 {
                let round_key: Vec<u8> = key.iter().map(|b| b ^ round).collect();
                value = rc4_apply(&round_key, &value);
            }
        }
        let mut entry = [0u8; 32];
        entry.copy_from_slice(&value);
        entry
    }

    /// Algorithm 2: the file encryption key.
    pub fn compute_file_key(
        &self,
        user_password: &str,
        owner_entry: &[u8; 32],
        permissions: Permissions,
        document_id: &[u8],
    ) -> Vec<u8> {
        let mut input = Vec::with_capacity(68 + document_id.len());
        input.extend_from_slice(&Self::pad_password(user_password));
        input.extend_from_slice(owner_entry);
        input.extend_from_slice(&permissions.le_bytes());
        input.extend_from_slice(document_id);

        let mut digest = md5::compute(&input).0;
        if self.revision == Revision::R3 {
            // 50 extra rounds, rehashing only the key-length prefix.
            for _ in 0..50 {
                digest = md5::compute(&digest[..self.key_length]).0;
            }
        }
        digest[..self.key_length].to_vec()
    }

    /// Algorithm 4 (R2) / Algorithm 5 (R3): the `/U` entry.
    pub fn compute_user_entry(&self, file_key: &[u8], document_id: &[u8]) -> [u8; 32] {
        let mut entry = [0u8; 32];
        match self.revision {
            Revision::R2 => {
                entry.copy_from_slice(&rc4_apply(file_key, &PADDING));
            }
            Revision::R3 => {
                let mut input = PADDING.to_vec();
                input.extend_from_slice(document_id);
                let digest = md5::compute(&input).0;

                let mut value = rc4_apply(file_key, &digest);
                for round in 1..=19u8 {
                    let round_key: Vec<u8> = file_key.iter().map(|b| b ^ round).collect();
                    value = rc4_apply(&round_key, &value);
                }
                // ISO 32000 leaves the trailing 16 bytes arbitrary.
                entry[..16].copy_from_slice(&value);
            }
        }
        entry
    }

    /// Algorithm 6: check a user password and return the file key on
    /// success.
    pub fn verify_user_password(
        &self,
        password: &str,
        owner_entry: &[u8; 32],
        permissions: Permissions,
        document_id: &[u8],
        user_entry: &[u8; 32],
    ) -> Option<Vec<u8>> {
        let file_key = self.compute_file_key(password, owner_entry, permissions, document_id);
        let expected = self.compute_user_entry(&file_key, document_id);
        let matches = match self.revision {
            Revision::R2 => expected == *user_entry,
            // R3 compares only the meaningful first half.
            Revision::R3 => expected[..16] == user_entry[..16],
        };
        matches.then_some(file_key)
    }

    /// Algorithm 1: the per-object key derived from the file key and the
    /// object's number and generation.
    pub fn object_key(&self, file_key: &[u8], id: ObjectId) -> Vec<u8> {
        let mut input = Vec::with_capacity(file_key.len() + 5);
        input.extend_from_slice(file_key);
        input.extend_from_slice(&id.number().to_le_bytes()[..3]);
        input.extend_from_slice(&id.generation().to_le_bytes()[..2]);
        let digest = md5::compute(&input).0;
        let len = (file_key.len() + 5).min(16);
        digest[..len].to_vec()
    }

    /// Encrypt (or, RC4 being symmetric, decrypt) one object's string or
    /// stream bytes.
    pub fn apply_object_cipher(&self, file_key: &[u8], id: ObjectId, data: &[u8]) -> Vec<u8> {
        rc4_apply(&self.object_key(file_key, id), data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_password_short() {
        let padded = StandardSecurityHandler::pad_password("user");
        assert_eq!(&padded[..4], b"user");
        assert_eq!(&padded[4..], &PADDING[..28]);
    }

    #[test]
    fn test_pad_password_long() {
        let long = "x".repeat(40);
        let padded = StandardSecurityHandler::pad_password(&long);
        assert_eq!(padded, [b'x'; 32]);
    }

    #[test]
    fn test_key_lengths() {
        assert_eq!(StandardSecurityHandler::rc4_40bit().key_length, 5);
        assert_eq!(StandardSecurityHandler::rc4_128bit().key_length, 16);
        assert_eq!(StandardSecurityHandler::rc4_40bit().version_number(), 1);
        assert_eq!(StandardSecurityHandler::rc4_128bit().version_number(), 2);
    }

    #[test]
    fn test_file_key_length_matches_revision() {
        let id = b"\x01\x02\x03\x04";
        for (handler, len) in [
            (StandardSecurityHandler::rc4_40bit(), 5),
            (StandardSecurityHandler::rc4_128bit(), 16),
        ] {
            let o = handler.compute_owner_entry("owner", "user");
            let key = handler.compute_file_key("user", &o, Permissions::all(), id);
            assert_eq!(key.len(), len);
        }
    }

    #[test]
    fn test_object_cipher_roundtrip() {
        let handler = StandardSecurityHandler::rc4_128bit();
        let o = handler.compute_owner_entry("owner", "user");
        let key = handler.compute_file_key("user", &o, Permissions::all(), b"docid");
        let id = ObjectId::new(7, 0);

        let plaintext = b"(confidential)";
        let ciphertext = handler.apply_object_cipher(&key, id, plaintext);
        assert_ne!(&ciphertext, plaintext);
        assert_eq!(handler.apply_object_cipher(&key, id, &ciphertext), plaintext);

        // A different object number yields a different keystream.
        let other = handler.apply_object_cipher(&key, ObjectId::new(8, 0), plaintext);
        assert_ne!(other, ciphertext);
    }

    #[test]
    fn test_verify_user_password() {
        for handler in [
            StandardSecurityHandler::rc4_40bit(),
            StandardSecurityHandler::rc4_128bit(),
        ] {
            let doc_id = b"\xAA\xBB\xCC\xDD";
            let permissions = Permissions::all();
            let o = handler.compute_owner_entry("owner-secret", "user-secret");
            let key = handler.compute_file_key("user-secret", &o, permissions, doc_id);
            let u = handler.compute_user_entry(&key, doc_id);

            let recovered = handler
                .verify_user_password("user-secret", &o, permissions, doc_id, &u)
                .expect("correct password accepted");
            assert_eq!(recovered, key);

            assert!(handler
                .verify_user_password("wrong", &o, permissions, doc_id, &u)
                .is_none());
        }
    }

    #[test]
    fn test_owner_entry_depends_on_both_passwords() {
        let handler = StandardSecurityHandler::rc4_128bit();
        let a = handler.compute_owner_entry("owner", "user");
        let b = handler.compute_owner_entry("owner2", "user");
        let c = handler.compute_owner_entry("owner", "user2");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
