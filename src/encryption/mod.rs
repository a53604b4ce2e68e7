//! Standard security handler (RC4, revisions 2 and 3).

pub mod permissions;
pub mod rc4;
pub mod standard_security;

pub use permissions::Permissions;
pub use rc4::Rc4;
pub use standard_security::{Revision, StandardSecurityHandler};

use crate::objects::{Dictionary, Object};

/// Build the `/Encrypt` dictionary for a prepared handler.
pub(crate) fn encryption_dictionary(
    handler: &StandardSecurityHandler,
    owner_entry: &[u8; 32],
    user_entry: &[u8; 32],
    permissions: Permissions,
) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Filter", Object::name("Standard"));
    dict.set("V", handler.version_number());
    if handler.revision() == Revision::R3 {
        dict.set("Length", handler.key_length_bits());
    }
    dict.set("R", handler.revision_number());
    dict.set("O", Object::hex_string(owner_entry.to_vec()));
    dict.set("U", Object::hex_string(user_entry.to_vec()));
    dict.set("P", i64::from(permissions.p_value()));
    dict
}
