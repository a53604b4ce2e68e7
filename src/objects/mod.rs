//! PDF object model: primitives, dictionaries, and streams

mod dictionary;
mod primitive;
pub mod stream;

pub use dictionary::Dictionary;
pub use primitive::{Object, ObjectId, StringFormat};
pub use stream::{decoded_stream_data, Stream};
