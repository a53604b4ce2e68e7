use crate::error::Result;
use crate::objects::{Dictionary, Object};

/// A stream object under construction: dictionary plus raw payload.
#[derive(Debug, Clone)]
pub struct Stream {
    dict: Dictionary,
    data: Vec<u8>,
}

impl Stream {
    pub fn new(data: Vec<u8>) -> Self {
        let mut dict = Dictionary::new();
        dict.set("Length", data.len() as i64);
        Self { dict, data }
    }

    pub fn with_dict(mut dict: Dictionary, data: Vec<u8>) -> Self {
        dict.set("Length", data.len() as i64);
        Self { dict, data }
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    pub fn dictionary_mut(&mut self) -> &mut Dictionary {
        &mut self.dict
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_object(self) -> Object {
        Object::Stream(self.dict, self.data)
    }

    /// Deflate the payload and mark the stream `/Filter /FlateDecode`.
    #[cfg(feature = "compression")]
    pub fn compress_flate(&mut self) -> Result<()> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&self.data)?;
        self.data = encoder
            .finish()
            .map_err(|e| crate::error::PdfError::CompressionError(e.to_string()))?;
        self.dict.set("Filter", Object::name("FlateDecode"));
        self.dict.set("Length", self.data.len() as i64);
        Ok(())
    }
}

/// Decode a stream payload according to its `/Filter` entry.
///
/// Only `FlateDecode` is handled; unfiltered data comes back as-is. Other
/// filters are left untouched so callers can pass the bytes through.
pub fn decoded_stream_data(dict: &Dictionary, data: &[u8]) -> Result<Vec<u8>> {
    let is_flate = match dict.get("Filter") {
        None => return Ok(data.to_vec()),
        Some(Object::Name(n)) => n == "FlateDecode",
        Some(Object::Array(filters)) => {
            filters.len() == 1 && filters[0].as_name() == Some("FlateDecode")
        }
        Some(_) => false,
    };

    if !is_flate {
        return Ok(data.to_vec());
    }

    #[cfg(feature = "compression")]
    {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let mut decoder = ZlibDecoder::new(data);
        let mut decoded = Vec::new();
        decoder
            .read_to_end(&mut decoded)
            .map_err(|e| crate::error::PdfError::CompressionError(e.to_string()))?;
        Ok(decoded)
    }
    #[cfg(not(feature = "compression"))]
    {
        Err(crate::error::PdfError::CompressionError(
            "FlateDecode stream but the compression feature is disabled".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stream_sets_length() {
        let stream = Stream::new(b"BT ET".to_vec());
        assert_eq!(stream.dictionary().get_integer("Length"), Some(5));
        assert_eq!(stream.data(), b"BT ET");
    }

    #[test]
    fn test_decode_unfiltered() {
        let dict = Dictionary::new();
        assert_eq!(decoded_stream_data(&dict, b"raw").unwrap(), b"raw");
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_compress_roundtrip() {
        let payload = b"q 1 0 0 1 0 0 cm Q ".repeat(20);
        let mut stream = Stream::new(payload.clone());
        stream.compress_flate().unwrap();

        assert_eq!(stream.dictionary().get_name("Filter"), Some("FlateDecode"));
        assert!(stream.data().len() < payload.len());

        let decoded = decoded_stream_data(stream.dictionary(), stream.data()).unwrap();
        assert_eq!(decoded, payload);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn test_decode_filter_array() {
        let mut stream = Stream::new(b"hello stream".to_vec());
        stream.compress_flate().unwrap();

        let mut dict = Dictionary::new();
        dict.set("Filter", vec![Object::name("FlateDecode")]);
        let decoded = decoded_stream_data(&dict, stream.data()).unwrap();
        assert_eq!(decoded, b"hello stream");
    }
}
