//! XML serialization strategy for endpoints that do not speak JSON.

// std
use std::io::{BufReader, Read, Write};
// crates.io
use quick_xml::{Reader, events::Event};
// self
use crate::{_prelude::*, codec::SerializationStrategy, error::CodecError};

const FORMAT: &str = "xml";

/// `application/xml` payloads via `quick-xml`'s serde integration.
///
/// The root element is named after the serialized type.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlSerialization;
impl SerializationStrategy for XmlSerialization {
	fn format(&self) -> &'static str {
		FORMAT
	}

	fn content_type(&self) -> &'static str {
		"application/xml"
	}

	fn encode<T>(&self, value: &T) -> Result<Bytes, CodecError>
	where
		T: ?Sized + Serialize,
	{
		quick_xml::se::to_string(value)
			.map(|text| Bytes::from(text.into_bytes()))
			.map_err(|e| CodecError::encode(FORMAT, e))
	}

	fn decode_present<T>(&self, data: &[u8]) -> Result<T, CodecError>
	where
		T: DeserializeOwned,
	{
		let text = std::str::from_utf8(data).map_err(|e| CodecError::decode(FORMAT, e))?;

		quick_xml::de::from_str(text).map_err(|e| CodecError::decode(FORMAT, e))
	}

	fn encode_to_writer<W, T>(&self, mut writer: W, value: &T) -> Result<(), CodecError>
	where
		W: Write,
		T: ?Sized + Serialize,
	{
		let encoded = self.encode(value)?;

		writer.write_all(&encoded).map_err(|e| CodecError::encode(FORMAT, e))
	}

	fn decode_from_reader<R, T>(&self, reader: R) -> Result<T, CodecError>
	where
		R: Read,
		T: DeserializeOwned,
	{
		quick_xml::de::from_reader(BufReader::new(reader)).map_err(|e| CodecError::decode(FORMAT, e))
	}

	fn can_decode(&self, data: &[u8]) -> bool {
		let mut reader = Reader::from_reader(data);
		let mut depth = 0_usize;
		let mut saw_root = false;

		loop {
			match reader.read_event() {
				Ok(Event::Start(_)) => {
					depth += 1;
					saw_root = true;
				},
				Ok(Event::End(_)) => match depth.checked_sub(1) {
					Some(next) => depth = next,
					None => return false,
				},
				Ok(Event::Empty(_)) => saw_root = true,
				Ok(Event::Eof) => return saw_root && depth == 0,
				Ok(_) => {},
				Err(_) => return false,
			}
		}
	}
}
