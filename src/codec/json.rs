//! JSON serialization strategy (the default wire format).

// std
use std::io::{Read, Write};
// crates.io
use serde::de::IgnoredAny;
// self
use crate::{_prelude::*, codec::SerializationStrategy, error::CodecError};

const FORMAT: &str = "json";

/// `application/json` payloads via `serde_json`, with path-aware decode errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonSerialization;
impl SerializationStrategy for JsonSerialization {
	fn format(&self) -> &'static str {
		FORMAT
	}

	fn content_type(&self) -> &'static str {
		"application/json"
	}

	fn encode<T>(&self, value: &T) -> Result<Bytes, CodecError>
	where
		T: ?Sized + Serialize,
	{
		serde_json::to_vec(value).map(Bytes::from).map_err(|e| CodecError::encode(FORMAT, e))
	}

	fn decode_present<T>(&self, data: &[u8]) -> Result<T, CodecError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(data);
		let value =
			serde_path_to_error::deserialize(&mut de).map_err(|e| CodecError::decode(FORMAT, e))?;

		de.end().map_err(|e| CodecError::decode(FORMAT, e))?;

		Ok(value)
	}

	fn encode_to_writer<W, T>(&self, writer: W, value: &T) -> Result<(), CodecError>
	where
		W: Write,
		T: ?Sized + Serialize,
	{
		serde_json::to_writer(writer, value).map_err(|e| CodecError::encode(FORMAT, e))
	}

	fn decode_from_reader<R, T>(&self, reader: R) -> Result<T, CodecError>
	where
		R: Read,
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_reader(reader);
		let value =
			serde_path_to_error::deserialize(&mut de).map_err(|e| CodecError::decode(FORMAT, e))?;

		de.end().map_err(|e| CodecError::decode(FORMAT, e))?;

		Ok(value)
	}

	fn can_decode(&self, data: &[u8]) -> bool {
		serde_json::from_slice::<IgnoredAny>(data).is_ok()
	}
}
