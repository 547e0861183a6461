//! Serialization strategies: encode request payloads and decode response bodies.
//!
//! JSON is the default wire format; [`XmlSerialization`] offers the identical contract for
//! endpoints that speak XML. Every strategy treats an empty or literal `null` body as "absent",
//! so `Option<T>` and `()` decode cleanly from bodiless responses.

pub mod json;
pub mod xml;

pub use json::JsonSerialization;
pub use xml::XmlSerialization;

// std
use std::io::{Read, Write};
// crates.io
use serde::de::{IntoDeserializer, value::Error as ValueError};
// self
use crate::{_prelude::*, error::CodecError};

/// Wire format selector used by configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
	/// `application/json`.
	#[default]
	Json,
	/// `application/xml`.
	Xml,
}
impl SerializationStrategy for WireFormat {
	fn format(&self) -> &'static str {
		match self {
			Self::Json => JsonSerialization.format(),
			Self::Xml => XmlSerialization.format(),
		}
	}

	fn content_type(&self) -> &'static str {
		match self {
			Self::Json => JsonSerialization.content_type(),
			Self::Xml => XmlSerialization.content_type(),
		}
	}

	fn encode<T>(&self, value: &T) -> Result<Bytes, CodecError>
	where
		T: ?Sized + Serialize,
	{
		match self {
			Self::Json => JsonSerialization.encode(value),
			Self::Xml => XmlSerialization.encode(value),
		}
	}

	fn decode_present<T>(&self, data: &[u8]) -> Result<T, CodecError>
	where
		T: DeserializeOwned,
	{
		match self {
			Self::Json => JsonSerialization.decode_present(data),
			Self::Xml => XmlSerialization.decode_present(data),
		}
	}

	fn encode_to_writer<W, T>(&self, writer: W, value: &T) -> Result<(), CodecError>
	where
		W: Write,
		T: ?Sized + Serialize,
	{
		match self {
			Self::Json => JsonSerialization.encode_to_writer(writer, value),
			Self::Xml => XmlSerialization.encode_to_writer(writer, value),
		}
	}

	fn decode_from_reader<R, T>(&self, reader: R) -> Result<T, CodecError>
	where
		R: Read,
		T: DeserializeOwned,
	{
		match self {
			Self::Json => JsonSerialization.decode_from_reader(reader),
			Self::Xml => XmlSerialization.decode_from_reader(reader),
		}
	}

	fn can_decode(&self, data: &[u8]) -> bool {
		match self {
			Self::Json => JsonSerialization.can_decode(data),
			Self::Xml => XmlSerialization.can_decode(data),
		}
	}
}

/// Encodes and decodes payloads for one wire format.
pub trait SerializationStrategy
where
	Self: Send + Sync,
{
	/// Short label used in errors and logs.
	fn format(&self) -> &'static str;

	/// MIME type attached to encoded request bodies.
	fn content_type(&self) -> &'static str;

	/// Encodes `value` into immutable bytes.
	fn encode<T>(&self, value: &T) -> Result<Bytes, CodecError>
	where
		T: ?Sized + Serialize;

	/// Decodes a non-absent payload. Callers should prefer [`decode`](Self::decode).
	fn decode_present<T>(&self, data: &[u8]) -> Result<T, CodecError>
	where
		T: DeserializeOwned;

	/// Streams the encoding of `value` into `writer`.
	fn encode_to_writer<W, T>(&self, writer: W, value: &T) -> Result<(), CodecError>
	where
		W: Write,
		T: ?Sized + Serialize;

	/// Decodes a payload read from `reader`.
	fn decode_from_reader<R, T>(&self, reader: R) -> Result<T, CodecError>
	where
		R: Read,
		T: DeserializeOwned;

	/// Returns `true` when `data` is well-formed in this wire format. Never fails.
	fn can_decode(&self, data: &[u8]) -> bool;

	/// Decodes `data`, mapping an empty or `null` body to the type's absent value.
	fn decode<T>(&self, data: &[u8]) -> Result<T, CodecError>
	where
		T: DeserializeOwned,
	{
		if is_absent(data) { decode_absent(self.format()) } else { self.decode_present(data) }
	}

	/// Decodes `data`, falling back to `T::default()` for an empty or `null` body.
	fn decode_or_default<T>(&self, data: &[u8]) -> Result<T, CodecError>
	where
		T: DeserializeOwned + Default,
	{
		if is_absent(data) { Ok(T::default()) } else { self.decode_present(data) }
	}
}

/// Returns `true` for bodies that carry no value: empty, whitespace, or a bare `null`.
pub fn is_absent(data: &[u8]) -> bool {
	let trimmed = data.trim_ascii();

	trimmed.is_empty() || trimmed == b"null"
}

fn decode_absent<T>(format: &'static str) -> Result<T, CodecError>
where
	T: DeserializeOwned,
{
	T::deserialize(().into_deserializer())
		.map_err(|e: ValueError| CodecError::decode(format, e))
}
