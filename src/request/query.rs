//! Query-string values and their per-call encoding conventions.

// std
use std::borrow::Cow;
// crates.io
use serde_json::Value;
use url::form_urlencoded;
// self
use crate::_prelude::*;

/// How an array-valued parameter is laid out in the query string.
///
/// The layout is part of each endpoint's documented contract, so callers choose it per call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayStyle {
	/// `key[]=a&key[]=b`.
	#[default]
	Bracketed,
	/// `key=a&key=b`.
	Repeated,
	/// `key=a,b`.
	CommaJoined,
	/// `key=["a",1,true]`; elements keep their JSON type.
	Json,
}

/// Value of a single query parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
	/// One scalar value, encoded as-is.
	Scalar(String),
	/// Several values laid out according to `style`.
	///
	/// Elements stay typed so the JSON layout can emit numbers and booleans unquoted; the other
	/// layouts render strings bare and everything else through its JSON text.
	Array {
		/// Values in caller order.
		values: Vec<Value>,
		/// Layout convention.
		style: ArrayStyle,
	},
}
impl From<&str> for QueryValue {
	fn from(value: &str) -> Self {
		Self::Scalar(value.to_owned())
	}
}
impl From<String> for QueryValue {
	fn from(value: String) -> Self {
		Self::Scalar(value)
	}
}
impl From<&String> for QueryValue {
	fn from(value: &String) -> Self {
		Self::Scalar(value.clone())
	}
}
impl From<bool> for QueryValue {
	fn from(value: bool) -> Self {
		Self::Scalar(if value { "true" } else { "false" }.to_owned())
	}
}
macro_rules! impl_numeric_query_value {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for QueryValue {
				fn from(value: $ty) -> Self {
					Self::Scalar(value.to_string())
				}
			}
		)*
	};
}
impl_numeric_query_value!(i32, i64, u32, u64, usize, f64);

/// Named query parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryParam {
	/// Parameter name, without any `[]` suffix.
	pub key: String,
	/// Parameter value.
	pub value: QueryValue,
}
impl QueryParam {
	/// Creates a parameter from any convertible value.
	pub fn new(key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
		Self { key: key.into(), value: value.into() }
	}

	/// Creates an array parameter with the given layout.
	pub fn array<I, V>(key: impl Into<String>, values: I, style: ArrayStyle) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		Self {
			key: key.into(),
			value: QueryValue::Array { values: values.into_iter().map(Into::into).collect(), style },
		}
	}

	/// Creates a parameter whose single value is the JSON encoding of `value`.
	pub fn json<T>(key: impl Into<String>, value: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let encoded = serde_json::to_string(value)
			.map_err(|e| crate::error::CodecError::encode("json", e))?;

		Ok(Self::new(key, encoded))
	}
}

/// Encodes parameters into a query string (without the leading `?`).
///
/// Values are form-encoded individually. Keys keep a literal `[]` suffix for bracketed arrays.
pub fn encode_query(params: &[QueryParam]) -> String {
	let mut pairs = Vec::new();

	for param in params {
		let key = encode_form(&param.key);

		match &param.value {
			QueryValue::Scalar(value) => pairs.push(format!("{key}={}", encode_form(value))),
			QueryValue::Array { values, style } => match style {
				ArrayStyle::Bracketed => pairs.extend(
					values.iter().map(|value| format!("{key}[]={}", encode_form(&element_text(value)))),
				),
				ArrayStyle::Repeated => pairs.extend(
					values.iter().map(|value| format!("{key}={}", encode_form(&element_text(value)))),
				),
				ArrayStyle::CommaJoined => {
					let joined =
						values.iter().map(|value| encode_form(&element_text(value))).collect::<Vec<_>>();

					pairs.push(format!("{key}={}", joined.join(",")));
				},
				ArrayStyle::Json => {
					let json = Value::Array(values.clone()).to_string();

					pairs.push(format!("{key}={}", encode_form(&json)));
				},
			},
		}
	}

	pairs.join("&")
}

/// Percent-encodes a path segment, leaving only RFC 3986 unreserved characters intact.
pub fn encode_component(value: &str) -> String {
	let mut out = String::with_capacity(value.len());

	for byte in value.bytes() {
		if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
			out.push(byte as char);
		} else {
			out.push_str(&format!("%{byte:02X}"));
		}
	}

	out
}

fn element_text(value: &Value) -> Cow<'_, str> {
	match value {
		Value::String(s) => Cow::Borrowed(s),
		other => Cow::Owned(other.to_string()),
	}
}

fn encode_form(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn booleans_serialize_lowercase() {
		let query = encode_query(&[QueryParam::new("archived", true), QueryParam::new("subtasks", false)]);

		assert_eq!(query, "archived=true&subtasks=false");
	}

	#[test]
	fn array_styles_follow_their_contract() {
		let ids = ["a1", "b 2"];

		assert_eq!(
			encode_query(&[QueryParam::array("assignees", ids, ArrayStyle::Bracketed)]),
			"assignees[]=a1&assignees[]=b+2"
		);
		assert_eq!(
			encode_query(&[QueryParam::array("tags", ids, ArrayStyle::Repeated)]),
			"tags=a1&tags=b+2"
		);
		assert_eq!(
			encode_query(&[QueryParam::array("list_ids", ids, ArrayStyle::CommaJoined)]),
			"list_ids=a1,b+2"
		);
		assert_eq!(
			encode_query(&[QueryParam::array("custom_items", ids, ArrayStyle::Json)]),
			"custom_items=%5B%22a1%22%2C%22b+2%22%5D"
		);
	}

	#[test]
	fn json_arrays_keep_element_types() {
		assert_eq!(
			encode_query(&[QueryParam::array("custom_items", [1, 2], ArrayStyle::Json)]),
			"custom_items=%5B1%2C2%5D"
		);
		assert_eq!(
			encode_query(&[QueryParam::array("flags", [true, false], ArrayStyle::Json)]),
			"flags=%5Btrue%2Cfalse%5D"
		);
		assert_eq!(
			encode_query(&[QueryParam::array("custom_items", [1, 2], ArrayStyle::CommaJoined)]),
			"custom_items=1,2"
		);
	}

	#[test]
	fn scalars_are_encoded_individually_in_order() {
		let query = encode_query(&[
			QueryParam::new("name", "a&b=c"),
			QueryParam::new("page", 0_u32),
			QueryParam::new("order_by", "due date"),
		]);

		assert_eq!(query, "name=a%26b%3Dc&page=0&order_by=due+date");
	}

	#[test]
	fn json_parameters_carry_arbitrary_payloads() {
		let param = QueryParam::json(
			"custom_fields",
			&serde_json::json!([{ "field_id": "f1", "operator": "=", "value": 3 }]),
		)
		.expect("JSON parameter should encode.");

		assert!(matches!(&param.value, QueryValue::Scalar(value) if value.starts_with("[{")));
	}

	#[test]
	fn components_escape_reserved_bytes() {
		assert_eq!(encode_component("abc-_.~"), "abc-_.~");
		assert_eq!(encode_component("a/b c"), "a%2Fb%20c");
	}
}
