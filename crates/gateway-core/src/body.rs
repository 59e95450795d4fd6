//! Stream-flag detection (§4.8 step 3, P7): inspects only the top-level
//! `stream` field of the request body without caring about the rest of its
//! shape.

use gateway_types::error::Error;

/// Returns `true` iff the parsed JSON body is an object whose `stream`
/// field exists with boolean-type value `true`. Any non-object, non-boolean
/// value, or absent field yields `false`. Invalid JSON is an error.
pub fn detect_stream(body: &[u8]) -> Result<bool, Error> {
	let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| Error::InvalidJsonBody)?;
	Ok(value.as_object().and_then(|obj| obj.get("stream")).and_then(serde_json::Value::as_bool).unwrap_or(false))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn true_when_stream_field_is_true() {
		assert!(detect_stream(br#"{"model":"x","stream":true}"#).unwrap());
	}

	#[test]
	fn false_when_stream_field_is_false() {
		assert!(!detect_stream(br#"{"model":"x","stream":false}"#).unwrap());
	}

	#[test]
	fn false_when_stream_field_absent() {
		assert!(!detect_stream(br#"{"model":"x"}"#).unwrap());
	}

	#[test]
	fn false_when_stream_field_is_non_boolean() {
		assert!(!detect_stream(br#"{"model":"x","stream":"true"}"#).unwrap());
		assert!(!detect_stream(br#"{"model":"x","stream":1}"#).unwrap());
	}

	#[test]
	fn false_when_body_is_not_an_object() {
		assert!(!detect_stream(br#"[1,2,3]"#).unwrap());
		assert!(!detect_stream(br#""hello""#).unwrap());
	}

	#[test]
	fn errors_on_invalid_json() {
		assert!(matches!(detect_stream(b"not json"), Err(Error::InvalidJsonBody)));
	}

	proptest::proptest! {
		#[test]
		fn prop_non_object_json_is_never_streaming(n in proptest::num::f64::NORMAL) {
			let body = serde_json::to_vec(&n).unwrap();
			proptest::prop_assert!(!detect_stream(&body).unwrap());
		}
	}
}

// vim: ts=4
