//! The APDU codec: framing per ISO 7816-4 Cases 1–4, and the BER-TLV lookup
//! used to decode PO/SAM response payloads.

// Modules
mod tlv;

// Public Exports
pub use self::tlv::{find_tlv_value, parse_tag_metadata, DataObjectType, TagClass};

/// A fully-built outgoing APDU, paired with the set of status words the
/// caller is prepared to accept as "successful" for this exchange.
///
/// This is the unit the reader boundary transmits; see [`crate::reader`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApduRequest {
	pub bytes: Vec<u8>,
	/// Status words other than `0x9000` that should still be treated as
	/// acceptable by the reader's stop-on-error logic (e.g. `0x6200` for a
	/// postponed counter value).
	pub additional_successful_status_words: Vec<u16>,
}

impl ApduRequest {
	pub fn new(bytes: Vec<u8>) -> Self {
		Self {
			bytes,
			additional_successful_status_words: Vec::new(),
		}
	}

	#[must_use]
	pub fn with_additional_successful_status_word(mut self, sw: u16) -> Self {
		self.additional_successful_status_words.push(sw);
		self
	}
}

/// A single PO/SAM response: the data field plus the two status-word bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApduResponse {
	pub data_out: Vec<u8>,
	pub status_word: u16,
}

impl ApduResponse {
	/// Parses a raw `dataOut‖SW1‖SW2` buffer as returned by a reader.
	///
	/// # Errors
	/// Returns `None` if the buffer is shorter than the two status-word
	/// bytes it must always contain.
	pub fn from_raw(raw: &[u8]) -> Option<Self> {
		if raw.len() < 2 {
			return None;
		}
		let (data_out, sw_bytes) = raw.split_at(raw.len() - 2);
		Some(Self {
			data_out: data_out.to_vec(),
			status_word: u16::from_be_bytes([sw_bytes[0], sw_bytes[1]]),
		})
	}

	pub fn is_success(&self) -> bool {
		self.status_word == 0x9000
	}
}

/// Builds the request bytes for an ISO 7816-4 Case 1–4 APDU.
///
/// - Case 1 (no data, no response expected): `data` and `le` both `None`.
/// - Case 2 (no data, response expected): `data` `None`, `le` `Some`.
/// - Case 3 (data, no response expected): `data` `Some`, `le` `None`.
/// - Case 4 (data, response expected): both `Some`.
///
/// `le = Some(0)` means "256 bytes expected" per the ISO rule, rather than
/// being omitted — the codec never reinterprets a literal `0` as "no
/// response", only `None` means that.
pub fn build(cla: u8, ins: u8, p1: u8, p2: u8, data: Option<&[u8]>, le: Option<u8>) -> Vec<u8> {
	let mut bytes = Vec::with_capacity(5 + data.map_or(0, <[u8]>::len));
	bytes.push(cla);
	bytes.push(ins);
	bytes.push(p1);
	bytes.push(p2);
	if let Some(data) = data {
		#[allow(clippy::cast_possible_truncation)]
		bytes.push(data.len() as u8);
		bytes.extend_from_slice(data);
	}
	if let Some(le) = le {
		bytes.push(le);
	}
	bytes
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn case_1_no_data_no_response() {
		assert_eq!(build(0x00, 0xA4, 0x04, 0x00, None, None), vec![
			0x00, 0xA4, 0x04, 0x00
		]);
	}

	#[test]
	fn case_2_no_data_with_response() {
		assert_eq!(build(0x00, 0xB2, 0x01, 0x3D, None, Some(0x1D)), vec![
			0x00, 0xB2, 0x01, 0x3D, 0x1D
		]);
	}

	#[test]
	fn case_3_data_no_response() {
		assert_eq!(
			build(0x00, 0x32, 0x01, 0xC8, Some(&[0x00, 0x00, 0x80]), None),
			vec![0x00, 0x32, 0x01, 0xC8, 0x03, 0x00, 0x00, 0x80]
		);
	}

	#[test]
	fn case_4_data_and_response_le_zero_means_256() {
		assert_eq!(
			build(0x00, 0x20, 0x00, 0x00, Some(&[0x01, 0x02, 0x03, 0x04]), Some(0x00)),
			vec![0x00, 0x20, 0x00, 0x00, 0x04, 0x01, 0x02, 0x03, 0x04, 0x00]
		);
	}

	#[test]
	fn response_parses_short_data() {
		let response = ApduResponse::from_raw(&[0x01, 0x02, 0x90, 0x00]).unwrap();
		assert_eq!(response.data_out, vec![0x01, 0x02]);
		assert!(response.is_success());
	}

	#[test]
	fn response_too_short_is_none() {
		assert!(ApduResponse::from_raw(&[0x90]).is_none());
	}
}
