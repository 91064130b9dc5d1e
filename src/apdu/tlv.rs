//! A minimal BER-TLV reader, per ISO 7816-4 Annex D / EMV Book 3 Annex B.
//!
//! This crate only needs to recognise 1- and 2-byte tags and hand back the
//! matching value slice — full constructed-tag recursion and the EMV tag
//! dictionary are out of scope (see spec §1); this is the "assumed
//! available" primitive the higher layers build on.

// Uses
use crate::error::{CalypsoError, ErrorKind};

/// The class of a BER-TLV tag, from the top two bits of its first byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TagClass {
	Universal,
	Application,
	ContextSpecific,
	Private,
}

impl From<u8> for TagClass {
	fn from(top_bits: u8) -> Self {
		match top_bits & 0b11 {
			0b00 => Self::Universal,
			0b01 => Self::Application,
			0b10 => Self::ContextSpecific,
			_ => Self::Private,
		}
	}
}

/// Whether a BER-TLV tag is primitive (holds a value directly) or
/// constructed (holds nested tags).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DataObjectType {
	Primitive,
	Constructed,
}

/// Parses the class and constructed bit out of a tag's leading byte.
pub fn parse_tag_metadata(tag_byte_0: u8) -> (TagClass, DataObjectType) {
	let class = TagClass::from(tag_byte_0 >> 6);
	let data_object_type = if tag_byte_0 & 0b0010_0000 != 0 {
		DataObjectType::Constructed
	} else {
		DataObjectType::Primitive
	};
	(class, data_object_type)
}

/// Reads the tag id (1 or 2 bytes — this crate never encounters the
/// multi-byte subsequent-tag-octet form in Calypso `GET DATA` responses) and
/// length-prefixed value starting at `bytes[0]`, returning the value slice
/// and the number of bytes consumed.
fn read_one_tlv(bytes: &[u8]) -> Result<(&[u8], &[u8], usize), CalypsoError> {
	if bytes.is_empty() {
		return Err(CalypsoError::engine(ErrorKind::CardAnomaly, "empty TLV input"));
	}
	let tag_continues = bytes[0] & 0b0001_1111 == 0b0001_1111;
	let tag_len = if tag_continues { 2 } else { 1 };
	if bytes.len() <= tag_len {
		return Err(CalypsoError::engine(
			ErrorKind::CardAnomaly,
			"truncated TLV tag",
		));
	}
	let tag = &bytes[..tag_len];

	let length_byte_0 = bytes[tag_len];
	let (length, length_field_len) = if length_byte_0 & 0b1000_0000 != 0 {
		let subsequent = usize::from(length_byte_0 & 0b0111_1111);
		if subsequent > 4 || bytes.len() < tag_len + 1 + subsequent {
			return Err(CalypsoError::engine(
				ErrorKind::CardAnomaly,
				"unsupported or truncated TLV length",
			));
		}
		let mut len = 0usize;
		for &b in &bytes[tag_len + 1..tag_len + 1 + subsequent] {
			len = (len << 8) | usize::from(b);
		}
		(len, 1 + subsequent)
	} else {
		(usize::from(length_byte_0), 1)
	};

	let value_start = tag_len + length_field_len;
	if bytes.len() < value_start + length {
		return Err(CalypsoError::engine(
			ErrorKind::CardAnomaly,
			"TLV value runs past end of buffer",
		));
	}
	let value = &bytes[value_start..value_start + length];
	Ok((tag, value, value_start + length))
}

/// Scans a flat (non-nested) BER-TLV block looking for `tag`, returning its
/// value slice if present. Used to pull a specific tag (e.g. the EF list, or
/// the card public key) out of a `GET DATA`/`SELECT` response.
pub fn find_tlv_value<'a>(tag: &[u8], bytes: &'a [u8]) -> Result<Option<&'a [u8]>, CalypsoError> {
	let mut offset = 0;
	while offset < bytes.len() {
		let (found_tag, value, consumed) = read_one_tlv(&bytes[offset..])?;
		if found_tag == tag {
			return Ok(Some(value));
		}
		offset += consumed;
	}
	Ok(None)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn finds_single_byte_tag() {
		let data = [0x6F, 0x03, 0xAA, 0xBB, 0xCC];
		assert_eq!(
			find_tlv_value(&[0x6F], &data).unwrap(),
			Some([0xAA, 0xBB, 0xCC].as_slice())
		);
	}

	#[test]
	fn finds_second_of_two_tags() {
		let data = [0x9F, 0x38, 0x02, 0x11, 0x22, 0x5F, 0x2A, 0x02, 0x09, 0x78];
		assert_eq!(
			find_tlv_value(&[0x5F, 0x2A], &data).unwrap(),
			Some([0x09, 0x78].as_slice())
		);
	}

	#[test]
	fn missing_tag_is_none() {
		let data = [0x6F, 0x01, 0xAA];
		assert_eq!(find_tlv_value(&[0x70], &data).unwrap(), None);
	}

	#[test]
	fn tag_class_and_object_type() {
		let (class, object_type) = parse_tag_metadata(0x6F);
		assert_eq!(class, TagClass::Application);
		assert_eq!(object_type, DataObjectType::Constructed);

		let (class, object_type) = parse_tag_metadata(0x9F);
		assert_eq!(class, TagClass::ContextSpecific);
		assert_eq!(object_type, DataObjectType::Primitive);
	}
}
