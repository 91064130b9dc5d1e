//! Byte-level utility functions shared by the APDU codec and the command
//! builders/parsers.

// Constants
pub const BYTES_PER_24_BITS: usize = 3;
pub const BYTES_PER_32_BITS: usize = 4;

/// Packs a big-endian byte slice of length `1..=4` into a `u32`, left-padding
/// with zero bytes as if the slice were right-aligned in a 4-byte buffer.
pub fn byte_slice_to_u32(bytes: &[u8]) -> u32 {
	let mut buf = [0u8; BYTES_PER_32_BITS];
	let start = BYTES_PER_32_BITS - bytes.len();
	buf[start..].copy_from_slice(bytes);
	u32::from_be_bytes(buf)
}

/// Encodes a `u32` (expected to fit in 24 bits) as a big-endian 3-byte
/// buffer, as used by Increase/Decrease and SV amount/counter fields.
///
/// # Panics
/// Panics if `value` doesn't fit in 24 bits; callers are expected to have
/// range-checked the value already (the card-facing range is `0..=0xFF_FFFF`
/// and is validated by the command builders before this is called).
pub fn u32_to_3_bytes(value: u32) -> [u8; BYTES_PER_24_BITS] {
	assert!(value <= 0x00FF_FFFF, "value does not fit in 24 bits");
	let full = value.to_be_bytes();
	[full[1], full[2], full[3]]
}

/// Packs a big-endian 3-byte buffer into a `u32`.
pub fn bytes_3_to_u32(bytes: &[u8; BYTES_PER_24_BITS]) -> u32 {
	byte_slice_to_u32(bytes.as_slice())
}

/// Interprets a 3-byte buffer as a signed 24-bit integer (used for the SV
/// balance, which can go negative when the negative-balance toggle is set).
pub fn bytes_3_to_i32(bytes: &[u8; BYTES_PER_24_BITS]) -> i32 {
	let unsigned = bytes_3_to_u32(bytes) as i32;
	if bytes[0] & 0b1000_0000 != 0 {
		unsigned - 0x0100_0000
	} else {
		unsigned
	}
}

/// Encodes a signed 24-bit integer as a big-endian 3-byte buffer.
///
/// # Panics
/// Panics if `value` doesn't fit in a signed 24-bit range.
pub fn i32_to_3_bytes(value: i32) -> [u8; BYTES_PER_24_BITS] {
	assert!(
		(-0x0080_0000..=0x007F_FFFF).contains(&value),
		"value does not fit in a signed 24-bit integer"
	);
	let full = (value & 0x00FF_FFFF).to_be_bytes();
	[full[1], full[2], full[3]]
}

/// Renders a byte slice as a contiguous uppercase hex string, for inclusion
/// in log lines and error messages.
pub fn to_hex_string(bytes: &[u8]) -> String {
	bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn byte_slice_to_u32_left_pads() {
		assert_eq!(byte_slice_to_u32(&[0x01]), 0x0000_0001);
		assert_eq!(byte_slice_to_u32(&[0x01, 0x02]), 0x0000_0102);
		assert_eq!(byte_slice_to_u32(&[0x01, 0x02, 0x03, 0x04]), 0x0102_0304);
	}

	#[test]
	fn roundtrip_3_byte_unsigned() {
		let bytes = u32_to_3_bytes(0x00_80_00);
		assert_eq!(bytes, [0x00, 0x80, 0x00]);
		assert_eq!(bytes_3_to_u32(&bytes), 0x00_80_00);
	}

	#[test]
	fn roundtrip_3_byte_signed_negative() {
		let bytes = i32_to_3_bytes(-100);
		assert_eq!(bytes_3_to_i32(&bytes), -100);
	}

	#[test]
	fn hex_string_formatting() {
		assert_eq!(to_hex_string(&[0x00, 0xAB, 0xFF]), "00ABFF");
	}
}
