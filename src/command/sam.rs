//! SAM (Security Access Module) command builders and parsers.
//!
//! The SAM is a black box reachable only through this APDU surface (spec
//! §1); these builders exist so [`crate::crypto::SymmetricCryptoService`]
//! can issue them without hand-rolling byte layout at every call site.

// Uses
use derivative::Derivative;

use crate::{
	apdu,
	catalog::{self, SamProductType},
	error::{CalypsoError, ErrorKind, Result},
	sam::KeyReference,
	status_word_table,
};

/// A SAM command: typed inputs for [`SamCommand::build_request`], consumed
/// once by [`SamCommand::parse_response`].
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub enum SamCommand {
	SelectDiversifier { card_serial_number: Vec<u8> },
	GetChallenge { extended_mode: bool },
	DigestInit { key: KeyReference, open_session_data_out: Vec<u8>, previous_session_ratified: bool },
	DigestUpdate { data: Vec<u8> },
	DigestUpdateMultiple { requests_and_responses: Vec<Vec<u8>> },
	DigestClose,
	DigestAuthenticate { card_signature: Vec<u8> },
	GiveRandom,
	CardCipherPin {
		card_challenge: Vec<u8>,
		#[derivative(Debug = "ignore")]
		pin: Vec<u8>,
		key: KeyReference,
	},
	CardGenerateKey { key: KeyReference },
	SvPrepareLoad { sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, sv_reload_partial: Vec<u8> },
	SvPrepareDebit { sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, sv_debit_partial: Vec<u8> },
	SvPrepareUndebit { sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, sv_undebit_partial: Vec<u8> },
	SvCheck { card_mac: Vec<u8> },
	PsoComputeSignature { data: Vec<u8> },
	PsoVerifySignature { data: Vec<u8>, signature: Vec<u8> },
	Unlock { unlock_data: Vec<u8> },
	WriteKey { key_data: Vec<u8> },
	ReadCeilings,
	ReadEventCounter,
	ReadKeyParameters { key: KeyReference },
}

/// The structured result of parsing a SAM response.
#[derive(Clone, Debug, Default)]
pub struct SamOutcome {
	pub challenge: Option<Vec<u8>>,
	pub ciphered_pin: Option<Vec<u8>>,
	pub generated_key: Option<Vec<u8>>,
	pub terminal_mac: Option<Vec<u8>>,
	pub sv_serial: Option<[u8; 4]>,
	pub sv_challenge: Option<[u8; 3]>,
	pub sv_transaction_number: Option<[u8; 3]>,
	pub sv_terminal_mac: Option<Vec<u8>>,
	pub signature: Option<Vec<u8>>,
	pub signature_valid: Option<bool>,
	pub ceilings: Option<Vec<u8>>,
	pub key_parameters: Option<Vec<u8>>,
}

status_word_table! {
	const DIGEST_AUTHENTICATE_SW = {
		0x6988 => (ErrorKind::SamSecurityData, "Card signature authentication failed"),
	};
}

status_word_table! {
	const SV_CHECK_SW = {
		0x6988 => (ErrorKind::SamSecurityData, "SV Check failed: card MAC rejected"),
	};
}

status_word_table! {
	const COUNTER_OVERFLOW_SW = {
		0x6A84 => (ErrorKind::SamCounterOverflow, "SAM counter would overflow"),
	};
}

impl SamCommand {
	pub fn name(&self) -> &'static str {
		match self {
			Self::SelectDiversifier { .. } => "Select Diversifier",
			Self::GetChallenge { .. } => "Get Challenge",
			Self::DigestInit { .. } => "Digest Init",
			Self::DigestUpdate { .. } => "Digest Update",
			Self::DigestUpdateMultiple { .. } => "Digest Update Multiple",
			Self::DigestClose => "Digest Close",
			Self::DigestAuthenticate { .. } => "Digest Authenticate",
			Self::GiveRandom => "Give Random",
			Self::CardCipherPin { .. } => "Card Cipher PIN",
			Self::CardGenerateKey { .. } => "Card Generate Key",
			Self::SvPrepareLoad { .. } => "SV Prepare Load",
			Self::SvPrepareDebit { .. } => "SV Prepare Debit",
			Self::SvPrepareUndebit { .. } => "SV Prepare Undebit",
			Self::SvCheck { .. } => "SV Check",
			Self::PsoComputeSignature { .. } => "PSO Compute Signature",
			Self::PsoVerifySignature { .. } => "PSO Verify Signature",
			Self::Unlock { .. } => "Unlock",
			Self::WriteKey { .. } => "Write Key",
			Self::ReadCeilings => "Read Ceilings",
			Self::ReadEventCounter => "Read Event Counter",
			Self::ReadKeyParameters { .. } => "Read Key Parameters",
		}
	}

	pub fn build_request(&self, product_type: SamProductType) -> Vec<u8> {
		let cla = catalog::sam_class_byte(product_type);
		match self {
			Self::SelectDiversifier { card_serial_number } => {
				apdu::build(cla, 0x14, 0x00, 0x00, Some(card_serial_number), None)
			}
			Self::GetChallenge { extended_mode } => {
				let le = if *extended_mode { 0x08 } else { 0x04 };
				apdu::build(cla, 0x84, 0x00, 0x00, None, Some(le))
			}
			Self::DigestInit { key, open_session_data_out, previous_session_ratified } => {
				let p1 = u8::from(!*previous_session_ratified);
				let mut data = vec![key.kif, key.kvc];
				data.extend_from_slice(open_session_data_out);
				apdu::build(cla, 0x8A, p1, 0x00, Some(&data), None)
			}
			Self::DigestUpdate { data } => apdu::build(cla, 0x8C, 0x00, 0x00, Some(data), None),
			Self::DigestUpdateMultiple { requests_and_responses } => {
				let data: Vec<u8> = requests_and_responses.iter().flatten().copied().collect();
				apdu::build(cla, 0x8C, 0x00, 0x00, Some(&data), None)
			}
			Self::DigestClose => apdu::build(cla, 0x8E, 0x00, 0x00, None, Some(0x00)),
			Self::DigestAuthenticate { card_signature } => {
				apdu::build(cla, 0x82, 0x00, 0x00, Some(card_signature), None)
			}
			Self::GiveRandom => apdu::build(cla, 0x86, 0x00, 0x00, None, None),
			Self::CardCipherPin { card_challenge, pin, key } => {
				let mut data = vec![key.kif, key.kvc];
				data.extend_from_slice(card_challenge);
				data.extend_from_slice(pin);
				apdu::build(cla, 0x12, 0x00, 0x00, Some(&data), Some(0x00))
			}
			Self::CardGenerateKey { key } => apdu::build(cla, 0x12, 0x01, 0x00, Some(&[key.kif, key.kvc]), Some(0x00)),
			Self::SvPrepareLoad { sv_get_request, sv_get_response, sv_reload_partial } => {
				let mut data = sv_get_request.clone();
				data.extend_from_slice(sv_get_response);
				data.extend_from_slice(sv_reload_partial);
				apdu::build(cla, 0x56, 0x00, 0x00, Some(&data), Some(0x00))
			}
			Self::SvPrepareDebit { sv_get_request, sv_get_response, sv_debit_partial } => {
				let mut data = sv_get_request.clone();
				data.extend_from_slice(sv_get_response);
				data.extend_from_slice(sv_debit_partial);
				apdu::build(cla, 0x54, 0x00, 0x00, Some(&data), Some(0x00))
			}
			Self::SvPrepareUndebit { sv_get_request, sv_get_response, sv_undebit_partial } => {
				let mut data = sv_get_request.clone();
				data.extend_from_slice(sv_get_response);
				data.extend_from_slice(sv_undebit_partial);
				apdu::build(cla, 0x5C, 0x00, 0x00, Some(&data), Some(0x00))
			}
			Self::SvCheck { card_mac } => apdu::build(cla, 0x58, 0x00, 0x00, Some(card_mac), None),
			Self::PsoComputeSignature { data } => apdu::build(cla, 0x2A, 0x9E, 0x9A, Some(data), Some(0x00)),
			Self::PsoVerifySignature { data, signature } => {
				let mut payload = data.clone();
				payload.extend_from_slice(signature);
				apdu::build(cla, 0x2A, 0x00, 0xA8, Some(&payload), None)
			}
			Self::Unlock { unlock_data } => apdu::build(cla, 0x20, 0x00, 0x00, Some(unlock_data), None),
			Self::WriteKey { key_data } => apdu::build(cla, 0x1A, 0x00, 0x00, Some(key_data), None),
			Self::ReadCeilings => apdu::build(cla, 0xBE, 0x00, 0x00, None, Some(0x00)),
			Self::ReadEventCounter => apdu::build(cla, 0xBE, 0x01, 0x00, None, Some(0x00)),
			Self::ReadKeyParameters { key } => {
				apdu::build(cla, 0xBC, key.kif, key.kvc, None, Some(0x00))
			}
		}
	}

	fn status_word_table(&self) -> &'static [(u16, ErrorKind, &'static str)] {
		match self {
			Self::DigestAuthenticate { .. } => DIGEST_AUTHENTICATE_SW,
			Self::SvCheck { .. } => SV_CHECK_SW,
			Self::SvPrepareLoad { .. } | Self::SvPrepareDebit { .. } | Self::SvPrepareUndebit { .. } => COUNTER_OVERFLOW_SW,
			_ => &[],
		}
	}

	pub fn parse_response(&self, response: &apdu::ApduResponse) -> Result<SamOutcome> {
		let table = self.status_word_table();
		if let catalog::StatusOutcome::Failure(err) = catalog::lookup_sam_status_word(self.name(), table, response.status_word) {
			return Err(err);
		}
		self.apply(response)
	}

	fn apply(&self, response: &apdu::ApduResponse) -> Result<SamOutcome> {
		let mut outcome = SamOutcome::default();
		let data = &response.data_out;
		match self {
			Self::GetChallenge { .. } | Self::GiveRandom => outcome.challenge = Some(data.clone()),
			Self::CardCipherPin { .. } => outcome.ciphered_pin = Some(data.clone()),
			Self::CardGenerateKey { .. } => outcome.generated_key = Some(data.clone()),
			Self::DigestClose => outcome.terminal_mac = Some(data.clone()),
			Self::DigestAuthenticate { .. } => outcome.signature_valid = Some(true),
			Self::SvPrepareLoad { .. } | Self::SvPrepareDebit { .. } | Self::SvPrepareUndebit { .. } => {
				if data.len() < 14 {
					return Err(CalypsoError::new(
						ErrorKind::UnexpectedResponseLength,
						"SV Prepare response too short",
						self.name(),
						Some(response.status_word),
					));
				}
				outcome.sv_serial = Some(data[0..4].try_into().expect("checked length"));
				outcome.sv_challenge = Some(data[4..7].try_into().expect("checked length"));
				outcome.sv_transaction_number = Some(data[7..10].try_into().expect("checked length"));
				outcome.sv_terminal_mac = Some(data[10..].to_vec());
			}
			Self::PsoComputeSignature { .. } => outcome.signature = Some(data.clone()),
			Self::PsoVerifySignature { .. } => outcome.signature_valid = Some(true),
			Self::ReadCeilings => outcome.ceilings = Some(data.clone()),
			Self::ReadKeyParameters { .. } => outcome.key_parameters = Some(data.clone()),
			_ => {}
		}
		Ok(outcome)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn get_challenge_le_follows_extended_mode() {
		let short = SamCommand::GetChallenge { extended_mode: false };
		assert_eq!(short.build_request(SamProductType::SamC1).last(), Some(&0x04));
		let long = SamCommand::GetChallenge { extended_mode: true };
		assert_eq!(long.build_request(SamProductType::SamC1).last(), Some(&0x08));
	}

	#[test]
	fn give_random_is_a_distinct_catalog_entry() {
		let cmd = SamCommand::GiveRandom;
		assert_eq!(cmd.build_request(SamProductType::SamS1Dx)[0], 0x80);
		assert_eq!(cmd.build_request(SamProductType::SamS1Dx)[1], 0x86);
	}

	#[test]
	fn sv_prepare_parses_serial_challenge_tnum_mac() {
		let cmd = SamCommand::SvPrepareDebit {
			sv_get_request: vec![],
			sv_get_response: vec![],
			sv_debit_partial: vec![],
		};
		let mut data = vec![0xAA, 0xAA, 0xAA, 0xAA];
		data.extend_from_slice(&[0xBB, 0xBB, 0xBB]);
		data.extend_from_slice(&[0x00, 0x00, 0x01]);
		data.extend_from_slice(&[0xCC; 5]);
		let response = apdu::ApduResponse { data_out: data, status_word: 0x9000 };
		let outcome = cmd.parse_response(&response).unwrap();
		assert_eq!(outcome.sv_serial, Some([0xAA; 4]));
		assert_eq!(outcome.sv_transaction_number, Some([0x00, 0x00, 0x01]));
		assert_eq!(outcome.sv_terminal_mac, Some(vec![0xCC; 5]));
	}

	#[test]
	fn card_cipher_pin_frames_kif_kvc_challenge_pin_scenario_5() {
		let cmd = SamCommand::CardCipherPin {
			card_challenge: vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11],
			pin: vec![0x31, 0x32, 0x33, 0x34],
			key: KeyReference::new(0x30, 0x79),
		};
		let request = cmd.build_request(SamProductType::SamS1Dx);
		assert_eq!(&request[5..7], &[0x30, 0x79]);
		assert_eq!(&request[7..15], &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11]);
		assert_eq!(&request[15..19], &[0x31, 0x32, 0x33, 0x34]);
	}

	#[test]
	fn digest_authenticate_failure_maps_to_security_data() {
		let cmd = SamCommand::DigestAuthenticate { card_signature: vec![0; 4] };
		let response = apdu::ApduResponse { data_out: vec![], status_word: 0x6988 };
		match cmd.parse_response(&response) {
			Err(e) => assert_eq!(e.kind, ErrorKind::SamSecurityData),
			Ok(_) => panic!("expected failure"),
		}
	}
}
