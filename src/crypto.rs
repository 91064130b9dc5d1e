//! The SAM façade: a trait boundary for transmitting SAM commands, plus a
//! concrete service that wraps it in the typed high-level operations
//! `TransactionManager` needs (digest dialogue, PIN ciphering, SV prepare/
//! check). The SAM's internal cryptography is a black box reachable only
//! through this APDU surface (spec §1).

// Uses
use crate::{
	apdu::ApduResponse,
	command::sam::{SamCommand, SamOutcome},
	error::{CalypsoError, ErrorKind, Result},
	sam::{CalypsoSam, KeyReference},
};

/// The transport boundary to one SAM, mirroring [`crate::reader::CardTransceiver`].
///
/// A host implements this over its actual SAM reader; this crate only
/// issues typed requests through it.
pub trait SamTransceiver {
	type Error: std::error::Error + Send + Sync + 'static;

	fn transmit(&mut self, request_bytes: Vec<u8>) -> std::result::Result<ApduResponse, Self::Error>;
}

/// A typed façade over one SAM: every method builds the matching
/// [`SamCommand`], transmits it through `T`, and parses the result — callers
/// never build SAM APDUs by hand.
pub struct SymmetricCryptoService<T: SamTransceiver> {
	transceiver: T,
	sam: CalypsoSam,
}

impl<T: SamTransceiver> SymmetricCryptoService<T> {
	pub fn new(transceiver: T, sam: CalypsoSam) -> Self {
		Self { transceiver, sam }
	}

	fn run(&mut self, command: SamCommand) -> Result<SamOutcome> {
		let request_bytes = command.build_request(self.sam.product_type);
		let response = self
			.transceiver
			.transmit(request_bytes)
			.map_err(|e| CalypsoError::new(ErrorKind::CryptoServiceUnavailable, e.to_string(), command.name(), None))?;
		command.parse_response(&response)
	}

	pub fn select_diversifier(&mut self, card_serial_number: Vec<u8>) -> Result<()> {
		self.run(SamCommand::SelectDiversifier { card_serial_number }).map(|_| ())
	}

	pub fn get_challenge(&mut self, extended_mode: bool) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::GetChallenge { extended_mode })?;
		Ok(outcome.challenge.unwrap_or_default())
	}

	pub fn give_random(&mut self) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::GiveRandom)?;
		Ok(outcome.challenge.unwrap_or_default())
	}

	/// Opens the digest dialogue for a newly-opened secure session (spec
	/// §4.5's open flow step 4).
	pub fn digest_init(&mut self, key: KeyReference, open_session_data_out: Vec<u8>, previous_session_ratified: bool) -> Result<()> {
		self.run(SamCommand::DigestInit { key, open_session_data_out, previous_session_ratified }).map(|_| ())
	}

	pub fn digest_update(&mut self, data: Vec<u8>) -> Result<()> {
		self.run(SamCommand::DigestUpdate { data }).map(|_| ())
	}

	pub fn digest_update_multiple(&mut self, requests_and_responses: Vec<Vec<u8>>) -> Result<()> {
		self.run(SamCommand::DigestUpdateMultiple { requests_and_responses }).map(|_| ())
	}

	/// Closes the digest dialogue, returning the terminal half-MAC to place
	/// in the `Close Secure Session` request.
	pub fn digest_close(&mut self) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::DigestClose)?;
		Ok(outcome.terminal_mac.unwrap_or_default())
	}

	/// Authenticates the card's signature from `Close Secure Session`'s
	/// response against the running digest.
	pub fn digest_authenticate(&mut self, card_signature: Vec<u8>) -> Result<bool> {
		let outcome = self.run(SamCommand::DigestAuthenticate { card_signature })?;
		Ok(outcome.signature_valid.unwrap_or(false))
	}

	pub fn card_cipher_pin(&mut self, card_challenge: Vec<u8>, pin: Vec<u8>, key: KeyReference) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::CardCipherPin { card_challenge, pin, key })?;
		Ok(outcome.ciphered_pin.unwrap_or_default())
	}

	pub fn card_generate_key(&mut self, key: KeyReference) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::CardGenerateKey { key })?;
		Ok(outcome.generated_key.unwrap_or_default())
	}

	/// Resolves one `SV Prepare*` step: feeds the SAM the `SV Get` request/
	/// response and the partially-built SV operation APDU, returning the
	/// `(serial, challenge, transaction number, terminal MAC)` tuple the
	/// caller splices into the final PO request (spec §4.5).
	pub fn sv_prepare_load(&mut self, sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, sv_reload_partial: Vec<u8>) -> Result<SvPrepareOutput> {
		SvPrepareOutput::try_from(self.run(SamCommand::SvPrepareLoad { sv_get_request, sv_get_response, sv_reload_partial })?)
	}

	pub fn sv_prepare_debit(&mut self, sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, sv_debit_partial: Vec<u8>) -> Result<SvPrepareOutput> {
		SvPrepareOutput::try_from(self.run(SamCommand::SvPrepareDebit { sv_get_request, sv_get_response, sv_debit_partial })?)
	}

	pub fn sv_prepare_undebit(&mut self, sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, sv_undebit_partial: Vec<u8>) -> Result<SvPrepareOutput> {
		SvPrepareOutput::try_from(self.run(SamCommand::SvPrepareUndebit { sv_get_request, sv_get_response, sv_undebit_partial })?)
	}

	pub fn sv_check(&mut self, card_mac: Vec<u8>) -> Result<()> {
		self.run(SamCommand::SvCheck { card_mac }).map(|_| ())
	}

	pub fn pso_compute_signature(&mut self, data: Vec<u8>) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::PsoComputeSignature { data })?;
		Ok(outcome.signature.unwrap_or_default())
	}

	pub fn pso_verify_signature(&mut self, data: Vec<u8>, signature: Vec<u8>) -> Result<bool> {
		let outcome = self.run(SamCommand::PsoVerifySignature { data, signature })?;
		Ok(outcome.signature_valid.unwrap_or(false))
	}

	pub fn unlock(&mut self, unlock_data: Vec<u8>) -> Result<()> {
		self.run(SamCommand::Unlock { unlock_data }).map(|_| ())
	}

	pub fn write_key(&mut self, key_data: Vec<u8>) -> Result<()> {
		self.run(SamCommand::WriteKey { key_data }).map(|_| ())
	}

	pub fn read_ceilings(&mut self) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::ReadCeilings)?;
		Ok(outcome.ceilings.unwrap_or_default())
	}

	pub fn read_event_counter(&mut self) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::ReadEventCounter)?;
		Ok(outcome.ceilings.unwrap_or_default())
	}

	pub fn read_key_parameters(&mut self, key: KeyReference) -> Result<Vec<u8>> {
		let outcome = self.run(SamCommand::ReadKeyParameters { key })?;
		Ok(outcome.key_parameters.unwrap_or_default())
	}
}

/// The `(serial, challenge, transaction number, terminal MAC)` tuple an `SV
/// Prepare*` command returns, ready to splice into an SV operation APDU.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SvPrepareOutput {
	pub serial: [u8; 4],
	pub challenge: [u8; 3],
	pub transaction_number: [u8; 3],
	pub terminal_mac: Vec<u8>,
}

impl TryFrom<SamOutcome> for SvPrepareOutput {
	type Error = CalypsoError;

	fn try_from(outcome: SamOutcome) -> Result<Self> {
		Ok(Self {
			serial: outcome
				.sv_serial
				.ok_or_else(|| CalypsoError::engine(ErrorKind::CardAnomaly, "SV Prepare response missing serial"))?,
			challenge: outcome
				.sv_challenge
				.ok_or_else(|| CalypsoError::engine(ErrorKind::CardAnomaly, "SV Prepare response missing challenge"))?,
			transaction_number: outcome
				.sv_transaction_number
				.ok_or_else(|| CalypsoError::engine(ErrorKind::CardAnomaly, "SV Prepare response missing transaction number"))?,
			terminal_mac: outcome
				.sv_terminal_mac
				.ok_or_else(|| CalypsoError::engine(ErrorKind::CardAnomaly, "SV Prepare response missing terminal MAC"))?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::SamProductType;

	struct FakeTransceiver {
		next_status_word: u16,
	}

	impl SamTransceiver for FakeTransceiver {
		type Error = std::convert::Infallible;

		fn transmit(&mut self, _request_bytes: Vec<u8>) -> std::result::Result<ApduResponse, Self::Error> {
			Ok(ApduResponse { data_out: vec![0xAA; 8], status_word: self.next_status_word })
		}
	}

	#[test]
	fn get_challenge_round_trips_through_fake_transceiver() {
		let mut service = SymmetricCryptoService::new(
			FakeTransceiver { next_status_word: 0x9000 },
			CalypsoSam::new(SamProductType::SamC1, [1, 2, 3, 4]),
		);
		assert_eq!(service.get_challenge(true).unwrap(), vec![0xAA; 8]);
	}

	#[test]
	fn digest_authenticate_failure_propagates() {
		let mut service = SymmetricCryptoService::new(
			FakeTransceiver { next_status_word: 0x6988 },
			CalypsoSam::new(SamProductType::SamC1, [1, 2, 3, 4]),
		);
		assert!(service.digest_authenticate(vec![0; 4]).is_err());
	}
}
