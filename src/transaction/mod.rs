//! `TransactionManager`: the secure-session orchestrator (spec §4.5) —
//! exclusively owns the [`CommandManager`] and [`SessionContext`], drives
//! the PO via a [`CardTransceiver`], and the SAM via a
//! [`SymmetricCryptoService`].

// Uses
use log::{debug, trace, warn};

use crate::{
	apdu::{ApduRequest, ApduResponse},
	card::CalypsoCard,
	catalog::{SvOperation, WriteAccessLevel},
	command::po::{PoCommand, PoOutcome},
	crypto::{SamTransceiver, SvPrepareOutput, SymmetricCryptoService},
	error::{CalypsoError, ErrorKind, Result},
	reader::{CardRequest, CardTransceiver},
	sam::{CalypsoSam, KeyReference, SecuritySetting},
	session::{CommandManager, SessionContext},
};

/// The outcome of one `Verify PIN` call: either accepted, or rejected with
/// the number of attempts remaining (spec §4.5's PIN flow).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinOutcome {
	Verified,
	Rejected { attempts_remaining: u8 },
	Blocked,
}

/// Drives one secure-session transaction against one `CalypsoCard`.
///
/// Not `Sync`; intended for single-threaded cooperative use per spec §5 —
/// every method here runs to completion on the caller's thread, suspending
/// only at the `C::transmit`/`S::transmit` reader-boundary calls.
pub struct TransactionManager<C: CardTransceiver, S: SamTransceiver> {
	card: CalypsoCard,
	sam: CalypsoSam,
	security_setting: SecuritySetting,
	crypto: SymmetricCryptoService<S>,
	reader: C,
	command_manager: CommandManager,
	session: SessionContext,
	cached_sam_challenge: Option<Vec<u8>>,
}

impl<C: CardTransceiver, S: SamTransceiver> TransactionManager<C, S> {
	pub fn new(
		card: CalypsoCard,
		sam: CalypsoSam,
		security_setting: SecuritySetting,
		crypto: SymmetricCryptoService<S>,
		reader: C,
	) -> Self {
		Self {
			card,
			sam,
			security_setting,
			crypto,
			reader,
			command_manager: CommandManager::new(),
			session: SessionContext::new(0),
			cached_sam_challenge: None,
		}
	}

	pub fn card(&self) -> &CalypsoCard {
		&self.card
	}

	pub fn is_session_open(&self) -> bool {
		self.session.is_open()
	}

	/// Queues a command for the next processing batch. Rejects commands
	/// that are forbidden while a secure session is open (spec §4.5).
	pub fn prepare(&mut self, command: PoCommand) -> Result<()> {
		if self.session.is_open() && command.forbidden_in_session() {
			return Err(CalypsoError::engine(
				ErrorKind::SessionAlreadyOpen,
				format!("{} cannot be scheduled while a secure session is open", command.name()),
			));
		}
		self.command_manager.prepare(command)
	}

	fn transceive(&mut self, requests: Vec<Vec<u8>>) -> Result<Vec<ApduResponse>> {
		let apdu_requests = requests.into_iter().map(ApduRequest::new).collect();
		let card_request = CardRequest::new(apdu_requests, true);
		let expected = card_request.apdu_requests.len();
		let response = self
			.reader
			.transmit(card_request)
			.map_err(|e| CalypsoError::engine(ErrorKind::CryptoServiceUnavailable, e.to_string()))?;
		if response.apdu_responses.len() != expected {
			return Err(CalypsoError::engine(
				ErrorKind::DesynchronizedExchanges,
				format!("sent {expected} requests, reader returned {} responses", response.apdu_responses.len()),
			));
		}
		Ok(response.apdu_responses)
	}

	/// Pre-computes the terminal half-MAC spliced into the `Open Secure
	/// Session` request itself when early mutual authentication is enabled
	/// (spec §4.5): the SAM digests the about-to-be-sent request bytes
	/// under the access level's default key — the card's own KIF/KVC isn't
	/// known yet, so this is a standalone digest dialogue, separate from
	/// the running session digest `process_opening` initialises once the
	/// open response comes back.
	fn compute_early_mutual_authentication_mac(&mut self, access_level: WriteAccessLevel, open_command: &PoCommand) -> Result<Vec<u8>> {
		let key = self.security_setting.default_key_for(access_level).ok_or_else(|| {
			CalypsoError::engine(
				ErrorKind::CryptoServiceUnavailable,
				"early mutual authentication requires a default key for this access level",
			)
		})?;
		let request_bytes = open_command.build_request(&self.card)?;
		self.crypto.digest_init(key, Vec::new(), false)?;
		self.crypto.digest_update(request_bytes)?;
		self.crypto.digest_close()
	}

	/// The open flow (spec §4.5): obtains a SAM challenge if none is cached,
	/// builds `Open Secure Session` fused with whatever commands were
	/// already queued via [`Self::prepare`] (the pre-open batch), transmits,
	/// and initialises the SAM digest dialogue with every request/response
	/// pair observed along the way.
	pub fn process_opening(
		&mut self,
		access_level: WriteAccessLevel,
		sfi: u8,
		record_number: u8,
	) -> Result<PoOutcome> {
		if self.session.is_open() {
			return Err(CalypsoError::engine(ErrorKind::SessionAlreadyOpen, "a secure session is already open"));
		}

		let sam_challenge = match self.cached_sam_challenge.take() {
			Some(challenge) => challenge,
			None => self.crypto.get_challenge(self.security_setting.extended_mode_supported)?,
		};

		let mut open_command = PoCommand::OpenSecureSession {
			access_level,
			sfi,
			record_number,
			product_type: self.card.product_type,
			sam_challenge,
			terminal_mac: None,
		};

		if self.security_setting.early_mutual_authentication && self.security_setting.extended_mode_supported {
			let terminal_mac = self.compute_early_mutual_authentication_mac(access_level, &open_command)?;
			if let PoCommand::OpenSecureSession { terminal_mac: mac_slot, .. } = &mut open_command {
				*mac_slot = Some(terminal_mac);
			}
		}

		let mut batch = vec![open_command];
		batch.extend(self.command_manager.commands().iter().cloned());

		let request_bytes: Vec<Vec<u8>> = batch.iter().map(|cmd| cmd.build_request(&self.card)).collect::<Result<_>>()?;
		trace!("open flow transmitting {} APDUs", request_bytes.len());
		let responses = self.transceive(request_bytes.clone())?;

		let mut open_outcome = PoOutcome::default();
		for (index, (command, response)) in batch.iter().zip(responses.iter()).enumerate() {
			let outcome = command.parse_response(response, &mut self.card)?;
			if index == 0 {
				open_outcome = outcome;
				self.session.open_session(access_level);
				let kvc = open_outcome.kvc.unwrap_or(0);
				let kif = self.security_setting.resolve_kif(access_level, open_outcome.kif.unwrap_or(0xFF), kvc);
				let key = KeyReference::new(kif, kvc);
				self.crypto.digest_init(
					key,
					response.data_out.clone(),
					open_outcome.previous_session_ratified.unwrap_or(false),
				)?;
			} else {
				self.feed_digest(&request_bytes[index], response)?;
			}
			if command.uses_session_buffer() {
				self.session.reserve_buffer_bytes(request_bytes[index].len())?;
			}
		}

		self.command_manager.notify_commands_processed();
		debug!("secure session opened at access level {access_level:?}");
		Ok(open_outcome)
	}

	/// Processes a batch of already-prepared commands while a session is
	/// open (spec §4.5's "Processing batch").
	pub fn process_po_commands(&mut self) -> Result<Vec<PoOutcome>> {
		if !self.session.is_open() {
			return Err(CalypsoError::engine(ErrorKind::SessionNotOpen, "no secure session is open"));
		}
		let batch: Vec<PoCommand> = self.command_manager.commands().to_vec();
		let request_bytes: Vec<Vec<u8>> = match batch.iter().map(|cmd| cmd.build_request(&self.card)).collect::<Result<_>>() {
			Ok(request_bytes) => request_bytes,
			Err(err) => return Err(self.abort_on_failure(err)),
		};
		let responses = match self.transceive(request_bytes.clone()) {
			Ok(responses) => responses,
			Err(err) => return Err(self.abort_on_failure(err)),
		};

		let mut outcomes = Vec::with_capacity(batch.len());
		for (command, (request, response)) in batch.iter().zip(request_bytes.iter().zip(responses.iter())) {
			let outcome = match command.parse_response(response, &mut self.card) {
				Ok(outcome) => outcome,
				Err(err) => return Err(self.abort_on_failure(err)),
			};
			if let Err(err) = self.feed_digest(request, response) {
				return Err(self.abort_on_failure(err));
			}
			if command.uses_session_buffer() {
				if let Err(err) = self.session.reserve_buffer_bytes(request.len()) {
					return Err(self.abort_on_failure(err));
				}
			}
			if matches!(command, PoCommand::SvReload { .. } | PoCommand::SvDebit { .. } | PoCommand::SvUndebit { .. }) {
				if let Err(err) = self.sv_check(response) {
					return Err(self.abort_on_failure(err));
				}
			}
			outcomes.push(outcome);
		}
		self.command_manager.notify_commands_processed();
		Ok(outcomes)
	}

	fn feed_digest(&mut self, request: &[u8], response: &ApduResponse) -> Result<()> {
		let mut response_bytes = response.data_out.clone();
		response_bytes.extend_from_slice(&response.status_word.to_be_bytes());
		self.crypto.digest_update(request.to_vec())?;
		self.crypto.digest_update(response_bytes)
	}

	fn sv_check(&mut self, last_response: &ApduResponse) -> Result<()> {
		let mut card_mac = last_response.data_out.clone();
		card_mac.extend_from_slice(&last_response.status_word.to_be_bytes());
		self.crypto.sv_check(card_mac)
	}

	/// The close flow (spec §4.5): closes the SAM digest, transmits `Close
	/// Secure Session`, and authenticates the card's signature. A failed
	/// authentication is fatal for the transaction but still leaves the
	/// manager in `IDLE`.
	pub fn process_closing(&mut self, ratification_requested: bool) -> Result<()> {
		if !self.session.is_open() {
			return Err(CalypsoError::engine(ErrorKind::SessionNotOpen, "no secure session is open"));
		}
		let terminal_mac = self.crypto.digest_close()?;
		let close_command = PoCommand::CloseSecureSession { ratification_requested, terminal_mac };
		let request_bytes = close_command.build_request(&self.card)?;
		let responses = match self.transceive(vec![request_bytes]) {
			Ok(responses) => responses,
			Err(err) => {
				self.session.close();
				return Err(err);
			}
		};
		let outcome = match close_command.parse_response(&responses[0], &mut self.card) {
			Ok(outcome) => outcome,
			Err(err) => {
				self.session.close();
				return Err(err);
			}
		};
		let card_signature = outcome.card_signature.unwrap_or_default();
		let authenticated = self.crypto.digest_authenticate(card_signature)?;
		self.session.close();
		if !authenticated {
			return Err(CalypsoError::engine(
				ErrorKind::SamSecurityData,
				"card signature did not authenticate against the terminal digest",
			));
		}
		debug!("secure session closed and authenticated");
		Ok(())
	}

	/// Cancels the open session unconditionally — always safe to call, a
	/// no-op if no session is open (spec §4.5/§5).
	pub fn process_cancel(&mut self) -> Result<()> {
		if !self.session.is_open() {
			return Ok(());
		}
		let abort = PoCommand::CloseSecureSessionAbort;
		if let Ok(request_bytes) = abort.build_request(&self.card) {
			let _ = self.transceive(vec![request_bytes]);
		}
		self.session.close();
		self.command_manager.notify_commands_processed();
		Ok(())
	}

	fn abort_on_failure(&mut self, err: CalypsoError) -> CalypsoError {
		warn!("aborting secure session after failure: {err}");
		let _ = self.process_cancel();
		err
	}

	/// The PIN verification flow (spec §4.5): plain or ciphered depending on
	/// `SecuritySetting::pin_verification_plain`.
	pub fn verify_pin(&mut self, pin: Vec<u8>, key: KeyReference) -> Result<PinOutcome> {
		let command = if self.security_setting.pin_verification_plain {
			PoCommand::VerifyPin { data_in: pin }
		} else {
			let challenge_request = PoCommand::GetChallenge.build_request(&self.card)?;
			let responses = self.transceive(vec![challenge_request])?;
			PoCommand::GetChallenge.parse_response(&responses[0], &mut self.card)?;
			let challenge = self.card.card_challenge.clone().unwrap_or_default();
			let ciphered = self.crypto.card_cipher_pin(challenge, pin, key)?;
			PoCommand::VerifyPin { data_in: ciphered }
		};
		let request_bytes = command.build_request(&self.card)?;
		let responses = self.transceive(vec![request_bytes])?;
		match command.parse_response(&responses[0], &mut self.card) {
			Ok(_) => Ok(PinOutcome::Verified),
			Err(err) => match err.kind {
				ErrorKind::CardPinAttemptsRemaining(n) => Ok(PinOutcome::Rejected { attempts_remaining: n }),
				ErrorKind::CardPinBlocked => Ok(PinOutcome::Blocked),
				_ => Err(err),
			},
		}
	}

	/// The SV flow's read-only half: `SV Get`, run whenever it's safe to
	/// call outside a session (the SV mini-FSM lives in `CommandManager`;
	/// this just transmits and parses it directly).
	pub fn sv_get(&mut self, extended_mode: bool, operation: SvOperation) -> Result<PoOutcome> {
		let command = PoCommand::SvGet { extended_mode, operation };
		let request_bytes = command.build_request(&self.card)?;
		let responses = self.transceive(vec![request_bytes])?;
		command.parse_response(&responses[0], &mut self.card)
	}

	/// Resolves one SAM `SV Prepare*` call for a partially-built SV
	/// operation, ready for [`Self::prepare`] to splice into a
	/// [`PoCommand::SvDebit`]/`SvReload`/`SvUndebit`.
	pub fn sv_prepare_debit(&mut self, sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, partial: Vec<u8>) -> Result<SvPrepareOutput> {
		self.crypto.sv_prepare_debit(sv_get_request, sv_get_response, partial)
	}

	pub fn sv_prepare_load(&mut self, sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, partial: Vec<u8>) -> Result<SvPrepareOutput> {
		self.crypto.sv_prepare_load(sv_get_request, sv_get_response, partial)
	}

	pub fn sv_prepare_undebit(&mut self, sv_get_request: Vec<u8>, sv_get_response: Vec<u8>, partial: Vec<u8>) -> Result<SvPrepareOutput> {
		self.crypto.sv_prepare_undebit(sv_get_request, sv_get_response, partial)
	}

	pub fn sam(&self) -> &CalypsoSam {
		&self.sam
	}

	/// Direct access to the SAM façade for the key-management and PKI
	/// operations that sit outside the secure-session flow (spec §6's
	/// `PSO Compute/Verify Signature`, `Unlock`, `Write Key`, `Read
	/// Ceilings`/`Event Counter`, `Read Key Parameters`, `Card Generate
	/// Key`). The engine issues these APDUs and surfaces their results
	/// without interpreting them further, per spec §1's non-goal.
	pub fn crypto_mut(&mut self) -> &mut SymmetricCryptoService<S> {
		&mut self.crypto
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		apdu::ApduResponse,
		card::CardCapabilities,
		catalog::{PoProductType, SamProductType},
		reader::{CardRequest, CardResponse, CardTransceiver},
	};

	struct ScriptedReader {
		responses: std::collections::VecDeque<ApduResponse>,
	}

	impl CardTransceiver for ScriptedReader {
		type Error = std::convert::Infallible;

		fn transmit(&mut self, request: CardRequest) -> std::result::Result<CardResponse, Self::Error> {
			let apdu_responses = request
				.apdu_requests
				.iter()
				.map(|_| self.responses.pop_front().unwrap_or(ApduResponse { data_out: vec![], status_word: 0x9000 }))
				.collect();
			Ok(CardResponse { apdu_responses })
		}
	}

	struct ScriptedSam {
		responses: std::collections::VecDeque<ApduResponse>,
	}

	impl SamTransceiver for ScriptedSam {
		type Error = std::convert::Infallible;

		fn transmit(&mut self, _request_bytes: Vec<u8>) -> std::result::Result<ApduResponse, Self::Error> {
			Ok(self.responses.pop_front().unwrap_or(ApduResponse { data_out: vec![], status_word: 0x9000 }))
		}
	}

	fn manager_with_sam_responses(sam_responses: Vec<ApduResponse>, po_responses: Vec<ApduResponse>) -> TransactionManager<ScriptedReader, ScriptedSam> {
		manager_with_settings(SecuritySetting::builder().build(), sam_responses, po_responses)
	}

	fn manager_with_settings(
		security_setting: SecuritySetting,
		sam_responses: Vec<ApduResponse>,
		po_responses: Vec<ApduResponse>,
	) -> TransactionManager<ScriptedReader, ScriptedSam> {
		let card = CalypsoCard::new(PoProductType::PrimeRev3, CardCapabilities::default());
		let sam = CalypsoSam::new(SamProductType::SamC1, [1, 2, 3, 4]);
		let crypto = SymmetricCryptoService::new(ScriptedSam { responses: sam_responses.into() }, sam);
		TransactionManager::new(card, sam, security_setting, crypto, ScriptedReader { responses: po_responses.into() })
	}

	#[test]
	fn cancel_without_open_session_is_a_no_op() {
		let mut manager = manager_with_sam_responses(vec![], vec![]);
		assert!(manager.process_cancel().is_ok());
		assert!(!manager.is_session_open());
	}

	#[test]
	fn open_flow_initialises_digest_and_opens_session() {
		let sam_responses = vec![
			ApduResponse { data_out: vec![0x11; 4], status_word: 0x9000 },
			ApduResponse { data_out: vec![], status_word: 0x9000 },
		];
		let open_response_data = {
			let mut data = vec![0x00, 0x21, 0x79];
			data.extend_from_slice(&[0xAA; 4]);
			data
		};
		let po_responses = vec![ApduResponse { data_out: open_response_data, status_word: 0x9000 }];
		let mut manager = manager_with_sam_responses(sam_responses, po_responses);
		let outcome = manager.process_opening(WriteAccessLevel::Debit, 0x07, 1).unwrap();
		assert!(manager.is_session_open());
		assert_eq!(outcome.kif, Some(0x21));
		assert_eq!(outcome.kvc, Some(0x79));
	}

	#[test]
	fn early_mutual_authentication_splices_a_mac_into_the_open_request() {
		let security_setting = SecuritySetting::builder()
			.default_key(WriteAccessLevel::Debit, KeyReference::new(0x21, 0x79))
			.early_mutual_authentication(true)
			.extended_mode_supported(true)
			.build();
		let sam_responses = vec![
			ApduResponse { data_out: vec![0x11; 4], status_word: 0x9000 }, // Get Challenge
			ApduResponse { data_out: vec![], status_word: 0x9000 },        // Digest Init (early MAC)
			ApduResponse { data_out: vec![], status_word: 0x9000 },        // Digest Update (early MAC)
			ApduResponse { data_out: vec![0xDE, 0xAD, 0xBE, 0xEF], status_word: 0x9000 }, // Digest Close (early MAC)
			ApduResponse { data_out: vec![], status_word: 0x9000 },        // Digest Init (running session digest)
		];
		let open_response_data = {
			let mut data = vec![0x00, 0x21, 0x79];
			data.extend_from_slice(&[0xAA; 4]);
			data
		};
		let po_responses = vec![ApduResponse { data_out: open_response_data, status_word: 0x9000 }];
		let mut manager = manager_with_settings(security_setting, sam_responses, po_responses);
		let outcome = manager.process_opening(WriteAccessLevel::Debit, 0x07, 1).unwrap();
		assert!(manager.is_session_open());
		assert_eq!(outcome.kif, Some(0x21));
	}
}
