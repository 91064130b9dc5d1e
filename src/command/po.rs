//! PO (card-side) command builders and parsers.

// Uses
use derivative::Derivative;

use crate::{
	apdu::{self, find_tlv_value},
	card::{CalypsoCard, EfType},
	catalog::{self, open_session_key_index, PoProductType, StatusOutcome, SvOperation, WriteAccessLevel},
	error::{CalypsoError, ErrorKind, Result},
	status_word_table,
};

/// Which `GET DATA` payload a [`PoCommand::GetData`] asks for, and the P1/P2
/// tag value that selects it (spec §6).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GetDataTag {
	Fci,
	Fcp,
	EfList,
	Traceability,
	CardPublicKey,
}

impl GetDataTag {
	pub const fn p1_p2(self) -> (u8, u8) {
		match self {
			Self::Fci => (0x00, 0x6F),
			Self::Fcp => (0x00, 0x62),
			Self::EfList => (0x00, 0xC0),
			Self::Traceability => (0x01, 0x85),
			Self::CardPublicKey => (0xDF, 0x2C),
		}
	}
}

/// A PO command: typed inputs for [`PoCommand::build_request`], consumed
/// once by [`PoCommand::parse_response`].
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub enum PoCommand {
	SelectApplication { df_name: Vec<u8> },
	SelectFile { lid: u16 },
	GetData { tag: GetDataTag },
	OpenSecureSession {
		access_level: WriteAccessLevel,
		sfi: u8,
		record_number: u8,
		product_type: PoProductType,
		sam_challenge: Vec<u8>,
		/// A pre-computed terminal half-MAC, spliced in after the SAM
		/// challenge when early mutual authentication is enabled (spec
		/// section 4.5). `None` for the ordinary flow.
		terminal_mac: Option<Vec<u8>>,
	},
	CloseSecureSession { ratification_requested: bool, terminal_mac: Vec<u8> },
	CloseSecureSessionAbort,
	ReadRecords { sfi: u8, first_record: u8, multi: bool, expected_length: u8 },
	ReadBinary { sfi: u8, offset: u16, length: u8 },
	UpdateRecord { sfi: u8, record_number: u8, data: Vec<u8> },
	WriteRecord { sfi: u8, record_number: u8, data: Vec<u8> },
	AppendRecord { sfi: u8, data: Vec<u8> },
	Increase { sfi: u8, counter_number: u8, value: u32 },
	Decrease { sfi: u8, counter_number: u8, value: u32 },
	/// The PO's own `Get Challenge` (spec §4.5's PIN flow) — distinct from
	/// the SAM's `Get Challenge` used to open a secure session; this one
	/// retrieves the card challenge `Card Cipher PIN` ciphers against.
	GetChallenge,
	ChangePin {
		#[derivative(Debug = "ignore")]
		new_pin: Vec<u8>,
	},
	VerifyPin {
		#[derivative(Debug = "ignore")]
		data_in: Vec<u8>,
	},
	Invalidate,
	Rehabilitate,
	SvGet { extended_mode: bool, operation: SvOperation },
	/// `p1`/`p2` and `sam_suffix` are resolved by the caller from the SAM's
	/// `SV Prepare Reload` output (serial/challenge/transaction-number/MAC,
	/// per spec §4.5/§6) before this builder runs — this command object only
	/// knows how to place the already-resolved bytes, not how to derive them.
	SvReload { amount: i32, date: [u8; 2], time: [u8; 2], free: [u8; 2], kvc: u8, p1: u8, p2: u8, sam_suffix: Vec<u8> },
	SvDebit { amount: i32, date: [u8; 2], time: [u8; 2], kvc: u8, p1: u8, p2: u8, sam_suffix: Vec<u8> },
	SvUndebit { amount: i32, date: [u8; 2], time: [u8; 2], kvc: u8, p1: u8, p2: u8, sam_suffix: Vec<u8> },
	GenerateAsymmetricKeyPair,
}

/// The structured result of parsing a PO response, carrying whatever a
/// command's variant needs to hand back to `TransactionManager` beyond the
/// card-image mutation the parser already performed.
#[derive(Clone, Debug, Default)]
pub struct PoOutcome {
	pub card_challenge: Option<Vec<u8>>,
	pub previous_session_ratified: Option<bool>,
	pub manage_secure_session_authorized: Option<bool>,
	pub kif: Option<u8>,
	pub kvc: Option<u8>,
	pub card_signature: Option<Vec<u8>>,
	pub sv_challenge: Option<Vec<u8>>,
	pub records: Vec<(u8, Vec<u8>)>,
	pub pin_attempts_remaining: Option<u8>,
}

status_word_table! {
	const OPEN_SESSION_SW = {
		0x6985 => (ErrorKind::CardAccessForbidden, "Session already open or access level forbidden"),
	};
}

status_word_table! {
	const CLOSE_SESSION_SW = {
		0x6988 => (ErrorKind::CardSecurityContext, "Terminal MAC rejected by card"),
	};
}

status_word_table! {
	const CHANGE_PIN_SW = {
		0x6985 => (ErrorKind::CardAccessForbidden, "PIN change not allowed outside a Personalization session"),
	};
}

status_word_table! {
	const SV_SW = {
		0x6A82 => (ErrorKind::CardDataAccess, "No SV purse on this card"),
	};
}

impl PoCommand {
	/// Whether this command consumes session-modification-buffer bytes
	/// while a secure session is open (spec §3/§4.5); read/select commands
	/// do not, every write-type command does.
	pub fn uses_session_buffer(&self) -> bool {
		matches!(
			self,
			Self::UpdateRecord { .. }
				| Self::WriteRecord { .. }
				| Self::AppendRecord { .. }
				| Self::Increase { .. }
				| Self::Decrease { .. }
				| Self::SvReload { .. }
				| Self::SvDebit { .. }
				| Self::SvUndebit { .. }
		)
	}

	/// Whether this command is forbidden while a secure session is open
	/// (spec §4.5 — "impossible inside session").
	pub fn forbidden_in_session(&self) -> bool {
		matches!(
			self,
			Self::ChangePin { .. } | Self::VerifyPin { .. } | Self::GetData { .. } | Self::GetChallenge
		)
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::SelectApplication { .. } => "Select Application",
			Self::SelectFile { .. } => "Select File",
			Self::GetData { .. } => "Get Data",
			Self::OpenSecureSession { .. } => "Open Secure Session",
			Self::CloseSecureSession { .. } | Self::CloseSecureSessionAbort => "Close Secure Session",
			Self::ReadRecords { .. } => "Read Records",
			Self::ReadBinary { .. } => "Read Binary",
			Self::UpdateRecord { .. } => "Update Record",
			Self::WriteRecord { .. } => "Write Record",
			Self::AppendRecord { .. } => "Append Record",
			Self::Increase { .. } => "Increase",
			Self::Decrease { .. } => "Decrease",
			Self::GetChallenge => "Get Challenge",
			Self::ChangePin { .. } => "Change PIN",
			Self::VerifyPin { .. } => "Verify PIN",
			Self::Invalidate => "Invalidate",
			Self::Rehabilitate => "Rehabilitate",
			Self::SvGet { .. } => "SV Get",
			Self::SvReload { .. } => "SV Reload",
			Self::SvDebit { .. } => "SV Debit",
			Self::SvUndebit { .. } => "SV Undebit",
			Self::GenerateAsymmetricKeyPair => "Generate Asymmetric Key Pair",
		}
	}

	/// Builds the request bytes for this command against `card`'s current
	/// product type (for class-byte selection; spec §4.2). Out-of-range
	/// counter/amount inputs are rejected here, before any transmission
	/// (spec §8), rather than left to panic in the byte-packing helpers.
	pub fn build_request(&self, card: &CalypsoCard) -> Result<Vec<u8>> {
		let stored_value = matches!(self, Self::SvGet { .. } | Self::SvReload { .. } | Self::SvDebit { .. } | Self::SvUndebit { .. });
		let cla = card.class_byte(stored_value);
		let bytes = match self {
			Self::SelectApplication { df_name } => apdu::build(cla, 0xA4, 0x04, 0x00, Some(df_name), Some(0x00)),
			Self::SelectFile { lid } => {
				apdu::build(cla, 0xA4, 0x08, 0x00, Some(&lid.to_be_bytes()), Some(0x00))
			}
			Self::GetData { tag } => {
				let (p1, p2) = tag.p1_p2();
				apdu::build(cla, 0xCA, p1, p2, None, Some(0x00))
			}
			Self::OpenSecureSession {
				access_level,
				sfi,
				record_number,
				product_type,
				sam_challenge,
				terminal_mac,
			} => {
				let ins = match product_type {
					PoProductType::PrimeRev2 => 0x8B,
					_ => 0x8A,
				};
				let p1 = record_number * 8 + open_session_key_index(*access_level);
				let p2 = sfi * 8 + 2;
				let mut data_in = if matches!(product_type, PoProductType::PrimeRev3 | PoProductType::Light | PoProductType::Basic) {
					let mut data = Vec::with_capacity(1 + sam_challenge.len());
					data.push(0x00);
					data.extend_from_slice(sam_challenge);
					data
				} else {
					sam_challenge.clone()
				};
				if let Some(mac) = terminal_mac {
					data_in.extend_from_slice(mac);
				}
				apdu::build(cla, ins, p1, p2, Some(&data_in), Some(0x00))
			}
			Self::CloseSecureSession { ratification_requested, terminal_mac } => {
				let p1 = if *ratification_requested { 0x80 } else { 0x00 };
				apdu::build(cla, 0x8E, p1, 0x00, Some(terminal_mac), Some(0x00))
			}
			Self::CloseSecureSessionAbort => apdu::build(cla, 0x8E, 0x00, 0x00, None, None),
			Self::ReadRecords { sfi, first_record, multi, expected_length } => {
				let p2 = sfi * 8 + if *multi { 5 } else { 4 };
				apdu::build(cla, 0xB2, *first_record, p2, None, Some(*expected_length))
			}
			Self::ReadBinary { sfi, offset, length } => {
				let p1 = if *offset < 256 {
					0x80 | sfi
				} else {
					(*offset >> 8) as u8
				};
				let p2 = (*offset & 0xFF) as u8;
				apdu::build(cla, 0xB0, p1, p2, None, Some(*length))
			}
			Self::UpdateRecord { sfi, record_number, data } => {
				apdu::build(cla, 0xDC, *record_number, sfi * 8, Some(data), None)
			}
			Self::WriteRecord { sfi, record_number, data } => {
				apdu::build(cla, 0xD2, *record_number, sfi * 8, Some(data), None)
			}
			Self::AppendRecord { sfi, data } => apdu::build(cla, 0xE2, 0x00, sfi * 8, Some(data), None),
			Self::Increase { sfi, counter_number, value } => {
				let bytes = crate::util::u32_to_3_bytes(Self::checked_counter_value(*value)?);
				apdu::build(cla, 0x32, *counter_number, sfi * 8, Some(&bytes), Some(0x00))
			}
			Self::Decrease { sfi, counter_number, value } => {
				let bytes = crate::util::u32_to_3_bytes(Self::checked_counter_value(*value)?);
				apdu::build(cla, 0x30, *counter_number, sfi * 8, Some(&bytes), Some(0x00))
			}
			Self::GetChallenge => apdu::build(cla, 0x84, 0x00, 0x00, None, Some(0x08)),
			Self::ChangePin { new_pin } => apdu::build(cla, 0xD8, 0x00, 0x04, Some(new_pin), None),
			Self::VerifyPin { data_in } => apdu::build(cla, 0x20, 0x00, 0x00, Some(data_in), None),
			Self::Invalidate => apdu::build(cla, 0x04, 0x00, 0x00, None, None),
			Self::Rehabilitate => apdu::build(cla, 0x44, 0x00, 0x00, None, None),
			Self::SvGet { extended_mode, operation } => {
				let p1 = if *extended_mode { 0x01 } else { 0x00 };
				let p2 = match operation {
					SvOperation::Reload => 0x07,
					SvOperation::Debit | SvOperation::Undebit => 0x09,
				};
				apdu::build(cla, 0x7C, p1, p2, None, Some(0x00))
			}
			Self::SvReload { amount, date, time, free, kvc, p1, p2, sam_suffix } => {
				let mut data = Vec::with_capacity(9 + sam_suffix.len());
				data.extend_from_slice(&crate::util::i32_to_3_bytes(Self::checked_sv_amount(*amount)?));
				data.extend_from_slice(date);
				data.extend_from_slice(time);
				data.extend_from_slice(free);
				data.push(*kvc);
				data.extend_from_slice(sam_suffix);
				apdu::build(cla, 0xB8, *p1, *p2, Some(&data), Some(0x00))
			}
			Self::SvDebit { amount, date, time, kvc, p1, p2, sam_suffix } => {
				let mut data = Vec::with_capacity(7 + sam_suffix.len());
				data.extend_from_slice(&crate::util::i32_to_3_bytes(Self::checked_sv_amount(*amount)?));
				data.extend_from_slice(date);
				data.extend_from_slice(time);
				data.push(*kvc);
				data.extend_from_slice(sam_suffix);
				apdu::build(cla, 0xBA, *p1, *p2, Some(&data), Some(0x00))
			}
			Self::SvUndebit { amount, date, time, kvc, p1, p2, sam_suffix } => {
				let mut data = Vec::with_capacity(7 + sam_suffix.len());
				data.extend_from_slice(&crate::util::i32_to_3_bytes(Self::checked_sv_amount(*amount)?));
				data.extend_from_slice(date);
				data.extend_from_slice(time);
				data.push(*kvc);
				data.extend_from_slice(sam_suffix);
				apdu::build(cla, 0xBC, *p1, *p2, Some(&data), Some(0x00))
			}
			Self::GenerateAsymmetricKeyPair => apdu::build(cla, 0x46, 0x00, 0x00, None, Some(0x00)),
		};
		Ok(bytes)
	}

	/// Rejects an Increase/Decrease counter value that doesn't fit the
	/// 3-byte unsigned field spec §3 mandates for every counter EF.
	fn checked_counter_value(value: u32) -> Result<u32> {
		if value > 0x00FF_FFFF {
			return Err(CalypsoError::engine(ErrorKind::CardIllegalParameter, "counter value exceeds 24 bits"));
		}
		Ok(value)
	}

	/// Rejects an SV Reload/Debit/Undebit amount that doesn't fit the
	/// signed 24-bit field spec §3's SV balance uses.
	fn checked_sv_amount(amount: i32) -> Result<i32> {
		if !(-0x0080_0000..=0x007F_FFFF).contains(&amount) {
			return Err(CalypsoError::engine(ErrorKind::CardIllegalParameter, "SV amount exceeds signed 24 bits"));
		}
		Ok(amount)
	}

	/// Parses `response` against this command's status-word table, mutating
	/// `card` on success and returning the structured outcome the caller
	/// needs. Never mutates `card` on failure (spec §8).
	pub fn parse_response(&self, response: &apdu::ApduResponse, card: &mut CalypsoCard) -> Result<PoOutcome> {
		let table = self.status_word_table();
		match catalog::lookup_po_status_word(self.name(), table, response.status_word) {
			StatusOutcome::Failure(err) => return Err(self.handle_failure(err, response.status_word)),
			StatusOutcome::Warning(_) => {}
			StatusOutcome::Success => {}
		}
		self.apply(response, card)
	}

	fn status_word_table(&self) -> &'static [(u16, ErrorKind, &'static str)] {
		match self {
			Self::OpenSecureSession { .. } => OPEN_SESSION_SW,
			Self::CloseSecureSession { .. } | Self::CloseSecureSessionAbort => CLOSE_SESSION_SW,
			Self::ChangePin { .. } => CHANGE_PIN_SW,
			Self::SvGet { .. } | Self::SvReload { .. } | Self::SvDebit { .. } | Self::SvUndebit { .. } => SV_SW,
			_ => &[],
		}
	}

	/// Status words that don't fit the generic baseline/table lookup:
	/// `Increase`/`Decrease`'s postponed-counter warning and `Verify PIN`'s
	/// attempts-remaining family.
	fn handle_failure(&self, err: CalypsoError, sw: u16) -> CalypsoError {
		if let Some(remaining) = catalog::pin_attempts_remaining(sw) {
			if remaining == 0 {
				return CalypsoError::new(ErrorKind::CardPinBlocked, "PIN blocked", self.name(), Some(sw));
			}
			return CalypsoError::new(ErrorKind::CardPinAttemptsRemaining(remaining), "PIN incorrect", self.name(), Some(sw));
		}
		err
	}

	fn apply(&self, response: &apdu::ApduResponse, card: &mut CalypsoCard) -> Result<PoOutcome> {
		let mut outcome = PoOutcome::default();
		match self {
			Self::SelectApplication { df_name } => {
				card.set_selected_df(df_name.clone());
				card.fci = Some(response.data_out.clone());
			}
			Self::SelectFile { .. } => {
				card.fcp = Some(response.data_out.clone());
			}
			Self::GetData { tag } => match tag {
				GetDataTag::Fci => {
					card.fci = Some(response.data_out.clone());
					// Tag 0x84 (DF name) inside the FCI template, when present
					// at the top level the non-recursive TLV walk can reach.
					if let Some(df_name) = find_tag(&[0x84], &response.data_out)? {
						card.set_selected_df(df_name.to_vec());
					}
				}
				GetDataTag::Fcp => card.fcp = Some(response.data_out.clone()),
				GetDataTag::EfList => card.ef_list = Some(response.data_out.clone()),
				GetDataTag::Traceability => card.traceability = Some(response.data_out.clone()),
				GetDataTag::CardPublicKey => card.card_public_key = Some(response.data_out.clone()),
			},
			Self::OpenSecureSession { .. } => {
				let data = &response.data_out;
				if data.len() < 3 {
					return Err(CalypsoError::new(
						ErrorKind::UnexpectedResponseLength,
						"Open Secure Session response too short",
						self.name(),
						Some(response.status_word),
					));
				}
				let flags = data[0];
				let kif = data[1];
				let kvc = data[2];
				let challenge_len = if card.capabilities.extended_mode { 8 } else { 4 };
				let challenge_end = (3 + challenge_len).min(data.len());
				let card_challenge = data[3..challenge_end].to_vec();
				card.card_challenge = Some(card_challenge.clone());
				outcome.previous_session_ratified = Some(flags & 0x01 != 0);
				outcome.manage_secure_session_authorized = Some(flags & 0x02 != 0);
				outcome.kif = Some(kif);
				outcome.kvc = Some(kvc);
				outcome.card_challenge = Some(card_challenge);
			}
			Self::CloseSecureSession { .. } | Self::CloseSecureSessionAbort => {
				outcome.card_signature = Some(response.data_out.clone());
			}
			Self::ReadRecords { sfi, first_record, multi, .. } => {
				if *multi {
					let mut offset = 0;
					while offset + 2 <= response.data_out.len() {
						let index = response.data_out[offset];
						let len = usize::from(response.data_out[offset + 1]);
						let start = offset + 2;
						if start + len > response.data_out.len() {
							break;
						}
						let bytes = response.data_out[start..start + len].to_vec();
						let ef = card.file_mut_or_create(*sfi, 0, EfType::Linear, len, usize::from(index));
						ef.set_record(index, bytes.clone())?;
						outcome.records.push((index, bytes));
						offset = start + len;
					}
				} else {
					let ef = card.file_mut_or_create(*sfi, 0, EfType::Linear, response.data_out.len(), usize::from(*first_record));
					ef.set_record(*first_record, response.data_out.clone())?;
					outcome.records.push((*first_record, response.data_out.clone()));
				}
			}
			Self::ReadBinary { sfi, offset, length } => {
				let ef = card.file_mut_or_create(*sfi, 0, EfType::Binary, usize::from(*offset) + usize::from(*length), 1);
				ef.write_binary_at_offset(usize::from(*offset), &response.data_out);
			}
			Self::UpdateRecord { sfi, record_number, data } => {
				let ef = card.file_mut_or_create(*sfi, 0, EfType::Linear, data.len(), usize::from(*record_number));
				ef.set_record(*record_number, data.clone())?;
			}
			Self::WriteRecord { sfi, record_number, data } => {
				let ef = card.file_mut_or_create(*sfi, 0, EfType::Linear, data.len(), usize::from(*record_number));
				ef.set_record(*record_number, data.clone())?;
			}
			Self::AppendRecord { sfi, data } => {
				let ef = card.file_mut_or_create(*sfi, 0, EfType::Cyclic, data.len(), 1);
				ef.append_cyclic(data.clone())?;
			}
			Self::Increase { sfi, counter_number, value } => {
				if response.status_word == 0x6200 {
					if !card.capabilities.counter_value_postponed {
						return Err(CalypsoError::new(
							ErrorKind::UnknownStatus,
							"counter value postponed but card lacks the capability",
							self.name(),
							Some(response.status_word),
						));
					}
					let ef = card.file_mut(*sfi)?;
					let previous = ef.counter_value(*counter_number).unwrap_or(0);
					ef.set_counter_value(*counter_number, previous.saturating_add(*value))?;
				} else {
					let new_value = crate::util::byte_slice_to_u32(&response.data_out);
					let ef = card.file_mut_or_create(*sfi, 0, EfType::Counters, 3, usize::from(*counter_number));
					ef.set_counter_value(*counter_number, new_value)?;
				}
			}
			Self::Decrease { sfi, counter_number, value } => {
				if response.status_word == 0x6200 {
					if !card.capabilities.counter_value_postponed {
						return Err(CalypsoError::new(
							ErrorKind::UnknownStatus,
							"counter value postponed but card lacks the capability",
							self.name(),
							Some(response.status_word),
						));
					}
					let ef = card.file_mut(*sfi)?;
					let previous = ef.counter_value(*counter_number).unwrap_or(0);
					ef.set_counter_value(*counter_number, previous.saturating_sub(*value))?;
				} else {
					let new_value = crate::util::byte_slice_to_u32(&response.data_out);
					let ef = card.file_mut_or_create(*sfi, 0, EfType::Counters, 3, usize::from(*counter_number));
					ef.set_counter_value(*counter_number, new_value)?;
				}
			}
			Self::GetChallenge => {
				card.card_challenge = Some(response.data_out.clone());
				outcome.card_challenge = Some(response.data_out.clone());
			}
			Self::ChangePin { .. } | Self::VerifyPin { .. } => {
				card.pin_attempts_remaining = Some(3);
			}
			Self::Invalidate => card.invalidated = true,
			Self::Rehabilitate => card.invalidated = false,
			Self::SvGet { .. } => {
				if response.data_out.len() >= 3 {
					let balance_bytes: [u8; 3] = response.data_out[0..3].try_into().expect("checked length");
					card.stored_value.balance = crate::util::bytes_3_to_i32(&balance_bytes);
				}
				outcome.sv_challenge = Some(response.data_out.clone());
			}
			Self::SvReload { amount, .. } => {
				card.set_sv_balance(card.stored_value.balance + amount)?;
				card.stored_value.last_load_log = Some(response.data_out.clone());
			}
			Self::SvDebit { amount, .. } => {
				card.set_sv_balance(card.stored_value.balance - amount)?;
				card.stored_value.last_debit_log = Some(response.data_out.clone());
			}
			Self::SvUndebit { amount, .. } => {
				card.set_sv_balance(card.stored_value.balance + amount)?;
				card.stored_value.last_debit_log = Some(response.data_out.clone());
			}
			Self::GenerateAsymmetricKeyPair => {
				card.card_public_key = Some(response.data_out.clone());
			}
		}
		outcome.pin_attempts_remaining = card.pin_attempts_remaining;
		Ok(outcome)
	}
}

/// Looks up a tag's value in a TLV-encoded response payload, used by parsers
/// that need to pick one field out of a constructed `GET DATA` response
/// rather than store the whole payload verbatim.
pub fn find_tag<'a>(tag: &[u8], data: &'a [u8]) -> Result<Option<&'a [u8]>> {
	find_tlv_value(tag, data)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::card::{CalypsoCard, CardCapabilities};

	fn iso_card() -> CalypsoCard {
		CalypsoCard::new(PoProductType::PrimeRev3, CardCapabilities::default())
	}

	#[test]
	fn select_and_read_scenario_1() {
		let card = iso_card();
		let cmd = PoCommand::ReadRecords {
			sfi: 0x07,
			first_record: 1,
			multi: false,
			expected_length: 0x1D,
		};
		assert_eq!(cmd.build_request(&card).unwrap(), vec![0x00, 0xB2, 0x01, 0x3D, 0x1D]);
	}

	#[test]
	fn open_session_scenario_2() {
		let card = iso_card();
		let cmd = PoCommand::OpenSecureSession {
			access_level: WriteAccessLevel::Personalization,
			sfi: 0x1A,
			record_number: 1,
			product_type: PoProductType::PrimeRev3,
			sam_challenge: vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
			terminal_mac: None,
		};
		assert_eq!(
			cmd.build_request(&card).unwrap(),
			vec![0x00, 0x8A, 0x0B, 0xD2, 0x09, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x00]
		);
	}

	#[test]
	fn open_session_splices_terminal_mac_for_early_mutual_authentication() {
		let card = iso_card();
		let cmd = PoCommand::OpenSecureSession {
			access_level: WriteAccessLevel::Personalization,
			sfi: 0x1A,
			record_number: 1,
			product_type: PoProductType::PrimeRev3,
			sam_challenge: vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
			terminal_mac: Some(vec![0xDE, 0xAD, 0xBE, 0xEF]),
		};
		let request = cmd.build_request(&card).unwrap();
		assert_eq!(&request[request.len() - 5..request.len() - 1], &[0xDE, 0xAD, 0xBE, 0xEF]);
	}

	#[test]
	fn sv_debit_scenario_4_legacy_class() {
		let card = CalypsoCard::new(PoProductType::PrimeRev1, CardCapabilities::default());
		let cmd = PoCommand::SvDebit {
			amount: 100,
			date: [0x12, 0x34],
			time: [0x56, 0x78],
			kvc: 0x23,
			p1: 0xAA,
			p2: 0xBB,
			sam_suffix: vec![0xAA; 12],
		};
		let request = cmd.build_request(&card).unwrap();
		assert_eq!(request[0], 0xFA);
		assert_eq!(request[1], 0xBA);
		assert_eq!(request[2], 0xAA);
		assert_eq!(request[3], 0xBB);
		assert_eq!(request[4], 20);
	}

	#[test]
	fn increase_scenario_3() {
		let card = iso_card();
		let cmd = PoCommand::Increase { sfi: 0x19, counter_number: 1, value: 128 };
		assert_eq!(cmd.build_request(&card).unwrap(), vec![0x00, 0x32, 0x01, 0xC8, 0x03, 0x00, 0x00, 0x80, 0x00]);
	}

	#[test]
	fn increase_rejects_counter_value_above_24_bits() {
		let card = iso_card();
		let cmd = PoCommand::Increase { sfi: 0x19, counter_number: 1, value: 0x0100_0000 };
		match cmd.build_request(&card) {
			Err(e) => assert_eq!(e.kind, ErrorKind::CardIllegalParameter),
			Ok(_) => panic!("expected an out-of-range counter value to be rejected before transmission"),
		}
	}

	#[test]
	fn sv_debit_rejects_amount_above_signed_24_bits() {
		let card = CalypsoCard::new(PoProductType::PrimeRev1, CardCapabilities::default());
		let cmd = PoCommand::SvDebit {
			amount: 0x0080_0000,
			date: [0, 0],
			time: [0, 0],
			kvc: 0,
			p1: 0,
			p2: 0,
			sam_suffix: vec![],
		};
		match cmd.build_request(&card) {
			Err(e) => assert_eq!(e.kind, ErrorKind::CardIllegalParameter),
			Ok(_) => panic!("expected an out-of-range SV amount to be rejected before transmission"),
		}
	}

	#[test]
	fn read_records_parser_populates_card_image() {
		let mut card = iso_card();
		let cmd = PoCommand::ReadRecords { sfi: 0x07, first_record: 1, multi: false, expected_length: 29 };
		let response = apdu::ApduResponse { data_out: vec![0xAA; 29], status_word: 0x9000 };
		cmd.parse_response(&response, &mut card).unwrap();
		assert_eq!(card.file(0x07).unwrap().record(1), Some([0xAA; 29].as_slice()));
	}

	#[test]
	fn failure_status_word_does_not_mutate_card() {
		let mut card = iso_card();
		let cmd = PoCommand::ReadRecords { sfi: 0x07, first_record: 1, multi: false, expected_length: 29 };
		let response = apdu::ApduResponse { data_out: vec![], status_word: 0x6A83 };
		assert!(cmd.parse_response(&response, &mut card).is_err());
		assert!(card.file(0x07).is_none());
	}

	#[test]
	fn verify_pin_attempts_remaining_scenario_5() {
		let mut card = iso_card();
		let cmd = PoCommand::VerifyPin { data_in: vec![0; 8] };
		let response = apdu::ApduResponse { data_out: vec![], status_word: 0x63C2 };
		match cmd.parse_response(&response, &mut card) {
			Err(e) => assert_eq!(e.kind, ErrorKind::CardPinAttemptsRemaining(2)),
			Ok(_) => panic!("expected PIN-attempts error"),
		}
	}
}
