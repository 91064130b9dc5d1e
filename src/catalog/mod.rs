//! The command catalog: class-byte selection rules, product-type enums, and
//! the status-word tables that every command's parser consults.
//!
//! Each command's own table (declared with [`crate::status_word_table`] next
//! to its builder/parser in `command`) is layered over [`PO_BASELINE_SW_TABLE`]
//! or [`SAM_BASELINE_SW_TABLE`] by [`lookup_po_status_word`]/
//! [`lookup_sam_status_word`].

// Uses
use crate::{
	enum_repr_infallible,
	error::{CalypsoError, ErrorKind},
};

/// The PO's product family, which determines class-byte selection and a
/// handful of encoding differences (see spec §3/§4.2).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PoProductType {
	PrimeRev1,
	PrimeRev2,
	PrimeRev3,
	Light,
	Basic,
}

impl PoProductType {
	/// Whether this product type exposes the `counter-value-postponed`
	/// capability (SW `0x6200` on Increase/Decrease carries a locally
	/// computed value rather than an empty response). This is a capability
	/// flag on [`crate::card::CalypsoCard`], not solely a function of
	/// product type, but `PRIME_REV3` and later always advertise it.
	pub fn supports_extended_mode(self) -> bool {
		matches!(self, Self::PrimeRev3 | Self::Light | Self::Basic)
	}
}

/// The SAM's product family (spec §3).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SamProductType {
	SamC1,
	SamS1Dx,
	SamS1E1,
	HsmC1,
}

/// Class byte values used across the catalog (spec §6).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ClassByte {
	Legacy,
	LegacyStoredValue,
	Iso,
	SamLow,
	SamHigh,
}

impl ClassByte {
	pub const fn byte(self) -> u8 {
		match self {
			Self::Legacy => 0x94,
			Self::LegacyStoredValue => 0xFA,
			Self::Iso => 0x00,
			Self::SamLow => 0x80,
			Self::SamHigh => 0x94,
		}
	}
}

/// Selects the class byte a PO command should use, given the card's product
/// type and whether the command is one of the Stored-Value family.
pub fn po_class_byte(product_type: PoProductType, stored_value_command: bool) -> u8 {
	match product_type {
		PoProductType::PrimeRev1 | PoProductType::PrimeRev2 => {
			if stored_value_command {
				ClassByte::LegacyStoredValue.byte()
			} else {
				ClassByte::Legacy.byte()
			}
		}
		PoProductType::PrimeRev3 | PoProductType::Light | PoProductType::Basic => {
			ClassByte::Iso.byte()
		}
	}
}

/// Selects the class byte a SAM command should use (S1DX family uses
/// `0x80`; everything else in this catalog uses `0x94`).
pub fn sam_class_byte(product_type: SamProductType) -> u8 {
	match product_type {
		SamProductType::SamS1Dx => ClassByte::SamLow.byte(),
		SamProductType::SamC1 | SamProductType::SamS1E1 | SamProductType::HsmC1 => {
			ClassByte::SamHigh.byte()
		}
	}
}

enum_repr_infallible! {
/// The session write-access level requested by `Open Secure Session`,
/// selecting which key (by `SecuritySetting`'s key map) secures the
/// session.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum WriteAccessLevel: u8 {
	Personalization = 0 => "Personalization",
	Load            = 1 => "Load",
	Debit           = 2 => "Debit",
}
}

/// The key index byte `Open Secure Session` encodes in P1 for each access
/// level (spec §8 scenario 2: access level `PERSO` with `record=1` encodes
/// to `P1=0x0B`, i.e. `record*8 + 3`).
pub fn open_session_key_index(level: WriteAccessLevel) -> u8 {
	match level {
		WriteAccessLevel::Debit => 1,
		WriteAccessLevel::Load => 2,
		WriteAccessLevel::Personalization => 3,
	}
}

/// The three Stored-Value operations, named consistently across `SV Get`,
/// the SV command-manager mini-FSM, and the matching SAM `SV Prepare*`
/// command.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SvOperation {
	Reload,
	Debit,
	Undebit,
}

/// The outcome of looking up a status word against a command's table: either
/// success (optionally a non-fatal warning like `0x6200`) or a concrete
/// [`CalypsoError`].
pub enum StatusOutcome {
	Success,
	/// A warning status (currently only `0x6200`) that the caller must
	/// decide how to handle — e.g. the postponed-counter-value case.
	Warning(&'static str),
	Failure(CalypsoError),
}

/// Status words shared by every PO command in the catalog (spec §4.2/§6).
pub const PO_BASELINE_SW_TABLE: &[(u16, ErrorKind, &str)] = &[
	(0x6283, ErrorKind::CardTerminated, "PO invalidated"),
	(
		0x6400,
		ErrorKind::CardSessionBufferOverflow,
		"Session modification buffer overflow",
	),
	(0x6700, ErrorKind::CardIllegalParameter, "Lc error"),
	(0x6981, ErrorKind::CardDataAccess, "Incorrect EF type"),
	(
		0x6982,
		ErrorKind::CardSecurityContext,
		"Security condition not satisfied",
	),
	(0x6985, ErrorKind::CardAccessForbidden, "Access forbidden"),
	(0x6986, ErrorKind::CardDataAccess, "No current EF"),
	(
		0x6988,
		ErrorKind::CardSecurityContext,
		"Incorrect MAC or signature",
	),
	(0x6A80, ErrorKind::CardIllegalParameter, "Bad data"),
	(0x6A82, ErrorKind::CardDataAccess, "File not found"),
	(0x6A83, ErrorKind::CardDataAccess, "Record not found"),
	(0x6A88, ErrorKind::CardDataAccess, "Data object not found"),
	(0x6B00, ErrorKind::UnknownStatus, "P1/P2 not supported"),
	(0x6D00, ErrorKind::UnknownStatus, "INS not supported"),
];

/// Status words shared by every SAM command in the catalog (spec §6/§7) —
/// the same wire-level families as [`PO_BASELINE_SW_TABLE`], but attributed
/// to the SAM side of the error taxonomy.
pub const SAM_BASELINE_SW_TABLE: &[(u16, ErrorKind, &str)] = &[
	(0x6700, ErrorKind::SamIllegalParameter, "Lc error"),
	(
		0x6982,
		ErrorKind::SamSecurityContext,
		"Security condition not satisfied",
	),
	(0x6985, ErrorKind::SamAccessForbidden, "Access forbidden"),
	(
		0x6988,
		ErrorKind::SamSecurityData,
		"Incorrect MAC or signature",
	),
	(0x6A80, ErrorKind::SamIncorrectInputData, "Bad data"),
	(0x6A82, ErrorKind::SamDataAccess, "File not found"),
	(0x6A83, ErrorKind::SamDataAccess, "Record not found"),
	(0x6A88, ErrorKind::SamDataAccess, "Data object not found"),
	(0x6B00, ErrorKind::UnknownStatus, "P1/P2 not supported"),
	(0x6D00, ErrorKind::UnknownStatus, "INS not supported"),
];

/// Looks up a status word against a command-specific table (checked first,
/// so a command can narrow or override the baseline meaning of an SW),
/// falling back to `baseline`, and finally to [`ErrorKind::UnknownStatus`]
/// for anything neither table names.
///
/// `0x9000` is always success and is never expected to appear in either
/// table. `0x6200` is always a [`StatusOutcome::Warning`] unless the
/// command's table overrides it with a specific message.
pub fn lookup_status_word(
	command_name: &'static str,
	table: &[(u16, ErrorKind, &str)],
	baseline: &[(u16, ErrorKind, &str)],
	sw: u16,
) -> StatusOutcome {
	if sw == 0x9000 {
		return StatusOutcome::Success;
	}
	for &(entry_sw, kind, message) in table.iter().chain(baseline.iter()) {
		if entry_sw == sw {
			return StatusOutcome::Failure(CalypsoError::new(kind, message, command_name, Some(sw)));
		}
	}
	if sw == 0x6200 {
		return StatusOutcome::Warning("Data postponed");
	}
	StatusOutcome::Failure(CalypsoError::new(
		ErrorKind::UnknownStatus,
		format!("unrecognised status word {sw:04X}"),
		command_name,
		Some(sw),
	))
}

/// Convenience wrapper over [`lookup_status_word`] for PO commands, using
/// [`PO_BASELINE_SW_TABLE`].
pub fn lookup_po_status_word(command_name: &'static str, table: &[(u16, ErrorKind, &str)], sw: u16) -> StatusOutcome {
	lookup_status_word(command_name, table, PO_BASELINE_SW_TABLE, sw)
}

/// Convenience wrapper over [`lookup_status_word`] for SAM commands, using
/// [`SAM_BASELINE_SW_TABLE`].
pub fn lookup_sam_status_word(command_name: &'static str, table: &[(u16, ErrorKind, &str)], sw: u16) -> StatusOutcome {
	lookup_status_word(command_name, table, SAM_BASELINE_SW_TABLE, sw)
}

/// Maps the `63Cx`/`6983` PIN-verification status-word family to a
/// remaining-attempts count, per spec §4.5.
pub fn pin_attempts_remaining(sw: u16) -> Option<u8> {
	match sw {
		0x6983 => Some(0),
		0x63C0..=0x63CF => Some((sw & 0x000F) as u8),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn class_byte_legacy_for_rev1_rev2() {
		assert_eq!(po_class_byte(PoProductType::PrimeRev1, false), 0x94);
		assert_eq!(po_class_byte(PoProductType::PrimeRev2, false), 0x94);
	}

	#[test]
	fn class_byte_legacy_stored_value_for_rev1_rev2_sv_commands() {
		assert_eq!(po_class_byte(PoProductType::PrimeRev1, true), 0xFA);
	}

	#[test]
	fn class_byte_iso_for_rev3_and_later() {
		assert_eq!(po_class_byte(PoProductType::PrimeRev3, false), 0x00);
		assert_eq!(po_class_byte(PoProductType::Light, true), 0x00);
		assert_eq!(po_class_byte(PoProductType::Basic, false), 0x00);
	}

	#[test]
	fn sam_class_byte_family() {
		assert_eq!(sam_class_byte(SamProductType::SamS1Dx), 0x80);
		assert_eq!(sam_class_byte(SamProductType::SamC1), 0x94);
	}

	#[test]
	fn baseline_lookup_known_and_unknown() {
		match lookup_po_status_word("Test", &[], 0x6A83) {
			StatusOutcome::Failure(e) => assert_eq!(e.kind, ErrorKind::CardDataAccess),
			_ => panic!("expected failure"),
		}
		match lookup_po_status_word("Test", &[], 0x9999) {
			StatusOutcome::Failure(e) => assert_eq!(e.kind, ErrorKind::UnknownStatus),
			_ => panic!("expected failure"),
		}
		matches!(lookup_po_status_word("Test", &[], 0x9000), StatusOutcome::Success);
	}

	#[test]
	fn sam_baseline_lookup_uses_sam_error_kinds() {
		match lookup_sam_status_word("Test", &[], 0x6A83) {
			StatusOutcome::Failure(e) => assert_eq!(e.kind, ErrorKind::SamDataAccess),
			_ => panic!("expected failure"),
		}
	}

	#[test]
	fn open_session_key_index_matches_scenario_2() {
		assert_eq!(open_session_key_index(WriteAccessLevel::Personalization), 3);
		let p1 = 1u8 * 8 + open_session_key_index(WriteAccessLevel::Personalization);
		assert_eq!(p1, 0x0B);
	}

	#[test]
	fn pin_attempts_family() {
		assert_eq!(pin_attempts_remaining(0x63C2), Some(2));
		assert_eq!(pin_attempts_remaining(0x6983), Some(0));
		assert_eq!(pin_attempts_remaining(0x9000), None);
	}
}
