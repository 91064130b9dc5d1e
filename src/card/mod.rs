//! The in-memory card image: `CalypsoCard`, mutated exclusively by response
//! parsers (spec §3/§9 — "parsers receive the prepared command and the card
//! image by exclusive reference; no back-pointers").

// Modules
mod file;

// Public Exports
pub use self::file::{EfType, ElementaryFile};

// Uses
use std::collections::HashMap;

use crate::{
	catalog::{po_class_byte, PoProductType},
	error::{CalypsoError, ErrorKind},
};

/// Capability flags advertised by the PO at selection time (spec §3).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct CardCapabilities {
	pub extended_mode: bool,
	pub pki: bool,
	pub pre_open: bool,
	pub counter_value_postponed: bool,
}

/// The Stored-Value purse state kept on the card image (spec §3/§4.5).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StoredValueState {
	pub balance: i32,
	pub transaction_number: u16,
	pub last_load_log: Option<Vec<u8>>,
	pub last_debit_log: Option<Vec<u8>>,
}

/// The terminal-visible image of a Calypso PO: selected DF, EF contents, SV
/// purse, PIN state, and the challenge/traceability material exchanged
/// during a secure session.
#[derive(Clone, Debug)]
pub struct CalypsoCard {
	pub product_type: PoProductType,
	pub capabilities: CardCapabilities,
	selected_df: Option<Vec<u8>>,
	files: HashMap<u8, ElementaryFile>,
	pub fci: Option<Vec<u8>>,
	pub fcp: Option<Vec<u8>>,
	pub ef_list: Option<Vec<u8>>,
	pub traceability: Option<Vec<u8>>,
	pub card_public_key: Option<Vec<u8>>,
	pub stored_value: StoredValueState,
	pub card_challenge: Option<Vec<u8>>,
	pub pin_attempts_remaining: Option<u8>,
	pub invalidated: bool,
}

impl CalypsoCard {
	pub fn new(product_type: PoProductType, capabilities: CardCapabilities) -> Self {
		Self {
			product_type,
			capabilities,
			selected_df: None,
			files: HashMap::new(),
			fci: None,
			fcp: None,
			ef_list: None,
			traceability: None,
			card_public_key: None,
			stored_value: StoredValueState::default(),
			card_challenge: None,
			pin_attempts_remaining: None,
			invalidated: false,
		}
	}

	/// The class byte this card's commands should use (spec §4.2);
	/// `stored_value_command` selects `LEGACY_STORED_VALUE` over `LEGACY`
	/// for SV commands on REV1/REV2 cards.
	pub fn class_byte(&self, stored_value_command: bool) -> u8 {
		po_class_byte(self.product_type, stored_value_command)
	}

	pub fn selected_df(&self) -> Option<&[u8]> {
		self.selected_df.as_deref()
	}

	/// Records the DF selected by `Select Application`/`Select File`.
	///
	/// Invariant (spec §3): exactly one selected DF at a time — selecting a
	/// new one simply replaces the old value, there's no "stack".
	pub fn set_selected_df(&mut self, df_name: Vec<u8>) {
		self.selected_df = Some(df_name);
	}

	pub fn file(&self, sfi: u8) -> Option<&ElementaryFile> {
		self.files.get(&sfi)
	}

	/// Returns the EF for `sfi`, creating a default-shaped one (as
	/// `Select File`/the first `Read`/`Update` to an SFI would) if it
	/// doesn't exist yet.
	pub fn file_mut_or_create(
		&mut self,
		sfi: u8,
		lid: u16,
		file_type: EfType,
		record_size: usize,
		record_count: usize,
	) -> &mut ElementaryFile {
		self.files.entry(sfi).or_insert_with(|| {
			ElementaryFile::new(sfi, lid, file_type, record_size, record_count)
		})
	}

	/// Returns the EF for `sfi`, failing if `Select File`/a prior read never
	/// registered it — used by commands that require a file to already be
	/// known (e.g. `Increase`/`Decrease`, which need the existing type to
	/// validate the operation).
	pub fn file_mut(&mut self, sfi: u8) -> Result<&mut ElementaryFile, CalypsoError> {
		self.files
			.get_mut(&sfi)
			.ok_or_else(|| CalypsoError::engine(ErrorKind::CardDataAccess, format!("SFI {sfi} not selected")))
	}

	/// Sets the SV balance, enforcing the signed-24-bit invariant (spec §3)
	/// unless `allow_negative` (the security setting's negative-balance
	/// toggle) is set, in which case the full signed-24-bit range is still
	/// the bound — only the sign of the *result* changes meaning.
	pub fn set_sv_balance(&mut self, balance: i32) -> Result<(), CalypsoError> {
		if !(-0x0080_0000..=0x007F_FFFF).contains(&balance) {
			return Err(CalypsoError::engine(
				ErrorKind::CardIllegalParameter,
				"SV balance does not fit in a signed 24-bit integer",
			));
		}
		self.stored_value.balance = balance;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn class_byte_follows_product_type() {
		let card = CalypsoCard::new(PoProductType::PrimeRev3, CardCapabilities::default());
		assert_eq!(card.class_byte(false), 0x00);

		let card = CalypsoCard::new(PoProductType::PrimeRev1, CardCapabilities::default());
		assert_eq!(card.class_byte(false), 0x94);
		assert_eq!(card.class_byte(true), 0xFA);
	}

	#[test]
	fn file_mut_or_create_is_idempotent() {
		let mut card = CalypsoCard::new(PoProductType::PrimeRev3, CardCapabilities::default());
		card.file_mut_or_create(0x07, 0x0007, EfType::Linear, 29, 1);
		card.file_mut(0x07).unwrap().set_record(1, vec![0xAA; 29]).unwrap();
		assert_eq!(card.file(0x07).unwrap().record(1), Some([0xAA; 29].as_slice()));
	}

	#[test]
	fn unselected_sfi_is_an_error() {
		let mut card = CalypsoCard::new(PoProductType::PrimeRev3, CardCapabilities::default());
		assert!(card.file_mut(0x01).is_err());
	}

	#[test]
	fn sv_balance_out_of_range_rejected() {
		let mut card = CalypsoCard::new(PoProductType::PrimeRev3, CardCapabilities::default());
		assert!(card.set_sv_balance(0x0080_0000).is_err());
		assert!(card.set_sv_balance(-100).is_ok());
	}
}
