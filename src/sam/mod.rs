//! The SAM image and the security settings that govern a transaction.

// Uses
use std::collections::{HashMap, HashSet};

use crate::catalog::{sam_class_byte, SamProductType, WriteAccessLevel};

/// Identifies a SAM key by its Key Identifier and Key Version & Context.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct KeyReference {
	pub kif: u8,
	pub kvc: u8,
}

impl KeyReference {
	pub const fn new(kif: u8, kvc: u8) -> Self {
		Self { kif, kvc }
	}
}

/// The SAM identity for one transaction (spec §3: "immutable once
/// selected").
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CalypsoSam {
	pub product_type: SamProductType,
	pub serial_number: [u8; 4],
}

impl CalypsoSam {
	pub fn new(product_type: SamProductType, serial_number: [u8; 4]) -> Self {
		Self {
			product_type,
			serial_number,
		}
	}

	pub fn class_byte(&self) -> u8 {
		sam_class_byte(self.product_type)
	}
}

/// The policy that governs a transaction: which keys are used and trusted,
/// and the feature toggles named in spec §3/§4.5/§9.
///
/// Built once via [`SecuritySetting::builder`] before a transaction starts,
/// and is read-only for the transaction's whole lifetime — the crate itself
/// never loads this from a file or environment (that's the out-of-scope
/// "configuration loading" collaborator named in spec §1); the host
/// assembles one value and hands it over.
#[derive(Clone, Debug, Default)]
pub struct SecuritySetting {
	default_keys: HashMap<WriteAccessLevel, KeyReference>,
	kif_by_kvc_overrides: HashMap<(WriteAccessLevel, u8), u8>,
	authorized_session_keys: HashSet<(u8, u8)>,
	pin_ciphering_key: Option<KeyReference>,
	sv_key: Option<KeyReference>,
	pub early_mutual_authentication: bool,
	pub ratification_requested: bool,
	pub pin_verification_plain: bool,
	pub sv_negative_balance_allowed: bool,
	pub sv_logs_enabled: bool,
	/// Resolves the `isExtendedModeSupported` design note (spec §9): a
	/// per-transaction field instead of a latent static.
	pub extended_mode_supported: bool,
}

impl SecuritySetting {
	pub fn builder() -> SecuritySettingBuilder {
		SecuritySettingBuilder::default()
	}

	/// Resolves a KIF of `0xFF` ("use default KIF for this access level",
	/// spec §4.3) against the KVC-specific override table, then the
	/// per-level default, leaving any other KIF value untouched.
	pub fn resolve_kif(&self, level: WriteAccessLevel, kif: u8, kvc: u8) -> u8 {
		if kif != 0xFF {
			return kif;
		}
		if let Some(&override_kif) = self.kif_by_kvc_overrides.get(&(level, kvc)) {
			return override_kif;
		}
		self.default_keys.get(&level).map_or(kif, |key| key.kif)
	}

	pub fn default_key_for(&self, level: WriteAccessLevel) -> Option<KeyReference> {
		self.default_keys.get(&level).copied()
	}

	/// Whether `(kif, kvc)` is in the authorised session-key set. An empty
	/// set means "no restriction" (every key is accepted) — this matches
	/// the common case of a terminal that trusts whatever key the card
	/// names, only locking down the set when the deployment calls for it.
	pub fn is_session_key_authorized(&self, kif: u8, kvc: u8) -> bool {
		self.authorized_session_keys.is_empty() || self.authorized_session_keys.contains(&(kif, kvc))
	}

	pub fn pin_ciphering_key(&self) -> Option<KeyReference> {
		self.pin_ciphering_key
	}

	pub fn sv_key(&self) -> Option<KeyReference> {
		self.sv_key
	}
}

/// A fluent builder for [`SecuritySetting`], in the same consuming-`self`
/// style as the teacher's own small builder methods (e.g.
/// `ColourChoice::change_based_on_tty`).
#[derive(Clone, Debug, Default)]
pub struct SecuritySettingBuilder {
	setting: SecuritySetting,
}

impl SecuritySettingBuilder {
	#[must_use]
	pub fn default_key(mut self, level: WriteAccessLevel, key: KeyReference) -> Self {
		self.setting.default_keys.insert(level, key);
		self
	}

	#[must_use]
	pub fn kif_override(mut self, level: WriteAccessLevel, kvc: u8, kif: u8) -> Self {
		self.setting.kif_by_kvc_overrides.insert((level, kvc), kif);
		self
	}

	#[must_use]
	pub fn authorize_session_key(mut self, key: KeyReference) -> Self {
		self.setting.authorized_session_keys.insert((key.kif, key.kvc));
		self
	}

	#[must_use]
	pub fn pin_ciphering_key(mut self, key: KeyReference) -> Self {
		self.setting.pin_ciphering_key = Some(key);
		self
	}

	#[must_use]
	pub fn sv_key(mut self, key: KeyReference) -> Self {
		self.setting.sv_key = Some(key);
		self
	}

	#[must_use]
	pub fn early_mutual_authentication(mut self, enabled: bool) -> Self {
		self.setting.early_mutual_authentication = enabled;
		self
	}

	#[must_use]
	pub fn ratification_requested(mut self, enabled: bool) -> Self {
		self.setting.ratification_requested = enabled;
		self
	}

	#[must_use]
	pub fn pin_verification_plain(mut self, enabled: bool) -> Self {
		self.setting.pin_verification_plain = enabled;
		self
	}

	#[must_use]
	pub fn sv_negative_balance_allowed(mut self, enabled: bool) -> Self {
		self.setting.sv_negative_balance_allowed = enabled;
		self
	}

	#[must_use]
	pub fn sv_logs_enabled(mut self, enabled: bool) -> Self {
		self.setting.sv_logs_enabled = enabled;
		self
	}

	#[must_use]
	pub fn extended_mode_supported(mut self, enabled: bool) -> Self {
		self.setting.extended_mode_supported = enabled;
		self
	}

	pub fn build(self) -> SecuritySetting {
		self.setting
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolve_kif_default_for_0xff() {
		let setting = SecuritySetting::builder()
			.default_key(WriteAccessLevel::Debit, KeyReference::new(0x21, 0x79))
			.build();
		assert_eq!(setting.resolve_kif(WriteAccessLevel::Debit, 0xFF, 0x79), 0x21);
		assert_eq!(setting.resolve_kif(WriteAccessLevel::Debit, 0x30, 0x79), 0x30);
	}

	#[test]
	fn resolve_kif_kvc_override_wins() {
		let setting = SecuritySetting::builder()
			.default_key(WriteAccessLevel::Debit, KeyReference::new(0x21, 0x79))
			.kif_override(WriteAccessLevel::Debit, 0x7A, 0x22)
			.build();
		assert_eq!(setting.resolve_kif(WriteAccessLevel::Debit, 0xFF, 0x7A), 0x22);
	}

	#[test]
	fn empty_authorized_set_allows_any_key() {
		let setting = SecuritySetting::builder().build();
		assert!(setting.is_session_key_authorized(0x21, 0x79));
	}

	#[test]
	fn nonempty_authorized_set_restricts() {
		let setting = SecuritySetting::builder()
			.authorize_session_key(KeyReference::new(0x21, 0x79))
			.build();
		assert!(setting.is_session_key_authorized(0x21, 0x79));
		assert!(!setting.is_session_key_authorized(0x21, 0x7A));
	}
}
