//! The secure-session book-keeping (`SessionContext`) and the prepared-
//! command queue with its SV mini-state-machine (`CommandManager`), owned
//! exclusively by [`crate::transaction::TransactionManager`] (spec §3).

// Modules
mod command_manager;

// Public Exports
pub use self::command_manager::CommandManager;

// Uses
use crate::catalog::WriteAccessLevel;

/// Card-side session limits this crate enforces locally (spec §3: "typically
/// 215 bytes for PRIME_REV3").
pub const DEFAULT_SESSION_BUFFER_LIMIT: usize = 215;

/// Book-keeping for one open secure session: write-access level, the
/// modification-buffer byte count, the digest dialogue's open/closed state,
/// and whatever `dataOut` the pre-open batch cached before the session was
/// confirmed open.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
	open: bool,
	access_level: Option<WriteAccessLevel>,
	modification_buffer_bytes: usize,
	buffer_limit: usize,
	digest_initialized: bool,
	encryption_active: bool,
	pre_open_data_out: Option<Vec<u8>>,
}

impl SessionContext {
	pub fn new(buffer_limit: usize) -> Self {
		Self {
			buffer_limit: if buffer_limit == 0 { DEFAULT_SESSION_BUFFER_LIMIT } else { buffer_limit },
			..Self::default()
		}
	}

	pub fn is_open(&self) -> bool {
		self.open
	}

	pub fn access_level(&self) -> Option<WriteAccessLevel> {
		self.access_level
	}

	pub fn open_session(&mut self, access_level: WriteAccessLevel) {
		self.open = true;
		self.access_level = Some(access_level);
		self.modification_buffer_bytes = 0;
		self.digest_initialized = true;
	}

	/// Accounts `byte_count` additional session-buffer bytes, failing if the
	/// card's limit would be exceeded (spec §4.5 step 5, SW `0x6400`
	/// surfaced locally rather than waiting on the card's own check).
	pub fn reserve_buffer_bytes(&mut self, byte_count: usize) -> Result<(), crate::error::CalypsoError> {
		let projected = self.modification_buffer_bytes + byte_count;
		if projected > self.buffer_limit {
			return Err(crate::error::CalypsoError::engine(
				crate::error::ErrorKind::CardSessionBufferOverflow,
				format!("session modification buffer would reach {projected} bytes, limit is {}", self.buffer_limit),
			));
		}
		self.modification_buffer_bytes = projected;
		Ok(())
	}

	pub fn modification_buffer_bytes(&self) -> usize {
		self.modification_buffer_bytes
	}

	pub fn set_encryption_active(&mut self, active: bool) {
		self.encryption_active = active;
	}

	pub fn encryption_active(&self) -> bool {
		self.encryption_active
	}

	pub fn cache_pre_open_data_out(&mut self, data_out: Vec<u8>) {
		self.pre_open_data_out = Some(data_out);
	}

	pub fn take_pre_open_data_out(&mut self) -> Option<Vec<u8>> {
		self.pre_open_data_out.take()
	}

	/// Resets to the closed state, as happens on `Close`/`Cancel`/abort
	/// (spec §3 — the session context is destroyed, not merely flagged).
	pub fn close(&mut self) {
		*self = Self::new(self.buffer_limit);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn buffer_overflow_is_rejected_before_accounting() {
		let mut ctx = SessionContext::new(10);
		ctx.open_session(WriteAccessLevel::Debit);
		assert!(ctx.reserve_buffer_bytes(8).is_ok());
		assert!(ctx.reserve_buffer_bytes(8).is_err());
		assert_eq!(ctx.modification_buffer_bytes(), 8);
	}

	#[test]
	fn close_resets_buffer_count() {
		let mut ctx = SessionContext::new(10);
		ctx.open_session(WriteAccessLevel::Load);
		ctx.reserve_buffer_bytes(5).unwrap();
		ctx.close();
		assert!(!ctx.is_open());
		assert_eq!(ctx.modification_buffer_bytes(), 0);
	}
}
