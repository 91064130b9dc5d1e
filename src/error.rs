//! The error taxonomy returned by every fallible boundary in the crate.

// Uses
use std::fmt::{self, Display, Formatter};

/// The kind of failure behind a [`CalypsoError`].
///
/// This is a taxonomy, not a set of distinct error types — every variant
/// ends up wrapped in the same [`CalypsoError`] envelope so command
/// sequencing code can match on `kind` without caring which layer raised it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
	// Protocol
	/// The number of responses returned by the reader didn't match the
	/// number of requests sent.
	DesynchronizedExchanges,
	/// A status word wasn't present in the command's status-word table and
	/// wasn't `0x9000`.
	UnknownStatus,
	/// A response's data field was a different length than the command
	/// expected.
	UnexpectedResponseLength,

	// Card
	/// The PO refused access to requested data (SW `0x6A88`/`0x6A82`/etc.).
	CardDataAccess,
	/// A security condition on the PO wasn't satisfied (SW `0x6982`).
	CardSecurityContext,
	/// The PO forbade the operation outright (SW `0x6985`).
	CardAccessForbidden,
	/// The command's parameters were rejected by the PO (SW `0x6A80`).
	CardIllegalParameter,
	/// The session modification buffer would have overflowed (SW `0x6400`).
	CardSessionBufferOverflow,
	/// The PIN is blocked (zero attempts remain).
	CardPinBlocked,
	/// The PIN was wrong; carries the number of attempts remaining.
	CardPinAttemptsRemaining(u8),
	/// The PO has been invalidated (SW `0x6283`).
	CardTerminated,
	/// A PKI-related command failed on the card side.
	CardPki,

	// SAM
	/// The SAM refused access to requested data.
	SamDataAccess,
	/// The SAM forbade the operation outright.
	SamAccessForbidden,
	/// The SAM rejected the command's parameters.
	SamIllegalParameter,
	/// The SAM rejected the command's input data as incorrectly formed.
	SamIncorrectInputData,
	/// A MAC or signature check performed by the SAM failed.
	SamSecurityData,
	/// The SAM is busy with another security context.
	SamSecurityContext,
	/// A SAM counter (e.g. SV transaction number) would overflow.
	SamCounterOverflow,

	// Engine
	/// The SV command manager's mini state machine was driven out of order.
	DesynchronizedCommands,
	/// An operation requiring an open secure session was attempted while
	/// none was open.
	SessionNotOpen,
	/// A second open was attempted while a session was already open.
	SessionAlreadyOpen,
	/// The crypto service façade to the SAM couldn't be reached.
	CryptoServiceUnavailable,
	/// A response couldn't be parsed into the card image at all (malformed
	/// data, not a status-word failure).
	CardAnomaly,
}

impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::DesynchronizedExchanges => "desynchronized exchanges",
			Self::UnknownStatus => "unknown status word",
			Self::UnexpectedResponseLength => "unexpected response length",
			Self::CardDataAccess => "card data access error",
			Self::CardSecurityContext => "card security context error",
			Self::CardAccessForbidden => "card access forbidden",
			Self::CardIllegalParameter => "card illegal parameter",
			Self::CardSessionBufferOverflow => "card session buffer overflow",
			Self::CardPinBlocked => "card PIN blocked",
			Self::CardPinAttemptsRemaining(_) => "card PIN incorrect",
			Self::CardTerminated => "card terminated",
			Self::CardPki => "card PKI error",
			Self::SamDataAccess => "SAM data access error",
			Self::SamAccessForbidden => "SAM access forbidden",
			Self::SamIllegalParameter => "SAM illegal parameter",
			Self::SamIncorrectInputData => "SAM incorrect input data",
			Self::SamSecurityData => "SAM security data error (MAC/signature)",
			Self::SamSecurityContext => "SAM security context busy",
			Self::SamCounterOverflow => "SAM counter overflow",
			Self::DesynchronizedCommands => "desynchronized commands",
			Self::SessionNotOpen => "no secure session is open",
			Self::SessionAlreadyOpen => "a secure session is already open",
			Self::CryptoServiceUnavailable => "crypto service unavailable",
			Self::CardAnomaly => "card anomaly",
		})
	}
}

/// The error type returned by every fallible operation in the crate.
///
/// Carries enough context (per spec §7) for an application to decide
/// whether to retry with a fresh selection: the [`ErrorKind`], a
/// human-readable message, the name of the command that raised it, and the
/// status word if one was involved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CalypsoError {
	pub kind: ErrorKind,
	pub message: String,
	pub command_name: &'static str,
	pub status_word: Option<u16>,
}

impl CalypsoError {
	pub fn new(
		kind: ErrorKind,
		message: impl Into<String>,
		command_name: &'static str,
		status_word: Option<u16>,
	) -> Self {
		Self {
			kind,
			message: message.into(),
			command_name,
			status_word,
		}
	}

	/// Builds an engine-level error with no associated command or status
	/// word — sequencing/programming errors raised before any APDU is
	/// built.
	pub fn engine(kind: ErrorKind, message: impl Into<String>) -> Self {
		Self::new(kind, message, "<none>", None)
	}
}

impl Display for CalypsoError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self.status_word {
			Some(sw) => write!(
				f,
				"{} ({}, SW={:04X}): {}",
				self.command_name, self.kind, sw, self.message
			),
			None => write!(f, "{} ({}): {}", self.command_name, self.kind, self.message),
		}
	}
}

impl std::error::Error for CalypsoError {}

/// A `Result` alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CalypsoError>;
