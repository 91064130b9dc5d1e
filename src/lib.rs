//! A library implementing the core of a Calypso smart-card secure-session
//! transaction engine: it builds, sequences and interprets ISO 7816-4 APDU
//! exchanges to realise authenticated, integrity-protected read/write
//! transactions against a Calypso PO's file system and Stored-Value purse,
//! via a companion SAM holding the symmetric master keys.
//!
//! The physical reader transport, card selection, configuration loading, and
//! the SAM's internal cryptography are all external collaborators this crate
//! only reaches through a trait boundary — see [`reader::CardTransceiver`]
//! and [`crypto::SamTransceiver`].

// Linting Rules
#![warn(
	clippy::complexity,
	clippy::correctness,
	clippy::pedantic,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::clone_on_ref_ptr,
	clippy::dbg_macro,
	clippy::exit,
	clippy::if_then_some_else_none,
	clippy::self_named_module_files,
	clippy::str_to_string,
	clippy::undocumented_unsafe_blocks,
	clippy::wildcard_enum_match_arm
)]
#![allow(
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::doc_markdown,
	clippy::module_name_repetitions,
	clippy::similar_names,
	clippy::struct_excessive_bools,
	clippy::too_many_lines,
	clippy::unnecessary_wraps
)]

// Modules
mod macros;
mod testing_macros;

pub mod apdu;
pub mod card;
pub mod catalog;
pub mod command;
pub mod crypto;
pub mod error;
pub mod reader;
pub mod sam;
pub mod session;
pub mod transaction;
pub mod util;

// Public Exports
pub use crate::{
	error::{CalypsoError, ErrorKind, Result},
	transaction::{PinOutcome, TransactionManager},
};
