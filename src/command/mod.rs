//! Command objects: one builder/parser pair per catalog entry (spec §2.3,
//! §9's "flat set of tagged variants" redesign of the original's deep
//! builder/parser class hierarchy).
//!
//! Each [`po::PoCommand`]/[`sam::SamCommand`] variant carries its own typed
//! inputs; [`po::PoCommand::build_request`]/[`po::PoCommand::parse_response`]
//! (and the `sam` equivalents) are the single non-virtual dispatch points
//! `TransactionManager` and `SymmetricCryptoService` call through.

// Modules
pub mod po;
pub mod sam;

// Public Exports
pub use self::{
	po::{GetDataTag, PoCommand, PoOutcome},
	sam::{SamCommand, SamOutcome},
};
