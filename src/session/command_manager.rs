//! The prepared-command queue and the SV mini-state-machine (spec §4.4).

// Uses
use crate::{
	command::PoCommand,
	catalog::SvOperation,
	error::{CalypsoError, ErrorKind, Result},
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
enum SvState {
	#[default]
	None,
	GetDone(SvOperation),
	OpPrepared,
}

/// Holds the ordered list of commands prepared for the next processing
/// batch, plus the SV sub-protocol's `NONE → SV_GET_DONE → OP_PREPARED`
/// state (spec §4.4).
#[derive(Debug, Default)]
pub struct CommandManager {
	commands: Vec<PoCommand>,
	sv_state: SvState,
}

impl CommandManager {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn commands(&self) -> &[PoCommand] {
		&self.commands
	}

	pub fn is_empty(&self) -> bool {
		self.commands.is_empty()
	}

	/// Appends `command`, enforcing the SV mini-FSM when it's one of the SV
	/// variants. Returns before mutating the queue on any ordering
	/// violation — no partial state, no emitted APDU (spec §8 scenario 6).
	pub fn prepare(&mut self, command: PoCommand) -> Result<()> {
		match &command {
			PoCommand::SvGet { operation, .. } => {
				if !self.commands.is_empty() {
					return Err(CalypsoError::engine(
						ErrorKind::DesynchronizedCommands,
						"SV Get must be the first command in the batch",
					));
				}
				self.sv_state = SvState::GetDone(*operation);
			}
			PoCommand::SvReload { .. } | PoCommand::SvDebit { .. } | PoCommand::SvUndebit { .. } => {
				let operation = match &command {
					PoCommand::SvReload { .. } => SvOperation::Reload,
					PoCommand::SvDebit { .. } => SvOperation::Debit,
					PoCommand::SvUndebit { .. } => SvOperation::Undebit,
					_ => unreachable!(),
				};
				match self.sv_state {
					SvState::GetDone(expected) if expected == operation && self.commands.len() == 1 => {
						self.sv_state = SvState::OpPrepared;
					}
					_ => {
						return Err(CalypsoError::engine(
							ErrorKind::DesynchronizedCommands,
							"SV operation must directly follow a matching SV Get",
						));
					}
				}
			}
			_ => {}
		}
		self.commands.push(command);
		Ok(())
	}

	/// Clears the prepared-command queue and resets the SV FSM. The SV
	/// `SV Check` trigger lives in `TransactionManager::process_po_commands`
	/// itself, keyed off the `SvReload`/`SvDebit`/`SvUndebit` command whose
	/// response it is, rather than a flag read after the batch completes.
	pub fn notify_commands_processed(&mut self) {
		self.commands.clear();
		self.sv_state = SvState::default();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::SvOperation;

	fn sv_get(operation: SvOperation) -> PoCommand {
		PoCommand::SvGet { extended_mode: false, operation }
	}

	fn sv_debit() -> PoCommand {
		PoCommand::SvDebit {
			amount: 10,
			date: [0, 0],
			time: [0, 0],
			kvc: 0,
			p1: 0,
			p2: 0,
			sam_suffix: vec![],
		}
	}

	#[test]
	fn sv_debit_before_sv_get_is_rejected_scenario_6() {
		let mut manager = CommandManager::new();
		let result = manager.prepare(sv_debit());
		assert!(result.is_err());
		assert!(manager.is_empty());
	}

	#[test]
	fn matching_sv_get_then_debit_succeeds() {
		let mut manager = CommandManager::new();
		manager.prepare(sv_get(SvOperation::Debit)).unwrap();
		manager.prepare(sv_debit()).unwrap();
		assert_eq!(manager.commands().len(), 2);
	}

	#[test]
	fn mismatched_operation_is_rejected() {
		let mut manager = CommandManager::new();
		manager.prepare(sv_get(SvOperation::Reload)).unwrap();
		assert!(manager.prepare(sv_debit()).is_err());
	}

	#[test]
	fn notify_processed_clears_queue_and_resets_fsm() {
		let mut manager = CommandManager::new();
		manager.prepare(sv_get(SvOperation::Debit)).unwrap();
		manager.prepare(sv_debit()).unwrap();
		manager.notify_commands_processed();
		assert!(manager.is_empty());
		// FSM reset: a fresh SV Get is accepted again, proving `sv_state`
		// went back to `None` rather than staying `OpPrepared`.
		assert!(manager.prepare(sv_get(SvOperation::Reload)).is_ok());
	}
}
