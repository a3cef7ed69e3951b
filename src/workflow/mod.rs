//! Curation workflow
//!
//! Pure decision logic of the source lifecycle. Nothing in here touches the
//! store: every function takes the rows it decides on and returns what has to
//! change, and the store applies that change atomically.
//!
//! 1. **Engine**: source creation, voting round resolution, contract state
//!    changes feeding back into the source
//! 2. **Contract**: edits and one-time contract number assignment
//! 3. **Intake**: who may own a newly proposed source

pub mod contract;
pub mod engine;
pub mod intake;

pub use contract::{ContractEdit, ContractEditPlan, NumberAssignment};
pub use engine::{RoundOutcome, WorkflowEngine, WorkflowTables};
pub use intake::{intake_for, SourceIntake};
