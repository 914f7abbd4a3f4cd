//! The step wizard: state, the step abstraction and the controller driving it

mod controller;
mod error;
mod state;
mod step;
mod view;

pub use controller::{AbortReason, ControllerStatus, RunMode, RunOutcome, StepController};
pub use error::{ErrorKind, StepError};
pub use state::{WizardState, LAST_STATE_KEY, SAVED_USERNAME_KEY, SESSION_KEY};
pub use step::{Step, StepContext, StepOutcome};
pub use view::{StepLine, StepMark, Summary, WizardView};
