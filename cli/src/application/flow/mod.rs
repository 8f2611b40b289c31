//! Flows sequence stages within one phase; the aggregate chains phases.
//!
//! Transitions are exhaustive matches on [`Phase`]. A stage from another
//! flow is a [`FlowError::UnexpectedStage`] defect, never a soft failure.
//!
//! [`Phase`]: crate::application::stage::Phase

use crate::application::context::StageContext;
use crate::application::stage::Stage;
use crate::domain::error::FlowError;

mod aggregate;
mod deploy;
mod provision;

pub use aggregate::AggregateFlow;
pub use deploy::ComposeDeployFlow;
pub use provision::InstanceProvisionFlow;

pub trait Flow: Send + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// First stage of this flow, built from its captured parameters.
    ///
    /// # Errors
    ///
    /// Flow-specific contract violations.
    fn initial_stage(&self, ctx: &StageContext) -> Result<Stage, FlowError>;

    /// Stage following `current`, or `None` once this flow is finished.
    ///
    /// # Errors
    ///
    /// [`FlowError::UnexpectedStage`] when `current` does not belong to this
    /// flow, [`FlowError::MissingOutcome`] when it finished without the result
    /// the next stage needs.
    fn next_stage(&self, ctx: &StageContext, current: &Stage)
    -> Result<Option<Stage>, FlowError>;
}
