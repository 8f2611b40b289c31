//! Chains flows so one job runs them back to back.

use tracing::debug;

use super::Flow;
use crate::application::context::StageContext;
use crate::application::stage::Stage;
use crate::domain::error::FlowError;

/// Ordered flows plus a cursor that only moves forward.
///
/// One aggregate belongs to exactly one job.
#[derive(Debug)]
pub struct AggregateFlow {
    flows: Vec<Box<dyn Flow>>,
    cursor: usize,
}

impl AggregateFlow {
    /// # Errors
    ///
    /// [`FlowError::Empty`] when `flows` is empty.
    pub fn new(flows: Vec<Box<dyn Flow>>) -> Result<Self, FlowError> {
        if flows.is_empty() {
            return Err(FlowError::Empty);
        }
        Ok(Self { flows, cursor: 0 })
    }

    #[must_use]
    pub fn single(flow: impl Flow + 'static) -> Self {
        Self {
            flows: vec![Box::new(flow)],
            cursor: 0,
        }
    }

    /// Append `flow` after the existing ones.
    #[must_use]
    pub fn then(mut self, flow: impl Flow + 'static) -> Self {
        self.flows.push(Box::new(flow));
        self
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn flow_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.flows.iter().map(|f| f.name())
    }

    /// # Errors
    ///
    /// [`FlowError::InvalidState`] once the cursor has left the first flow.
    pub fn initial_stage(&self, ctx: &StageContext) -> Result<Stage, FlowError> {
        if self.cursor != 0 {
            return Err(FlowError::InvalidState {
                cursor: self.cursor,
            });
        }
        self.flows
            .first()
            .ok_or(FlowError::Empty)?
            .initial_stage(ctx)
    }

    /// Ask the current flow for its next stage; when it is finished, advance
    /// the cursor and start the following flow.
    ///
    /// # Errors
    ///
    /// Propagates the current flow's transition errors.
    pub fn next_stage(
        &mut self,
        ctx: &StageContext,
        current: &Stage,
    ) -> Result<Option<Stage>, FlowError> {
        let Some(flow) = self.flows.get(self.cursor) else {
            return Ok(None);
        };
        if let Some(next) = flow.next_stage(ctx, current)? {
            return Ok(Some(next));
        }
        self.cursor += 1;
        let Some(flow) = self.flows.get(self.cursor) else {
            return Ok(None);
        };
        debug!(cursor = self.cursor, flow = flow.name(), "advancing to next flow");
        flow.initial_stage(ctx).map(Some)
    }
}
