//! Sequential stage executor
//!
//! A pipeline is an ordered slice of [`Stage`]s run over one exclusively
//! owned context. The first failing stage stops the run; the context is
//! handed back either way so callers can inspect partial state.

use bakepay_core::error::Result;
use tracing::{debug, warn};

/// Named step of a pipeline
pub struct Stage<C, O> {
    pub name: &'static str,
    pub run: fn(&mut C, &O) -> Result<()>,
}

impl<C, O> Stage<C, O> {
    pub fn new(name: &'static str, run: fn(&mut C, &O) -> Result<()>) -> Self {
        Self { name, run }
    }
}

impl<C, O> Clone for Stage<C, O> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, O> Copy for Stage<C, O> {}

/// `stage!(path::to::function)` names the stage after the function
#[macro_export]
macro_rules! stage {
    ($run:path) => {{
        let path: &'static str = stringify!($run);
        let name = path.rsplit("::").next().unwrap_or(path).trim();
        $crate::stages::Stage::new(name, $run)
    }};
}

/// Result of running a pipeline
pub struct StageOutcome<C> {
    pub context: C,
    pub result: Result<()>,
    /// Name of the stage that failed
    pub failed_stage: Option<&'static str>,
}

impl<C> StageOutcome<C> {
    pub fn into_parts(self) -> (C, Result<()>) {
        (self.context, self.result)
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Owns a context while stages run over it
pub struct StageRunner<C> {
    context: C,
}

impl<C> StageRunner<C> {
    pub fn wrap(context: C) -> Self {
        Self { context }
    }

    pub fn execute_stages<O>(mut self, options: &O, stages: &[Stage<C, O>]) -> StageOutcome<C> {
        for stage in stages {
            debug!(stage = stage.name, "running stage");
            if let Err(e) = (stage.run)(&mut self.context, options) {
                warn!(stage = stage.name, error = %e, "stage failed");
                return StageOutcome {
                    context: self.context,
                    result: Err(e),
                    failed_stage: Some(stage.name),
                };
            }
        }
        StageOutcome {
            context: self.context,
            result: Ok(()),
            failed_stage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bakepay_core::error::PayoutError;

    #[derive(Default)]
    struct Counter {
        visited: Vec<&'static str>,
    }

    fn first(ctx: &mut Counter, _: &()) -> Result<()> {
        ctx.visited.push("first");
        Ok(())
    }

    fn failing(ctx: &mut Counter, _: &()) -> Result<()> {
        ctx.visited.push("failing");
        Err(PayoutError::MissingPayoutBlueprint)
    }

    fn never(ctx: &mut Counter, _: &()) -> Result<()> {
        ctx.visited.push("never");
        Ok(())
    }

    #[test]
    fn test_runs_in_order() {
        let outcome = StageRunner::wrap(Counter::default())
            .execute_stages(&(), &[stage!(first), Stage::new("again", first)]);
        assert!(outcome.is_ok());
        assert_eq!(outcome.context.visited, vec!["first", "first"]);
    }

    #[test]
    fn test_stops_at_first_error_and_keeps_context() {
        let outcome = StageRunner::wrap(Counter::default())
            .execute_stages(&(), &[stage!(first), stage!(failing), stage!(never)]);
        assert_eq!(outcome.failed_stage, Some("failing"));
        let (context, result) = outcome.into_parts();
        assert!(matches!(result, Err(PayoutError::MissingPayoutBlueprint)));
        assert_eq!(context.visited, vec!["first", "failing"]);
    }

    #[test]
    fn test_stage_macro_strips_module_path() {
        let stage: Stage<Counter, ()> = stage!(self::first);
        assert_eq!(stage.name, "first");
    }
}
