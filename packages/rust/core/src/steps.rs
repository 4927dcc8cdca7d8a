//! The 8 named pipeline steps, in execution order.

use ideaforge_shared::AnalysisStep;

/// Step ids used throughout the orchestrator and evidence timings.
pub const STEP_RESOLVE: &str = "resolve";
pub const STEP_CONTENT: &str = "content";
pub const STEP_THEME: &str = "theme";
pub const STEP_PRESS: &str = "press";
pub const STEP_NEWS: &str = "news";
pub const STEP_PRODUCTS: &str = "products";
pub const STEP_BUNDLE: &str = "bundle";
pub const STEP_GENERATE: &str = "generate";

/// (id, label) for every step, in pipeline order.
pub const STEP_DEFS: &[(&str, &str)] = &[
    (STEP_RESOLVE, "Resolve the subject"),
    (STEP_CONTENT, "Read the company site"),
    (STEP_THEME, "Sample the brand theme"),
    (STEP_PRESS, "Discover press pages"),
    (STEP_NEWS, "Search the news index"),
    (STEP_PRODUCTS, "Scan the product landscape"),
    (STEP_BUNDLE, "Assemble the evidence bundle"),
    (STEP_GENERATE, "Generate prototype ideas"),
];

/// The initial step list for a new job: all 8 steps, all pending.
pub fn initial_steps() -> Vec<AnalysisStep> {
    STEP_DEFS
        .iter()
        .map(|(id, label)| AnalysisStep::pending(*id, *label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaforge_shared::StepStatus;

    #[test]
    fn initial_step_list_has_exactly_eight_pending_steps() {
        let steps = initial_steps();
        assert_eq!(steps.len(), 8);
        assert!(steps.iter().all(|s| s.status == StepStatus::Pending));
        assert_eq!(steps[0].id, STEP_RESOLVE);
        assert_eq!(steps[7].id, STEP_GENERATE);
    }
}
