//! Triage orchestrator implementation.
//!
//! Runs the pipeline once, strictly in order:
//! fetch -> build prompt -> complete -> persist.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::completion::ResilientCompletionClient;
use crate::incident::{categorize, IncidentSource};
use crate::prompt::PromptBuilder;
use crate::report::{ReportSink, TriageReport};

use super::context::RunContext;
use super::types::{RunStage, TriageError, TriageOutcome};

/// Callback invoked on every stage transition.
pub type StageCallback = Arc<dyn Fn(RunStage) + Send + Sync>;

/// Sequences one triage run over its injected components.
pub struct TriageOrchestrator {
    context: RunContext,
    source: Arc<dyn IncidentSource>,
    prompt_builder: PromptBuilder,
    completion: ResilientCompletionClient,
    sink: Arc<dyn ReportSink>,
    on_stage: Option<StageCallback>,
}

impl TriageOrchestrator {
    pub fn new(
        context: RunContext,
        source: Arc<dyn IncidentSource>,
        completion: ResilientCompletionClient,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            context,
            source,
            prompt_builder: PromptBuilder::new(),
            completion,
            sink,
            on_stage: None,
        }
    }

    pub fn with_prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn with_stage_callback(mut self, callback: StageCallback) -> Self {
        self.on_stage = Some(callback);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Execute one run.
    ///
    /// An empty incident list is a successful [`TriageOutcome::NoIncidents`];
    /// no prompt is built and nothing is written.
    pub async fn run(&self) -> Result<TriageOutcome, TriageError> {
        info!(
            "Starting triage run {} (source: {}, model: {}, sink: {})",
            self.context.run_id(),
            self.source.name(),
            self.completion.model(),
            self.sink.name()
        );

        let result = self.run_stages().await;
        if let Err(e) = &result {
            self.transition(RunStage::Failed(e.stage()));
            error!(
                "Triage run {} failed during {} stage: {}",
                self.context.run_id(),
                e.stage(),
                e
            );
        }
        result
    }

    async fn run_stages(&self) -> Result<TriageOutcome, TriageError> {
        self.transition(RunStage::Fetching);
        let batch = self.source.fetch().await?;

        if batch.is_empty() {
            self.transition(RunStage::Skipped);
            info!("No high-priority incidents found, nothing to triage");
            return Ok(TriageOutcome::NoIncidents);
        }
        info!("Fetched {} high-priority incidents", batch.len());

        let breakdown = categorize(&batch);
        for (category, identifiers) in breakdown.groups() {
            info!("  {}: {}", category.label(), identifiers.len());
        }

        self.transition(RunStage::Building);
        let prompt = self.prompt_builder.build(&batch);
        debug!(
            "Built prompt with {} incident blocks ({} bytes)",
            prompt.incident_count(),
            prompt.len()
        );

        self.transition(RunStage::Completing);
        let completion = self.completion.complete(&prompt).await?;

        self.transition(RunStage::Persisting);
        let report = TriageReport::new(
            completion.text,
            self.context.now(),
            batch.len(),
            completion.model,
        );
        let missing = report.missing_sections();
        if !missing.is_empty() {
            warn!(
                "Summary is missing expected sections: {}",
                missing.join(", ")
            );
        }
        let location = self.sink.persist(&report).await?;

        self.transition(RunStage::Done);
        info!(
            "Triage run {} complete: {} incidents summarized in {} attempt(s)",
            self.context.run_id(),
            report.source_incident_count,
            completion.attempts
        );

        Ok(TriageOutcome::Reported { report, location })
    }

    fn transition(&self, stage: RunStage) {
        debug!("Run {} stage: {}", self.context.run_id(), stage);
        if let Some(callback) = &self.on_stage {
            callback(stage);
        }
    }
}
