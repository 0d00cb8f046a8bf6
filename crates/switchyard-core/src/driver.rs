//! Sequential driver: route, execute and report one query at a time

use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::error::{ExecutionFailure, InstructionError};
use crate::executor::{AgentResponse, ExecutorConfig, execute_query};
use crate::instructions::InstructionMap;
use crate::providers::LlmProvider;
use crate::router::{RouterConfig, RoutingDecision, route_query};

/// Queries exercised by `run`, one per specialist plus planner cases
pub const SAMPLE_QUERIES: &[&str] = &[
    "What is the capital city of Pakistan?",
    "Write a Python script to calculate the factorial of number 7 and execute it.",
    "What are the common symptoms and initial treatment for Parvovirus in puppies?",
    "First, summarize the article at https://en.wikipedia.org/wiki/Veterinary_medicine, and then run a Python script to print the word 'Veterinarian'.",
    "How is the open-source tool Aircrack-ng ethically used by security professionals to test WiFi security?",
    "What are the security best practices for setting up SSH access through a gateway server?",
    "Suggest three creative concepts for a social media campaign promoting a free Parvovirus screening camp.",
    "Explain the purpose of BitLocker and how it protects data on a Windows system.",
    "What are the advantages of using smart motion sensors alongside IP cameras for home security?",
    "Provide guidance on using server-side receipt validation to prevent subscription fraud in mobile apps.",
    "How can I use an RTL-SDR dongle and GNU Radio to capture and analyze FM radio signals?",
    "Describe how the VLC player can be used to decode DVB-T streams for analysis.",
    "Explain how the Lynis tool can improve self-security auditing on a Linux system.",
];

/// Receives progress for each query as it is processed
pub trait Reporter {
    fn routed(&mut self, query: &str, decision: &RoutingDecision);
    fn responded(&mut self, response: &AgentResponse);
    fn failed(&mut self, failure: &ExecutionFailure);
}

/// Result of one query
#[derive(Debug)]
pub struct QueryOutcome {
    pub key: String,
    pub fell_back: bool,
    pub result: Result<AgentResponse, ExecutionFailure>,
}

/// Counts for a finished (or interrupted) run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub routed_to_fallback: usize,
    pub failed: usize,
    pub interrupted: bool,
}

/// Everything needed to process queries: the provider, the instruction map
/// and the routing/execution settings. Built once and passed by reference.
pub struct Switchyard {
    provider: Box<dyn LlmProvider>,
    instructions: InstructionMap,
    router: RouterConfig,
    executor: ExecutorConfig,
}

impl Switchyard {
    /// Fails if the fallback key is not in the instruction map
    pub fn new(
        provider: Box<dyn LlmProvider>,
        instructions: InstructionMap,
        router: RouterConfig,
        executor: ExecutorConfig,
    ) -> Result<Self, InstructionError> {
        instructions.require(&router.fallback_key)?;
        if !instructions.contains(&executor.creative_key) {
            info!(
                "Creative key {} is not in the instruction map; {} will never be used",
                executor.creative_key, executor.creative_model
            );
        }
        Ok(Self {
            provider,
            instructions,
            router,
            executor,
        })
    }

    pub fn instructions(&self) -> &InstructionMap {
        &self.instructions
    }

    pub async fn route(&self, query: &str) -> RoutingDecision {
        route_query(self.provider.as_ref(), &self.instructions, &self.router, query).await
    }

    pub async fn execute(&self, key: &str, query: &str) -> Result<AgentResponse, ExecutionFailure> {
        execute_query(
            self.provider.as_ref(),
            &self.instructions,
            &self.executor,
            key,
            query,
        )
        .await
    }

    /// Route then execute a single query, reporting both steps
    pub async fn process(&self, query: &str, reporter: &mut dyn Reporter) -> QueryOutcome {
        let span = info_span!("query", id = %Uuid::new_v4());
        async {
            let decision = self.route(query).await;
            reporter.routed(query, &decision);

            let result = self.execute(&decision.key, query).await;
            match &result {
                Ok(response) => reporter.responded(response),
                Err(failure) => {
                    error!("Abandoning query: {}", failure);
                    reporter.failed(failure);
                }
            }

            QueryOutcome {
                fell_back: decision.is_fallback(),
                key: decision.key,
                result,
            }
        }
        .instrument(span)
        .await
    }

    /// Process queries in order until done or cancelled. A cancelled
    /// in-flight query is abandoned without a report.
    pub async fn run(
        &self,
        queries: &[&str],
        reporter: &mut dyn Reporter,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        for query in queries {
            if cancel.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    summary.interrupted = true;
                    break;
                }
                outcome = self.process(query, &mut *reporter) => outcome,
            };

            summary.processed += 1;
            if outcome.fell_back {
                summary.routed_to_fallback += 1;
            }
            if outcome.result.is_err() {
                summary.failed += 1;
            }
        }

        info!(
            "Run finished: {} processed, {} routed to fallback, {} failed, interrupted={}",
            summary.processed, summary.routed_to_fallback, summary.failed, summary.interrupted
        );
        summary
    }
}
