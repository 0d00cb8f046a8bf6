//! Console rendering of routing decisions and agent output

use std::io::Write;

use switchyard_core::{AgentResponse, ExecutionFailure, Reporter, RoutingDecision, RoutingFailure};

const RULE: &str = "----------------------";

/// Writes human-readable progress to any `Write` (stdout in practice)
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    // Console output is best-effort; a closed stdout must not abort the run.
    fn line(&mut self, text: impl std::fmt::Display) {
        let _ = writeln!(self.out, "{}", text);
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn routed(&mut self, query: &str, decision: &RoutingDecision) {
        match &decision.failure {
            Some(RoutingFailure::InvalidKey(raw)) => {
                self.line(format!("\n[Routing Fallback] Model returned invalid key: {}", raw));
            }
            Some(failure @ RoutingFailure::Oracle(_)) => {
                self.line(format!("\n[Routing Error] {}", capitalize(&failure.to_string())));
            }
            None => {}
        }
        self.line(format!("\n[User Query] -> {}", query));
        self.line(format!("[Agent Routed To] -> {}", decision.key));
        self.line(RULE);
    }

    fn responded(&mut self, response: &AgentResponse) {
        self.line("\n--- [Agent Output] ---");
        if response.requires_tools() {
            self.line("-> Tool Calls Required:");
            for call in &response.tool_calls {
                self.line(format!("  - Function: {}, Args: {}", call.name, call.args));
            }
            self.line("\n[Final Answer]: (Model Response after tool indication)");
        } else {
            self.line("-> Handled by Instruction Only (No tool required)");
        }
        self.line(format!("\n{}", response.text));
        self.line(RULE);
    }

    fn failed(&mut self, failure: &ExecutionFailure) {
        self.line(format!("\n[Execution Error] {}", failure));
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
