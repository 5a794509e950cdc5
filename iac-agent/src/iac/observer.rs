//! Node lifecycle observers
//!
//! The controller reports every node it runs to a list of observers. Logging goes
//! through here instead of being hard-wired into the nodes.

use std::sync::atomic::{AtomicUsize, Ordering};

use iac_agent_sdk::{
    log_node_complete, log_node_complete_console, log_node_failed, log_node_start,
    log_node_start_console,
};

use crate::iac::machine::{Node, StepOutcome};
use crate::iac::types::WorkflowState;

pub trait WorkflowObserver: Send + Sync {
    /// Called before a node runs
    fn on_enter(&self, _node: Node, _state: &WorkflowState) {}

    /// Called after a node completed normally
    fn on_exit(&self, _node: Node, _state: &WorkflowState, _outcome: &StepOutcome) {}

    /// Called when a node ends the run with an error
    fn on_error(&self, _node: Node, _error: &str) {}
}

/// Emits structured `WorkflowLog` node events on stderr
#[derive(Debug, Default)]
pub struct EventLogObserver;

impl WorkflowObserver for EventLogObserver {
    fn on_enter(&self, node: Node, state: &WorkflowState) {
        log_node_start!(node.id(), node.label(), state.attempt_count);
    }

    fn on_exit(&self, node: Node, state: &WorkflowState, outcome: &StepOutcome) {
        log_node_complete!(node.id(), node.label(), state.attempt_count, outcome.summary());
    }

    fn on_error(&self, node: Node, error: &str) {
        log_node_failed!(node.id(), node.label(), error);
    }
}

/// Prints numbered step headers on stdout
#[derive(Debug, Default)]
pub struct ConsoleObserver {
    step: AtomicUsize,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowObserver for ConsoleObserver {
    fn on_enter(&self, node: Node, state: &WorkflowState) {
        let step = self.step.fetch_add(1, Ordering::SeqCst) + 1;
        if node == Node::Fix {
            log_node_start_console!(
                step,
                format!("{} (attempt {})", node.label(), state.attempt_count + 1),
                node.description()
            );
        } else {
            log_node_start_console!(step, node.label(), node.description());
        }
    }

    fn on_exit(&self, _node: Node, _state: &WorkflowState, _outcome: &StepOutcome) {
        log_node_complete_console!(self.step.load(Ordering::SeqCst));
    }
}
