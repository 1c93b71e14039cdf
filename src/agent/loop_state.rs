//! Agent loop state management
//!
//! Tracks the round budget of the tool-calling loop and the step trace it
//! produces.

use crate::core::Step;

/// State of one run of the agent loop
#[derive(Debug, Clone)]
pub struct AgentLoopState {
    /// Rounds completed so far
    pub round: usize,
    /// Maximum LLM rounds allowed
    pub max_rounds: usize,
    /// Steps recorded so far, in order
    pub steps: Vec<Step>,
    /// Set once a response arrives without tool calls
    pub finished: bool,
}

impl AgentLoopState {
    /// Create a new loop state with the given round budget
    pub fn new(max_rounds: usize) -> Self {
        Self {
            round: 0,
            max_rounds,
            steps: Vec::new(),
            finished: false,
        }
    }

    /// Check if the loop should run another round
    pub fn should_continue(&self) -> bool {
        !self.finished && self.round < self.max_rounds
    }

    /// True when the budget ran out before a terminal response
    pub fn exhausted(&self) -> bool {
        !self.finished && self.round >= self.max_rounds
    }

    /// Increment the round counter
    pub fn next_round(&mut self) {
        self.round += 1;
    }

    pub fn record(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }


    pub fn into_steps(self) -> Vec<Step> {
        self.steps
    }
}
