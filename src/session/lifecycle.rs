use serde::{Deserialize, Serialize};
use statig::prelude::*;

use crate::workflows::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPhase {
    Vacant,
    Authenticating,
    Ready,
    Failed,
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    BeginAuth,
    Authenticated { attempts: u32 },
    Exhausted { attempts: u32, reason: String },
    Released,
}

/// Lifecycle of one role's cached session
#[derive(Debug)]
pub struct SessionSlot {
    pub role: Role,
    phase: SlotPhase,
    attempts: u32,
    last_error: Option<String>,
    generation: u32,
}

impl SessionSlot {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            phase: SlotPhase::Vacant,
            attempts: 0,
            last_error: None,
            generation: 0,
        }
    }

    pub fn phase(&self) -> SlotPhase {
        self.phase
    }

    /// Attempts spent on the most recent authentication
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of sessions this slot has handed out
    pub fn generation(&self) -> u32 {
        self.generation
    }

    fn begin(&mut self) {
        self.attempts = 0;
        self.last_error = None;
        self.phase = SlotPhase::Authenticating;
        tracing::debug!(role = %self.role, "Session authentication started");
    }
}

#[state_machine(initial = "State::vacant()")]
impl SessionSlot {
    #[state]
    fn vacant(&mut self, event: &SlotEvent) -> Outcome<State> {
        match event {
            SlotEvent::BeginAuth => {
                self.begin();
                Transition(State::authenticating())
            }
            _ => Handled,
        }
    }

    #[state]
    fn authenticating(&mut self, event: &SlotEvent) -> Outcome<State> {
        match event {
            SlotEvent::Authenticated { attempts } => {
                self.attempts = *attempts;
                self.generation += 1;
                self.phase = SlotPhase::Ready;
                tracing::info!(
                    role = %self.role,
                    attempts = attempts,
                    generation = self.generation,
                    "Session ready"
                );
                Transition(State::ready())
            }
            SlotEvent::Exhausted { attempts, reason } => {
                self.attempts = *attempts;
                self.last_error = Some(reason.clone());
                self.phase = SlotPhase::Failed;
                tracing::error!(role = %self.role, attempts = attempts, reason = %reason, "Session authentication failed");
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn ready(&mut self, event: &SlotEvent) -> Outcome<State> {
        match event {
            SlotEvent::Released => {
                self.phase = SlotPhase::Released;
                tracing::info!(role = %self.role, "Session released");
                Transition(State::released())
            }
            _ => Handled,
        }
    }

    #[state]
    fn failed(&mut self, event: &SlotEvent) -> Outcome<State> {
        match event {
            SlotEvent::BeginAuth => {
                self.begin();
                Transition(State::authenticating())
            }
            SlotEvent::Released => {
                self.phase = SlotPhase::Released;
                Transition(State::released())
            }
            _ => Handled,
        }
    }

    #[state]
    fn released(&mut self, event: &SlotEvent) -> Outcome<State> {
        match event {
            SlotEvent::BeginAuth => {
                self.begin();
                Transition(State::authenticating())
            }
            _ => Handled,
        }
    }
}
