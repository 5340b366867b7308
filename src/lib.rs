//! Agent-based simulation of criminal cases flowing from investigation,
//! through the courts, to conviction or dismissal.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod error;
pub mod population;
pub mod simulation;
pub mod state;
pub mod trajectory;
pub mod transitions;
pub mod types;
