//! In-memory world, self, goal, and planning models consulted by the cognitive cycle.

pub mod goal;
pub mod planner;
pub mod self_model;
pub mod world;

pub use goal::{Goal, GoalStack, GoalStatus, Horizon};
pub use planner::{Action, Plan, PlanStep, Planner};
pub use self_model::SelfModel;
pub use world::{simulate, Predictor, SimulationOutcome, WorldState};
