//! Typed access-control model and the embargo rule engine.

mod evaluator;
mod node;

pub use evaluator::{EmbargoCategory, Verdict, allows_authenticated, classify};
pub use node::{AccessControlNode, AccessRule, Permission, Principal};
