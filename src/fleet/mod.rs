// Motor fleet: the slot table, startup discovery and leader/follower configuration

mod discovery;
mod graph;
mod table;

pub use discovery::discover;
pub use graph::ConfigError;
pub use table::{slot_name, Feedback, Motor, MotorTable};
