pub mod list;
pub mod queue;
