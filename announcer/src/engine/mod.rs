pub mod announcement;
pub mod channel;
pub mod presenter;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod timers;
