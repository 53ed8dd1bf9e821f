//! Reminders: the entity, trigger arithmetic, persistence, and the engine
//! that drives the fire/snooze/cancel/promote/reconcile state machine.

pub mod engine;
pub mod error;
pub mod schedule;
pub mod store;
pub mod types;

pub use engine::{FireOutcome, IgnoreReason, ReconcileReport, ReminderEngine};
pub use error::ReminderError;
pub use types::{alarm_id, NewReminder, Reminder, ReminderKind};
