pub mod recurrence;
pub mod reconcile;
pub mod schedule;
