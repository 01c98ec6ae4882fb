pub mod conflicts;
pub mod defaults;
pub mod gear;
pub mod schedule;
pub mod sessions;
