pub mod defaults;
pub mod gear;
pub mod member;
pub mod session;
pub mod studio;

pub use defaults::StudioDefaults;
pub use gear::GearAssignment;
pub use member::Member;
pub use session::{SessionStatus, StudioSession};
pub use studio::Studio;
