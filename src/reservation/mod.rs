pub mod actor;
pub mod inventory;
pub mod messages;
pub mod path;
pub mod pledge;
pub mod request;

pub use inventory::Inventory;
pub use path::Path;
pub use pledge::{Pledge, PledgeKind};
pub use request::CoreRequest;
