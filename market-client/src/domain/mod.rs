pub mod capacity;
pub mod event;
pub mod generation;
pub mod region;
pub mod user;

pub use capacity::CapacityTable;
pub use event::EventMessage;
pub use generation::{psr_type_name, GenerationPoint, GenerationSeries};
pub use region::Region;
pub use user::User;
