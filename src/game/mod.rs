//! Game simulation modules

pub mod collision;
pub mod input;
pub mod map;
pub mod physics;
pub mod player;
pub mod registry;
pub mod room;
pub mod round;
pub mod scheduler;
pub mod snapshot;
pub mod tuning;

pub use input::Input;
pub use registry::{room_key, RoomRegistry, SharedRoom};
pub use scheduler::TickScheduler;
