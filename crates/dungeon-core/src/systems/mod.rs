//! Systems - logic that operates on components

mod area;
mod boss_room;
mod death;
mod discovery;
mod lifecycle;
mod membership;
mod merge;
mod operator;
mod tick;

pub use area::*;
pub use boss_room::*;
pub use death::*;
pub use discovery::*;
pub use lifecycle::*;
pub use membership::*;
pub use merge::*;
pub use operator::*;
pub use tick::*;
