pub mod navigation;

pub use navigation::{next_item_index, reduce, NavCommand, SessionPhase};
