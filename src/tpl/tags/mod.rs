mod assign;
mod case;
mod comment;
mod counter;
mod cycle;
mod for_tag;
mod if_tag;
mod include;

pub use assign::{Assign, Capture};
pub use case::Case;
pub use comment::Comment;
pub use counter::Counter;
pub use cycle::Cycle;
pub use for_tag::{For, ForLoopDrop};
pub use if_tag::If;
pub use include::Include;
