pub mod position;
pub mod types;

pub use position::{BoardState, INITIAL_NOTATION, SquareView};
pub use types::*;
