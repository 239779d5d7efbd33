pub mod change;
pub mod consolidate;
pub mod delta;
