pub mod milp;
pub mod rail;
pub mod utils;
