pub mod chart;
pub mod sprint;
