pub mod colors;
pub mod render;
pub mod spec;

pub use render::{create_chart, SVG_CONTENT_TYPE};
