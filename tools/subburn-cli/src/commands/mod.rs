pub mod check;
pub mod fonts;
pub mod render;
