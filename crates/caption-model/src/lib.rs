//! Subburn Caption Model
//!
//! Defines the data contracts every renderer consumes:
//! - **Captions:** Time-stamped caption units from a transcription collaborator
//! - **Style:** Immutable font, color, stroke, animation, and position settings
//! - **Fonts:** Resolution of font files from an explicit font directory
//! - **Requests/Results:** The validated input and terminal value of a render
//! - **Sidecars:** SRT/VTT export of an alignment
//!
//! Times are seconds from the start of the source video. Pixel offsets are
//! measured from the top-left corner of the frame.

pub mod caption;
pub mod color;
pub mod font;
pub mod request;
pub mod sidecar;
pub mod style;

pub use caption::*;
pub use color::*;
pub use font::*;
pub use request::*;
pub use sidecar::*;
pub use style::*;
