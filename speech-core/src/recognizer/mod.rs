//! C5: shared acoustic model and per-session decoding contexts (spec §4.5).

pub mod context;
pub mod model;

pub use context::{i16_to_f32, RecognizerContext};
pub use model::{AccelerationConfig, ContextConfig, SharedModel};
