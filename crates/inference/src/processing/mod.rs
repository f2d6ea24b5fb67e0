pub mod decode;
pub mod map;
pub mod nms;

pub use decode::{BoxDecoder, RawBox};
pub use map::{CoordinateMapper, Detection};
pub use nms::NmsEngine;
