mod codec;
mod flags;
mod preview;

pub use codec::{TcpSegment, decode};
pub use flags::{Category, Classification, TcpFlags};
pub use preview::{ascii_preview, hex_dump};
