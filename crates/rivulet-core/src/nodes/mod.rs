//! Built-in node kinds.
//!
//! | Node | Kind | Channels |
//! |------|------|----------|
//! | [`Generator`] | source | 1, fixed |
//! | [`CallbackProcessor`] | source | matches output |
//! | [`BufferPlayer`] | source | buffer's channels |
//! | [`FilePlayer`] | source | file's channels |
//! | [`LineIn`] | source | device input channels |
//! | [`Gain`] | effect | matches input |
//! | [`Filter`] | effect | matches input |
//! | [`Pan2d`] | effect | 2, fixed |
//! | [`Tap`] | effect (passthrough) | matches input |
//! | [`LineOut`] | sink | device output channels |
//!
//! Sources start disabled and must be started through their handle. Effects
//! and [`LineOut`] enable themselves once initialized.

mod buffer_player;
mod callback;
mod file_player;
mod filter;
mod gain;
mod generator;
mod line;
mod pan;
mod tap;

pub use buffer_player::BufferPlayer;
pub use callback::CallbackProcessor;
pub use file_player::FilePlayer;
pub use filter::{Biquad, Coefficients, Filter, FilterMode};
pub use gain::Gain;
pub use generator::{Generator, Waveform};
pub use line::{InputFeed, LineIn, LineOut};
pub use pan::Pan2d;
pub use tap::{Tap, TapReader};

use crate::buffer::Buffer;

/// Copies channel 0 of a planar buffer into every other channel.
fn broadcast_first_channel(buffer: &mut Buffer) {
    let frames = buffer.frames();
    if frames == 0 {
        return;
    }
    let (first, rest) = buffer.data_mut().split_at_mut(frames);
    for channel in rest.chunks_exact_mut(frames) {
        channel.copy_from_slice(first);
    }
}
