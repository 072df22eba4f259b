//! Closure-driven source.

use crate::buffer::Buffer;
use crate::node::{ChannelMode, NodeFormat, ProcessContext, Processor};

/// Source that fills each block with a closure.
///
/// The channel count follows the node it feeds. The closure runs on the
/// realtime thread and must not allocate or block.
///
/// ```rust
/// use rivulet_core::nodes::CallbackProcessor;
///
/// let mut counter = 0.0_f32;
/// let _ramp = CallbackProcessor::new(1, move |buffer, _ctx| {
///     for s in buffer.data_mut() {
///         *s = counter;
///         counter += 0.001;
///     }
/// });
/// ```
pub struct CallbackProcessor<F> {
    callback: F,
    channels: usize,
}

impl<F> CallbackProcessor<F>
where
    F: FnMut(&mut Buffer, &ProcessContext) + Send + 'static,
{
    /// Creates a source starting at `channels` channels.
    pub fn new(channels: usize, callback: F) -> Self {
        Self {
            callback,
            channels: channels.max(1),
        }
    }
}

impl<F> Processor for CallbackProcessor<F>
where
    F: FnMut(&mut Buffer, &ProcessContext) + Send + 'static,
{
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        (self.callback)(buffer, ctx);
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::source(self.channels).with_mode(ChannelMode::MatchesOutput)
    }

    fn name(&self) -> &'static str {
        "callback"
    }
}
