//! Streaming file playback.
//!
//! A [`FilePlayer`] owns a reader thread that decodes its [`SourceFile`] into
//! one ring per channel. The node's `process` only drains those rings, so
//! decoding never runs under the context lock.
//!
//! Seeking is a three-step handshake so that neither side touches the other's
//! ring cursor:
//!
//! 1. A control thread stores the target frame and sets `SEEK_REQUESTED`.
//! 2. The reader thread seeks the file and sets `FLUSH`; it writes nothing
//!    while in `FLUSH`.
//! 3. The realtime side discards everything queued, sets `IDLE`, and wakes the
//!    reader, which refills from the new position.
//!
//! The node outputs silence while a seek is pending. Running out of queued
//! samples before the end of the file is an underrun and is recorded in a
//! [`RunCounter`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

use crate::buffer::{Buffer, DynamicBuffer};
use crate::error::FileError;
use crate::file::{DEFAULT_FRAMES_PER_READ, SourceFile};
use crate::node::{InitContext, NodeFormat, ProcessContext, Processor};
use crate::ring_buffer::{DEFAULT_PADDING_FACTOR, RingBuffer, RingReader, RingWriter, RunCounter};

const IDLE: u8 = 0;
const SEEK_REQUESTED: u8 = 1;
const FLUSH: u8 = 2;

/// Longest the reader thread sleeps between checks.
const READER_PERIOD: Duration = Duration::from_millis(10);

struct Shared {
    state: AtomicU8,
    seek_target: AtomicU64,
    looping: AtomicBool,
    running: AtomicBool,
    eof: AtomicBool,
    /// Frames delivered by the realtime side, modulo the file length when looping.
    position: AtomicU64,
}

/// Source node streaming a [`SourceFile`] from a background thread.
pub struct FilePlayer {
    readers: Vec<RingReader>,
    scratch_frames: usize,
    shared: Arc<Shared>,
    reader_thread: Thread,
    join: Option<JoinHandle<()>>,
    underruns: Arc<RunCounter>,
    channels: usize,
    num_frames: u64,
    file_sample_rate: u32,
}

impl FilePlayer {
    /// Starts streaming `source` with rings holding
    /// [`DEFAULT_FRAMES_PER_READ`] × [`DEFAULT_PADDING_FACTOR`] frames.
    ///
    /// # Errors
    ///
    /// [`FileError::Io`] if the reader thread cannot be spawned.
    pub fn new(source: Box<dyn SourceFile>) -> Result<Self, FileError> {
        Self::with_capacity(source, DEFAULT_FRAMES_PER_READ * DEFAULT_PADDING_FACTOR)
    }

    /// Starts streaming with rings of `ring_frames` frames per channel.
    ///
    /// # Errors
    ///
    /// [`FileError::Io`] if the reader thread cannot be spawned.
    pub fn with_capacity(source: Box<dyn SourceFile>, ring_frames: usize) -> Result<Self, FileError> {
        let channels = source.channels().max(1);
        let ring_frames = ring_frames.max(1);
        let (writers, readers): (Vec<_>, Vec<_>) = (0..channels).map(|_| RingBuffer::new(ring_frames)).unzip();

        let shared = Arc::new(Shared {
            state: AtomicU8::new(IDLE),
            seek_target: AtomicU64::new(0),
            looping: AtomicBool::new(false),
            running: AtomicBool::new(true),
            eof: AtomicBool::new(false),
            position: AtomicU64::new(source.position()),
        });
        let num_frames = source.num_frames();
        let file_sample_rate = source.sample_rate();

        let chunk_frames = DEFAULT_FRAMES_PER_READ.min(ring_frames);
        let worker = ReaderWorker {
            source,
            writers,
            chunk: DynamicBuffer::new(chunk_frames, channels),
            chunk_frames,
            shared: Arc::clone(&shared),
        };
        let join = thread::Builder::new()
            .name("rivulet-file-reader".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            readers,
            scratch_frames: ring_frames,
            shared,
            reader_thread: join.thread().clone(),
            join: Some(join),
            underruns: Arc::new(RunCounter::new()),
            channels,
            num_frames,
            file_sample_rate,
        })
    }

    /// Requests playback from `frame`. Takes effect within a few blocks.
    pub fn seek(&self, frame: u64) {
        self.shared.seek_target.store(frame.min(self.num_frames), Ordering::Release);
        self.shared.state.store(SEEK_REQUESTED, Ordering::Release);
        self.reader_thread.unpark();
    }

    /// Enables or disables looping at the end of the file.
    pub fn set_looping(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Release);
        self.reader_thread.unpark();
    }

    /// Whether playback wraps at the end.
    pub fn is_looping(&self) -> bool {
        self.shared.looping.load(Ordering::Acquire)
    }

    /// Frames played so far.
    pub fn position(&self) -> u64 {
        self.shared.position.load(Ordering::Acquire)
    }

    /// Frames in the file.
    pub fn num_frames(&self) -> u64 {
        self.num_frames
    }

    /// Native sample rate of the file. No resampling is done.
    pub fn file_sample_rate(&self) -> u32 {
        self.file_sample_rate
    }

    /// True once the whole file has been read and played.
    pub fn is_eof(&self) -> bool {
        self.shared.eof.load(Ordering::Acquire) && self.readers.iter().all(|r| r.available_read() == 0)
    }

    /// Shared underrun recorder, for lock-free polling.
    pub fn underruns(&self) -> Arc<RunCounter> {
        Arc::clone(&self.underruns)
    }

    /// Frame of the last underrun since the previous call.
    pub fn take_last_underrun(&self) -> Option<u64> {
        self.underruns.take_last()
    }
}

impl Processor for FilePlayer {
    fn process(&mut self, buffer: &mut Buffer, ctx: &ProcessContext) {
        let frames = ctx.frames.min(buffer.frames()).min(self.scratch_frames);

        match self.shared.state.load(Ordering::Acquire) {
            FLUSH => {
                for reader in &mut self.readers {
                    reader.clear();
                }
                let target = self.shared.seek_target.load(Ordering::Acquire);
                self.shared.position.store(target, Ordering::Release);
                // A newer seek request must survive the flush.
                let _ = self
                    .shared
                    .state
                    .compare_exchange(FLUSH, IDLE, Ordering::AcqRel, Ordering::Acquire);
                self.reader_thread.unpark();
                buffer.zero();
                return;
            }
            SEEK_REQUESTED => {
                buffer.zero();
                return;
            }
            _ => {}
        }

        let mut delivered = frames;
        for (reader, channel) in self.readers.iter_mut().zip(buffer.channels_iter_mut()) {
            let read = reader.read(&mut channel[..frames]);
            channel[read..].fill(0.0);
            delivered = delivered.min(read);
        }

        if delivered < frames && !self.shared.eof.load(Ordering::Acquire) {
            self.underruns.record(ctx.block_start_frame + delivered as u64);
        }

        let mut position = self.shared.position.load(Ordering::Relaxed) + delivered as u64;
        if self.shared.looping.load(Ordering::Relaxed) && self.num_frames > 0 {
            position %= self.num_frames;
        }
        self.shared.position.store(position, Ordering::Release);

        if self.readers.first().is_some_and(|r| r.available_write() >= r.capacity() / 2) {
            self.reader_thread.unpark();
        }
    }

    fn initialize(&mut self, _ctx: &InitContext) {
        #[cfg(feature = "tracing")]
        if _ctx.sample_rate as u32 != self.file_sample_rate {
            tracing::warn!(
                "file_player: file is {} Hz, context is {} Hz; playing unresampled",
                self.file_sample_rate,
                _ctx.sample_rate
            );
        }
    }

    fn format(&self) -> NodeFormat {
        NodeFormat::source(self.channels)
    }

    fn name(&self) -> &'static str {
        "file_player"
    }
}

impl Drop for FilePlayer {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.reader_thread.unpark();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

struct ReaderWorker {
    source: Box<dyn SourceFile>,
    writers: Vec<RingWriter>,
    chunk: DynamicBuffer,
    chunk_frames: usize,
    shared: Arc<Shared>,
}

impl ReaderWorker {
    fn run(mut self) {
        while self.shared.running.load(Ordering::Acquire) {
            match self.shared.state.load(Ordering::Acquire) {
                SEEK_REQUESTED => {
                    let target = self.shared.seek_target.load(Ordering::Acquire);
                    if let Err(_err) = self.source.seek(target) {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("file_player: seek to {target} failed: {_err}");
                    }
                    self.shared.eof.store(false, Ordering::Release);
                    self.shared.state.store(FLUSH, Ordering::Release);
                }
                FLUSH => thread::park_timeout(READER_PERIOD),
                _ => {
                    if !self.fill() {
                        thread::park_timeout(READER_PERIOD);
                    }
                }
            }
        }
    }

    /// Reads one chunk into the rings. Returns false when there was nothing to do.
    fn fill(&mut self) -> bool {
        let free = self.writers.iter().map(RingWriter::available_write).min().unwrap_or(0);
        if free == 0 || self.shared.eof.load(Ordering::Acquire) {
            return false;
        }

        let channels = self.chunk.channels();
        self.chunk.set_size(free.min(self.chunk_frames), channels);
        match self.source.read(&mut self.chunk) {
            Ok(0) => {
                if self.shared.looping.load(Ordering::Acquire) && self.source.num_frames() > 0 {
                    if self.source.seek(0).is_err() {
                        self.shared.eof.store(true, Ordering::Release);
                    }
                    true
                } else {
                    self.shared.eof.store(true, Ordering::Release);
                    false
                }
            }
            Ok(read) => {
                // A seek request that arrived mid-read is honored next pass; the
                // realtime side flushes whatever this write adds.
                for (writer, channel) in self.writers.iter_mut().zip(self.chunk.channels_iter()) {
                    writer.write(&channel[..read]);
                }
                true
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("file_player: read failed: {_err}");
                self.shared.eof.store(true, Ordering::Release);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::MemorySource;
    use std::time::Instant;

    fn ramp_source(frames: usize) -> Box<dyn SourceFile> {
        let samples: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        Box::new(MemorySource::new(Buffer::from_channels(&[samples]), 1000))
    }

    fn ctx(block: u64) -> ProcessContext {
        ProcessContext {
            frames: 16,
            sample_rate: 1000.0,
            block_start_frame: block * 16,
        }
    }

    /// Waits until the reader thread has queued at least `frames` frames.
    fn wait_for(player: &FilePlayer, frames: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while player.readers[0].available_read() < frames {
            assert!(Instant::now() < deadline, "reader thread stalled");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn streams_file_in_order() {
        let mut player = FilePlayer::with_capacity(ramp_source(64), 64).unwrap();
        wait_for(&player, 64);
        let mut buf = Buffer::new(16, 1);
        player.process(&mut buf, &ctx(0));
        player.process(&mut buf, &ctx(1));
        assert_eq!(buf.channel(0)[0], 16.0);
        assert_eq!(player.position(), 32);
        assert_eq!(player.take_last_underrun(), None);
    }

    #[test]
    fn end_of_file_is_not_an_underrun() {
        let mut player = FilePlayer::with_capacity(ramp_source(20), 64).unwrap();
        wait_for(&player, 20);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !player.shared.eof.load(Ordering::Acquire) {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(1));
        }
        let mut buf = Buffer::new(16, 1);
        player.process(&mut buf, &ctx(0));
        player.process(&mut buf, &ctx(1));
        assert_eq!(&buf.channel(0)[..4], &[16.0, 17.0, 18.0, 19.0]);
        assert!(buf.channel(0)[4..].iter().all(|&s| s == 0.0));
        assert!(player.is_eof());
        assert_eq!(player.take_last_underrun(), None);
    }

    #[test]
    fn seek_flushes_and_resumes() {
        let mut player = FilePlayer::with_capacity(ramp_source(256), 32).unwrap();
        wait_for(&player, 32);
        player.seek(200);

        let mut buf = Buffer::new(16, 1);
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            player.process(&mut buf, &ctx(0));
            if player.shared.state.load(Ordering::Acquire) == IDLE && player.position() == 200 {
                break;
            }
            assert!(Instant::now() < deadline, "seek never completed");
            thread::sleep(Duration::from_millis(1));
        }
        wait_for(&player, 16);
        player.process(&mut buf, &ctx(1));
        assert_eq!(buf.channel(0)[0], 200.0);
    }

    #[test]
    fn format_follows_file() {
        let source = MemorySource::new(Buffer::new(8, 3), 1000);
        let player = FilePlayer::new(Box::new(source)).unwrap();
        assert_eq!(player.format().channels, 3);
        assert_eq!(player.format().max_inputs, 0);
        assert_eq!(player.num_frames(), 8);
    }
}
