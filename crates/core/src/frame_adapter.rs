//! Frame adapter for reassembling sample-buffer pairs from a byte stream.
//!
//! Wire frame: `0xFF 0xFF`, then `N` signed bytes for channel A and `N` for
//! channel B. Bytes accumulate in a ring buffer until a whole frame is
//! available; a misaligned stream is recovered one byte at a time.

use crate::buffer::SampleBuffer;
use crate::constants::{frame_len, HEADER_BYTE, HEADER_LEN};
use anyhow::{ensure, Result};
use log::debug;
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

/// Byte input as seen by the decoder: an availability count plus
/// non-consuming peeks and single-byte reads.
pub trait ByteSource {
    fn available(&self) -> usize;
    /// Byte at `offset` from the read position, without consuming it.
    fn peek(&self, offset: usize) -> Option<u8>;
    fn read(&mut self) -> Option<u8>;

    /// Consumes up to `dst.len()` bytes, returning how many were read.
    fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let mut count = 0;
        for slot in dst.iter_mut() {
            match self.read() {
                Some(b) => {
                    *slot = b;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }
}

/// Bounded input queue backed by a heap ring buffer.
pub struct ByteQueue {
    rb: HeapRb<u8>,
}

impl ByteQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            rb: HeapRb::<u8>::new(capacity.max(1)),
        }
    }

    /// Queue sized to hold four frames of `samples_per_channel` samples.
    pub fn for_frames(samples_per_channel: usize) -> Self {
        Self::new(frame_len(samples_per_channel) * 4)
    }

    /// Appends as many of `bytes` as fit; returns the count accepted.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        self.rb.push_slice(bytes)
    }

    pub fn vacant(&self) -> usize {
        self.rb.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.rb.capacity().get()
    }
}

impl ByteSource for ByteQueue {
    fn available(&self) -> usize {
        self.rb.occupied_len()
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.rb.iter().nth(offset).copied()
    }

    fn read(&mut self) -> Option<u8> {
        self.rb.try_pop()
    }

    fn read_into(&mut self, dst: &mut [u8]) -> usize {
        self.rb.pop_slice(dst)
    }
}

/// One decoded buffer pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel_a: SampleBuffer,
    pub channel_b: SampleBuffer,
}

/// Outcome of a single decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeStatus {
    Frame(Frame),
    /// Fewer than a full frame's bytes are buffered; nothing was consumed.
    NeedMore,
    /// The leading bytes were not a header; one byte was discarded.
    Resync,
}

/// Stateless apart from counters; all pending bytes live in the source.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    samples_per_channel: usize,
    payload: Vec<u8>,
    frames_decoded: u64,
    bytes_discarded: u64,
}

impl FrameDecoder {
    pub fn new(samples_per_channel: usize) -> Result<Self> {
        ensure!(samples_per_channel > 0, "samples per channel must be non-zero");
        Ok(Self {
            samples_per_channel,
            payload: vec![0; 2 * samples_per_channel],
            frames_decoded: 0,
            bytes_discarded: 0,
        })
    }

    pub fn samples_per_channel(&self) -> usize {
        self.samples_per_channel
    }

    /// Bytes required before a decode is attempted (header + payload).
    pub fn frame_len(&self) -> usize {
        frame_len(self.samples_per_channel)
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    pub fn bytes_discarded(&self) -> u64 {
        self.bytes_discarded
    }

    /// Attempts to take one frame from `source`.
    ///
    /// Nothing is consumed unless a full frame is buffered. The header is
    /// peeked; on a match header and payload are consumed together, otherwise
    /// exactly one byte is dropped.
    pub fn try_decode<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<DecodeStatus> {
        if source.available() < self.frame_len() {
            return Ok(DecodeStatus::NeedMore);
        }

        let header_ok = (0..HEADER_LEN).all(|i| source.peek(i) == Some(HEADER_BYTE));
        if !header_ok {
            source.read();
            self.bytes_discarded += 1;
            debug!(
                "Frame header mismatch, discarded 1 byte ({} total)",
                self.bytes_discarded
            );
            return Ok(DecodeStatus::Resync);
        }

        for _ in 0..HEADER_LEN {
            source.read();
        }
        let read = source.read_into(&mut self.payload);
        ensure!(
            read == self.payload.len(),
            "byte source under-delivered: {} of {} payload bytes",
            read,
            self.payload.len()
        );

        let n = self.samples_per_channel;
        let frame = Frame {
            channel_a: SampleBuffer::from_wire(&self.payload[..n])?,
            channel_b: SampleBuffer::from_wire(&self.payload[n..])?,
        };
        self.frames_decoded += 1;
        Ok(DecodeStatus::Frame(frame))
    }
}

/// Encodes a buffer pair into a wire frame. Samples are saturated to the
/// `i8` range and rounded toward zero.
pub fn encode_frame(channel_a: &[f32], channel_b: &[f32]) -> Result<Vec<u8>> {
    ensure!(
        channel_a.len() == channel_b.len(),
        "channel lengths differ: {} vs {}",
        channel_a.len(),
        channel_b.len()
    );
    ensure!(!channel_a.is_empty(), "cannot encode an empty frame");

    let mut bytes = Vec::with_capacity(frame_len(channel_a.len()));
    bytes.extend_from_slice(&[HEADER_BYTE; HEADER_LEN]);
    for &s in channel_a.iter().chain(channel_b) {
        bytes.push(s.clamp(-128.0, 127.0) as i8 as u8);
    }
    Ok(bytes)
}
