//! Host-side session: moves bytes from a reader into the frame queue and
//! writes one report per decoded frame.
//!
//! A reader thread performs the blocking reads and hands chunks over a
//! channel. Decoding, correlation and report output all run on the calling
//! thread, so a new frame is never decoded while the previous report is
//! still being written.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, TryRecvError};
use log::{info, warn};
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tdoa_core::frame_adapter::{ByteQueue, ByteSource};
use tdoa_core::BearingProcessor;

const READ_CHUNK: usize = 1024;
/// Chunks the reader may run ahead of the decoder before it blocks.
const CHANNEL_DEPTH: usize = 4;

/// Totals for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub bytes_discarded: u64,
    pub trailing_bytes: usize,
}

pub struct LinkSession {
    processor: BearingProcessor,
    queue: ByteQueue,
    idle_interval: Duration,
    emit_blocks: bool,
}

impl LinkSession {
    pub fn new(processor: BearingProcessor, idle_interval: Duration, emit_blocks: bool) -> Self {
        let frame_len = processor.frame_len();
        Self {
            processor,
            queue: ByteQueue::new(frame_len * 4),
            idle_interval,
            emit_blocks,
        }
    }

    /// Runs until the input ends or `running` is cleared.
    pub fn run<R, W>(
        mut self,
        input: R,
        output: &mut W,
        running: Arc<AtomicBool>,
    ) -> Result<SessionSummary>
    where
        R: Read + Send + 'static,
        W: Write + ?Sized,
    {
        let geometry = self.processor.geometry();
        info!(
            "Session started: N = {}, frame {} bytes, queue {} bytes, baseline {} m",
            self.processor.samples_per_channel(),
            self.processor.frame_len(),
            self.queue.capacity(),
            geometry.sensor_spacing_m
        );

        let rx = spawn_reader(input)?;
        // At most one chunk that did not yet fit into the queue.
        let mut pending: Vec<u8> = Vec::new();
        let mut input_closed = false;

        while running.load(Ordering::Relaxed) {
            self.fill_queue(&rx, &mut pending, &mut input_closed);

            match self.processor.poll(&mut self.queue)? {
                Some(report) => {
                    report
                        .write_to(output, self.emit_blocks)
                        .context("Failed to write report")?;
                    output.flush().context("Failed to flush output")?;
                }
                None if input_closed && pending.is_empty() => break,
                None => thread::sleep(self.idle_interval),
            }
        }

        let summary = SessionSummary {
            frames: self.processor.frames_decoded(),
            bytes_discarded: self.processor.bytes_discarded(),
            trailing_bytes: self.queue.available() + pending.len(),
        };
        if summary.trailing_bytes > 0 {
            warn!(
                "Input ended with {} bytes short of a full frame ({} needed)",
                summary.trailing_bytes,
                self.processor.frame_len()
            );
        }
        info!(
            "Session finished: {} frames, {} bytes discarded while resynchronizing",
            summary.frames, summary.bytes_discarded
        );
        Ok(summary)
    }

    /// Moves received chunks into the queue until it is full or the channel
    /// is empty. Sets `input_closed` once the reader has hung up.
    fn fill_queue(
        &mut self,
        rx: &Receiver<Vec<u8>>,
        pending: &mut Vec<u8>,
        input_closed: &mut bool,
    ) {
        loop {
            if !pending.is_empty() {
                let accepted = self.queue.push(pending);
                pending.drain(..accepted);
                if !pending.is_empty() {
                    return;
                }
            }
            if *input_closed {
                return;
            }
            match rx.try_recv() {
                Ok(chunk) => *pending = chunk,
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    *input_closed = true;
                    return;
                }
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut input: R) -> Result<Receiver<Vec<u8>>> {
    let (tx, rx) = crossbeam_channel::bounded(CHANNEL_DEPTH);
    thread::Builder::new()
        .name("tdoa-link-reader".into())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match input.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Input read error: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn link reader thread")?;
    Ok(rx)
}
