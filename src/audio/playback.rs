use crate::audio::pcm::AudioSample;
use crate::foundation::error::{MergeError, MergeResult};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Default number of samples released per playback block (~43 ms at 24 kHz).
pub const DEFAULT_BLOCK_SAMPLES: usize = 1024;

/// A contiguous run of samples released by the playback clock.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBlock {
    /// Offset of the first sample within the [`AudioSample`].
    pub first_sample: u64,
    /// Normalized mono samples.
    pub samples: Vec<f32>,
}

/// Signal fired once every sample has been released into the track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackEnded {
    /// Total samples delivered before the signal.
    pub samples_delivered: u64,
}

/// Receiving end of the playback output, consumed by the multiplexer.
#[derive(Debug)]
pub struct AudioTrack {
    rx: mpsc::UnboundedReceiver<AudioBlock>,
    sample_rate: u32,
}

impl AudioTrack {
    /// Sample rate of the blocks carried by this track.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) async fn recv(&mut self) -> Option<AudioBlock> {
        self.rx.recv().await
    }

    pub(crate) fn try_recv(&mut self) -> Option<AudioBlock> {
        self.rx.try_recv().ok()
    }
}

/// Plays an [`AudioSample`] in real time into an [`AudioTrack`].
///
/// The track must be connected before playback starts. Dropping the playback stops it.
pub struct AudioPlayback {
    sample: AudioSample,
    block_samples: usize,
    tx: Option<mpsc::UnboundedSender<AudioBlock>>,
    connected: bool,
    stop: CancellationToken,
    task: Option<JoinHandle<u64>>,
}

impl AudioPlayback {
    /// Prepare playback of `sample`, releasing `block_samples` samples at a time.
    pub fn new(sample: AudioSample, block_samples: usize) -> MergeResult<Self> {
        if block_samples == 0 {
            return Err(MergeError::validation("audio block size must be non-zero"));
        }
        Ok(Self {
            sample,
            block_samples,
            tx: None,
            connected: false,
            stop: CancellationToken::new(),
            task: None,
        })
    }

    /// Duration of the underlying sample.
    pub fn duration(&self) -> Duration {
        self.sample.duration()
    }

    /// Create the output track. Only one track can be connected.
    pub fn connect(&mut self) -> MergeResult<AudioTrack> {
        if self.connected {
            return Err(MergeError::validation("audio playback is already connected"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        self.connected = true;
        Ok(AudioTrack {
            rx,
            sample_rate: self.sample.sample_rate(),
        })
    }

    /// `true` once [`AudioPlayback::start`] has spawned the playback task.
    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Start releasing samples on the audio clock.
    ///
    /// The returned receiver resolves after the final block has been queued and the full
    /// duration has elapsed. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> MergeResult<oneshot::Receiver<PlaybackEnded>> {
        let tx = self.tx.take().ok_or_else(|| {
            MergeError::validation("audio playback must be connected once before start")
        })?;
        let (ended_tx, ended_rx) = oneshot::channel();
        let task = tokio::spawn(play(
            self.sample.clone(),
            self.block_samples,
            tx,
            self.stop.clone(),
            ended_tx,
        ));
        self.task = Some(task);
        tracing::debug!(
            samples = self.sample.len(),
            duration_secs = self.sample.duration_secs(),
            "audio playback started"
        );
        Ok(ended_rx)
    }

    /// Stop playback and wait for the playback task to exit.
    ///
    /// Returns the number of samples that were released. Safe to call more than once.
    pub async fn stop(&mut self) -> u64 {
        self.stop.cancel();
        self.tx = None;
        let Some(task) = self.task.take() else {
            return 0;
        };
        match task.await {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::warn!("audio playback task did not exit cleanly: {e}");
                0
            }
        }
    }
}

impl Drop for AudioPlayback {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn play(
    sample: AudioSample,
    block_samples: usize,
    tx: mpsc::UnboundedSender<AudioBlock>,
    stop: CancellationToken,
    ended_tx: oneshot::Sender<PlaybackEnded>,
) -> u64 {
    let origin = Instant::now();
    let rate = sample.sample_rate();
    let total = sample.len();
    let mut next = 0usize;

    while next < total {
        let due = origin + samples_to_duration(next as u64, rate);
        tokio::select! {
            biased;
            _ = stop.cancelled() => return next as u64,
            _ = sleep_until(due) => {}
        }
        let end = (next + block_samples).min(total);
        let block = AudioBlock {
            first_sample: next as u64,
            samples: sample.samples()[next..end].to_vec(),
        };
        if tx.send(block).is_err() {
            tracing::debug!("audio track receiver dropped, stopping playback");
            return next as u64;
        }
        next = end;
    }

    let end_at = origin + samples_to_duration(total as u64, rate);
    tokio::select! {
        biased;
        _ = stop.cancelled() => return total as u64,
        _ = sleep_until(end_at) => {}
    }
    let _ = ended_tx.send(PlaybackEnded {
        samples_delivered: total as u64,
    });
    total as u64
}

fn samples_to_duration(samples: u64, sample_rate: u32) -> Duration {
    let nanos = u128::from(samples) * 1_000_000_000 / u128::from(sample_rate.max(1));
    Duration::from_nanos(nanos as u64)
}

#[cfg(test)]
#[path = "../../tests/unit/audio/playback.rs"]
mod tests;
