use crate::audio::playback::AudioBlock;
use crate::encode::codec::ContainerCodec;
use crate::encode::recorder::{
    EncodedChunk, FrameTimeline, MediaHost, Recorder, RecorderConfig, RecorderOutput,
};
use crate::foundation::error::{MergeError, MergeResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::compositor::VideoFrame;
use anyhow::{Context as _, anyhow};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{OnceLock, mpsc};

/// Size of the chunks the finished file is split into.
const OUTPUT_CHUNK_BYTES: usize = 64 * 1024;

/// Options for [`FfmpegHost`].
#[derive(Clone, Debug)]
pub struct FfmpegHostOpts {
    /// `ffmpeg` executable, looked up on `PATH` when not absolute.
    pub ffmpeg_bin: PathBuf,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    /// Target audio bit rate.
    pub audio_bits_per_second: u32,
}

impl Default for FfmpegHostOpts {
    fn default() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            bg_rgba: [0, 0, 0, 255],
            audio_bits_per_second: 128_000,
        }
    }
}

#[derive(Debug, Default)]
struct Capabilities {
    encoders: HashSet<String>,
    muxers: HashSet<String>,
}

/// [`MediaHost`] that records through the system `ffmpeg`.
///
/// Encoder and muxer support is probed once, on the first query.
#[derive(Debug, Default)]
pub struct FfmpegHost {
    opts: FfmpegHostOpts,
    caps: OnceLock<Capabilities>,
}

impl FfmpegHost {
    /// Create a host with the given options.
    pub fn new(opts: FfmpegHostOpts) -> Self {
        Self {
            opts,
            caps: OnceLock::new(),
        }
    }

    /// Host options.
    pub fn opts(&self) -> &FfmpegHostOpts {
        &self.opts
    }

    fn caps(&self) -> &Capabilities {
        self.caps.get_or_init(|| {
            let caps = Capabilities {
                encoders: list_components(&self.opts.ffmpeg_bin, "-encoders"),
                muxers: list_components(&self.opts.ffmpeg_bin, "-muxers"),
            };
            tracing::debug!(
                encoders = caps.encoders.len(),
                muxers = caps.muxers.len(),
                "probed ffmpeg capabilities"
            );
            caps
        })
    }
}

impl MediaHost for FfmpegHost {
    fn is_type_supported(&self, codec: ContainerCodec) -> bool {
        let caps = self.caps();
        caps.encoders.contains(codec.video_encoder())
            && caps.encoders.contains(codec.audio_encoder())
            && caps.muxers.contains(codec.muxer())
    }

    fn create_recorder(
        &self,
        codec: ContainerCodec,
        cfg: RecorderConfig,
    ) -> MergeResult<Box<dyn Recorder>> {
        cfg.validate()?;
        Ok(Box::new(FfmpegRecorder::new(self.opts.clone(), codec, cfg)?))
    }
}

/// Parse the name column of `ffmpeg -encoders` / `ffmpeg -muxers`.
fn list_components(ffmpeg: &Path, flag: &str) -> HashSet<String> {
    let out = match Command::new(ffmpeg)
        .args(["-hide_banner", flag])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
    {
        Ok(out) if out.status.success() => out,
        Ok(out) => {
            tracing::warn!("'{} {flag}' exited with {}", ffmpeg.display(), out.status);
            return HashSet::new();
        }
        Err(e) => {
            tracing::warn!("failed to run '{}': {e}", ffmpeg.display());
            return HashSet::new();
        }
    };
    parse_component_list(&String::from_utf8_lossy(&out.stdout))
}

fn parse_component_list(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|l| !l.trim_start().starts_with("--"))
        .skip(1)
        .filter_map(|l| l.split_whitespace().nth(1))
        .map(str::to_owned)
        .collect()
}

/// Two-stage `ffmpeg` recorder.
///
/// Frames stream into a video-only encoder while audio is spooled to a raw `f32le` file;
/// `stop` muxes both into the negotiated container, cut to the audio duration.
///
/// Pipe and file writes happen on a spooler thread, so `write_video` and `write_audio`
/// never block the caller. `stop` waits for the encoder and runs the mux step; call it off
/// the event loop.
pub struct FfmpegRecorder {
    opts: FfmpegHostOpts,
    codec: ContainerCodec,
    cfg: RecorderConfig,
    workdir: Option<tempfile::TempDir>,
    timeline: FrameTimeline,

    child: Option<Child>,
    spool: Option<mpsc::Sender<SpoolItem>>,
    spooler: Option<std::thread::JoinHandle<MergeResult<()>>>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    audio_samples: u64,
}

/// Work handed to the spooler thread.
enum SpoolItem {
    /// One flattened, opaque RGBA8 frame for the encoder's stdin.
    Frame(Vec<u8>),
    /// Samples appended to the audio spool.
    Audio(Vec<f32>),
}

impl FfmpegRecorder {
    /// Allocate a working directory for one recording.
    pub fn new(opts: FfmpegHostOpts, codec: ContainerCodec, cfg: RecorderConfig) -> MergeResult<Self> {
        let workdir = tempfile::Builder::new()
            .prefix("avmerge_rec_")
            .tempdir()
            .context("create recorder working directory")?;
        Ok(Self {
            timeline: FrameTimeline::new(cfg.frame_count()),
            opts,
            codec,
            cfg,
            workdir: Some(workdir),
            child: None,
            spool: None,
            spooler: None,
            stderr_drain: None,
            audio_samples: 0,
        })
    }

    fn work_path(&self, name: &str) -> MergeResult<PathBuf> {
        self.workdir
            .as_ref()
            .map(|d| d.path().join(name))
            .ok_or_else(|| MergeError::validation("ffmpeg recorder was already finalized"))
    }

    /// Pad the timeline, close the spool and wait for the video encoder.
    fn finish_video(&mut self) -> MergeResult<()> {
        let Self {
            timeline,
            spool,
            opts,
            ..
        } = self;
        timeline.finish(|raster| queue_frame(spool, &raster.data, opts.bg_rgba))?;
        drop(self.spool.take());

        let spooled = match self.spooler.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("ffmpeg spooler thread panicked"))?,
            None => Err(MergeError::validation("ffmpeg recorder not started")),
        };

        let mut child = self
            .child
            .take()
            .ok_or_else(|| MergeError::validation("ffmpeg recorder not started"))?;
        let status = child.wait().context("wait for ffmpeg video encoder")?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("ffmpeg stderr drain thread panicked"))?
                .context("read ffmpeg stderr")?,
            None => Vec::new(),
        };
        if !status.success() {
            return Err(MergeError::Other(anyhow!(
                "ffmpeg video encoder exited with status {status}: {}",
                String::from_utf8_lossy(&stderr_bytes).trim()
            )));
        }
        spooled
    }

    fn mux(&self, video: &Path, audio: &Path, out: &Path) -> MergeResult<()> {
        let duration = self.cfg.audio_duration().as_secs_f64();
        let mut cmd = Command::new(&self.opts.ffmpeg_bin);
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(video)
            .args([
                "-f",
                "f32le",
                "-ar",
                &self.cfg.sample_rate.to_string(),
                "-ac",
                "1",
                "-i",
            ])
            .arg(audio)
            .args([
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-c:v",
                "copy",
                "-c:a",
                self.codec.audio_encoder(),
                "-b:a",
                &self.opts.audio_bits_per_second.to_string(),
                "-t",
                &format!("{duration:.6}"),
            ]);
        if self.codec == ContainerCodec::Mp4H264 {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.args(["-f", self.codec.muxer()]).arg(out);

        let output = cmd
            .stdin(Stdio::null())
            .output()
            .context("run ffmpeg mux step")?;
        if !output.status.success() {
            return Err(MergeError::Other(anyhow!(
                "ffmpeg mux exited with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl Recorder for FfmpegRecorder {
    fn start(&mut self) -> MergeResult<()> {
        if self.child.is_some() {
            return Err(MergeError::validation("ffmpeg recorder already started"));
        }
        let video_path = self.work_path("video.mkv")?;
        let audio_path = self.work_path("audio.f32le")?;

        let mut cmd = Command::new(&self.opts.ffmpeg_bin);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        // Input: raw RGBA8 frames, flattened before they are queued.
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", self.cfg.width, self.cfg.height),
            "-r",
            &format!("{}/{}", self.cfg.fps.num, self.cfg.fps.den),
            "-i",
            "pipe:0",
            "-an",
            "-c:v",
            self.codec.video_encoder(),
            "-b:v",
            &self.cfg.video_bits_per_second.to_string(),
            "-pix_fmt",
            "yuv420p",
        ]);
        match self.codec.video_encoder() {
            "libvpx-vp9" => cmd.args(["-deadline", "realtime", "-cpu-used", "8"]),
            _ => cmd.args(["-preset", "veryfast"]),
        };
        cmd.args(["-f", "matroska"]).arg(&video_path);

        let audio = File::create(&audio_path)
            .with_context(|| format!("create audio spool '{}'", audio_path.display()))?;
        let mut child = cmd.spawn().map_err(|e| {
            MergeError::Other(anyhow!(
                "failed to spawn '{}' (is it installed and on PATH?): {e}",
                self.opts.ffmpeg_bin.display()
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });
        let (tx, rx) = mpsc::channel();
        let spooler = std::thread::spawn(move || run_spooler(rx, stdin, BufWriter::new(audio)));

        self.child = Some(child);
        self.spool = Some(tx);
        self.spooler = Some(spooler);
        self.stderr_drain = Some(stderr_drain);
        tracing::debug!(
            codec = self.codec.label(),
            width = self.cfg.width,
            height = self.cfg.height,
            frames = self.timeline.total(),
            "ffmpeg recorder started"
        );
        Ok(())
    }

    fn write_video(&mut self, frame: &VideoFrame) -> MergeResult<()> {
        if frame.raster.size() != (self.cfg.width, self.cfg.height) {
            return Err(MergeError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.raster.width, frame.raster.height, self.cfg.width, self.cfg.height
            )));
        }
        let Self {
            timeline,
            spool,
            opts,
            ..
        } = self;
        timeline.place(frame, |raster| queue_frame(spool, &raster.data, opts.bg_rgba))
    }

    fn write_audio(&mut self, block: &AudioBlock) -> MergeResult<()> {
        send_spool(&self.spool, SpoolItem::Audio(block.samples.clone()))?;
        self.audio_samples += block.samples.len() as u64;
        Ok(())
    }

    fn take_chunks(&mut self) -> Vec<EncodedChunk> {
        Vec::new()
    }

    fn stop(&mut self) -> MergeResult<RecorderOutput> {
        self.finish_video()?;

        let video_path = self.work_path("video.mkv")?;
        let audio_path = self.work_path("audio.f32le")?;
        let out_path = self.work_path(&format!("out.{}", self.codec.extension()))?;
        self.mux(&video_path, &audio_path, &out_path)?;

        let bytes = std::fs::read(&out_path)
            .with_context(|| format!("read encoded output '{}'", out_path.display()))?;
        self.workdir = None;
        tracing::debug!(
            codec = self.codec.label(),
            bytes = bytes.len(),
            "ffmpeg recorder finalized"
        );
        Ok(RecorderOutput {
            chunks: bytes
                .chunks(OUTPUT_CHUNK_BYTES)
                .map(|c| EncodedChunk { data: c.to_vec() })
                .collect(),
            video_frames: self.timeline.emitted(),
            audio_samples: self.audio_samples,
        })
    }

    fn abort(&mut self) {
        drop(self.spool.take());
        // Killing the encoder first unblocks a spooler stuck on a full pipe.
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.spooler.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        self.workdir = None;
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        self.abort();
    }
}

fn queue_frame(
    spool: &Option<mpsc::Sender<SpoolItem>>,
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> MergeResult<()> {
    let mut frame = vec![0u8; src_premul.len()];
    flatten_premul_over_bg_to_opaque_rgba8(&mut frame, src_premul, bg_rgba)?;
    send_spool(spool, SpoolItem::Frame(frame))
}

fn send_spool(spool: &Option<mpsc::Sender<SpoolItem>>, item: SpoolItem) -> MergeResult<()> {
    let Some(tx) = spool.as_ref() else {
        return Err(MergeError::validation("ffmpeg recorder is not accepting data"));
    };
    tx.send(item).map_err(|_| {
        MergeError::Other(anyhow!("ffmpeg spooler stopped early (encoder input closed)"))
    })
}

/// Drain queued frames into the encoder and samples into the audio spool.
///
/// Returns once every sender is gone; dropping `stdin` then signals end of input.
fn run_spooler(
    rx: mpsc::Receiver<SpoolItem>,
    mut stdin: ChildStdin,
    mut audio: BufWriter<File>,
) -> MergeResult<()> {
    for item in rx {
        match item {
            SpoolItem::Frame(frame) => stdin
                .write_all(&frame)
                .map_err(|e| anyhow!("failed to write frame to ffmpeg stdin: {e}"))?,
            SpoolItem::Audio(samples) => {
                for s in samples {
                    audio
                        .write_all(&s.to_le_bytes())
                        .context("write audio spool")?;
                }
            }
        }
    }
    audio.flush().context("flush audio spool")?;
    Ok(())
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> MergeResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(MergeError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];
    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }
        let inv = 255 - a;
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255_u16(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
    }
    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> MergeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
