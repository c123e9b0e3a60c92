use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use avmerge::{
    CommandShareTarget, ContainerCodec, Delivery, ExportOpts, ExportSink, FfmpegHost,
    FfmpegHostOpts, Fps, MediaHost, MergeOpts, SessionOpts, ShareText, VideoInput,
};
use clap::{Parser, Subcommand, ValueEnum};
use sha2::Digest as _;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "avmerge", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record PCM narration over an image or a looping video (requires `ffmpeg` on PATH).
    Merge(MergeArgs),
    /// List the container/codec preference order and what the host supports.
    Codecs(CodecsArgs),
    /// Decode a PCM payload and print its properties.
    DecodePcm(DecodePcmArgs),
}

#[derive(Parser, Debug)]
struct MergeArgs {
    /// Base64 text file with 16-bit little-endian mono PCM at 24 kHz.
    #[arg(long)]
    audio: PathBuf,

    /// Still image (raw bytes, base64 or data URL).
    #[arg(long, conflicts_with = "video", required_unless_present = "video")]
    image: Option<PathBuf>,

    /// Video file looped under the narration.
    #[arg(long)]
    video: Option<PathBuf>,

    /// Directory the artifact is downloaded to.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Output file name; the codec extension is added when missing.
    #[arg(long, default_value = "avmerge")]
    name: String,

    /// Compositor frame rate.
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Container/codec to record.
    #[arg(long, value_enum, default_value_t = CodecChoice::Auto)]
    codec: CodecChoice,

    /// Program to share the result with (exit 130 = dismissed); download otherwise.
    #[arg(long)]
    share_cmd: Option<PathBuf>,

    /// Share sheet title.
    #[arg(long, default_value = "Share video")]
    share_title: String,

    /// Write an artifact manifest (JSON) to this path.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// `ffmpeg` executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

#[derive(Parser, Debug)]
struct CodecsArgs {
    /// `ffmpeg` executable.
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,
}

#[derive(Parser, Debug)]
struct DecodePcmArgs {
    /// Base64 text file with 16-bit little-endian mono PCM at 24 kHz.
    #[arg(long)]
    audio: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CodecChoice {
    Auto,
    Mp4,
    WebmH264,
    WebmVp9,
}

impl CodecChoice {
    fn preference(self) -> Vec<ContainerCodec> {
        match self {
            Self::Auto => ContainerCodec::DEFAULT_PREFERENCE.to_vec(),
            Self::Mp4 => vec![ContainerCodec::Mp4H264],
            Self::WebmH264 => vec![ContainerCodec::WebmH264],
            Self::WebmVp9 => vec![ContainerCodec::WebmVp9],
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Merge(args) => cmd_merge(args).await,
        Command::Codecs(args) => cmd_codecs(args),
        Command::DecodePcm(args) => cmd_decode_pcm(args),
    }
}

async fn cmd_merge(args: MergeArgs) -> anyhow::Result<()> {
    let audio = std::fs::read_to_string(&args.audio)
        .with_context(|| format!("read audio '{}'", args.audio.display()))?;
    let host: Arc<dyn MediaHost> = Arc::new(FfmpegHost::new(FfmpegHostOpts {
        ffmpeg_bin: args.ffmpeg.clone(),
        ..FfmpegHostOpts::default()
    }));
    let opts = MergeOpts {
        session: SessionOpts {
            fps: Fps::new(args.fps, 1)?,
            codec_preference: args.codec.preference(),
            ..SessionOpts::default()
        },
        observer: Some(Box::new(|m: &str| eprintln!("{m}"))),
        cancel: None,
    };

    let artifact = match (&args.image, &args.video) {
        (Some(image), _) => {
            let bytes = std::fs::read(image)
                .with_context(|| format!("read image '{}'", image.display()))?;
            avmerge::merge_audio_and_image(host, bytes, &audio, opts).await?
        }
        (None, Some(video)) => {
            avmerge::merge_audio_and_video(host, VideoInput::Path(video.clone()), &audio, opts)
                .await?
        }
        (None, None) => anyhow::bail!("either --image or --video is required"),
    };

    let mut info = artifact.info();
    info.sha256 = Some(sha256_hex(&artifact.bytes));

    let mut sink = ExportSink::new(ExportOpts {
        download_dir: args.out_dir.clone(),
        share: ShareText {
            title: args.share_title.clone(),
            ..ShareText::default()
        },
    });
    if let Some(cmd) = args.share_cmd.as_ref() {
        sink = sink.with_share_target(CommandShareTarget::new(cmd));
    }
    match sink.export(artifact, &args.name)? {
        Delivery::Delivered => eprintln!("shared {}", args.name),
        Delivery::Downloaded(path) => eprintln!("wrote {}", path.display()),
    }

    if let Some(path) = args.manifest.as_ref() {
        avmerge::ensure_parent_dir(path)?;
        let json = serde_json::to_string_pretty(&info).context("serialize manifest")?;
        std::fs::write(path, json)
            .with_context(|| format!("write manifest '{}'", path.display()))?;
    }
    Ok(())
}

fn cmd_codecs(args: CodecsArgs) -> anyhow::Result<()> {
    let host = FfmpegHost::new(FfmpegHostOpts {
        ffmpeg_bin: args.ffmpeg,
        ..FfmpegHostOpts::default()
    });
    eprintln!("probing {}", host.opts().ffmpeg_bin.display());
    for codec in ContainerCodec::DEFAULT_PREFERENCE {
        let supported = if host.is_type_supported(codec) {
            "yes"
        } else {
            "no"
        };
        println!("{:<10} {:<36} {supported}", codec.label(), codec.mime_type());
    }
    Ok(())
}

fn cmd_decode_pcm(args: DecodePcmArgs) -> anyhow::Result<()> {
    let audio = std::fs::read_to_string(&args.audio)
        .with_context(|| format!("read audio '{}'", args.audio.display()))?;
    let sample = avmerge::decode_pcm_base64(&audio)?;
    println!("sample_rate:  {}", sample.sample_rate());
    println!("samples:      {}", sample.len());
    println!("duration_sec: {:.3}", sample.duration_secs());
    println!("peak:         {:.4}", sample.peak());
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
