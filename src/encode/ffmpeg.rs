use crate::encode::sink::{CaptureSink, ContainerFormat, RecordedMedia, SinkConfig};
use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::backend::FrameRGBA;
use anyhow::Context as _;
use std::io::{BufWriter, Read, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Options for [`FfmpegSink`].
#[derive(Clone, Debug)]
pub struct FfmpegSinkOpts {
    /// `ffmpeg` executable.
    pub program: PathBuf,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
}

impl Default for FfmpegSinkOpts {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            bg_rgba: [0, 0, 0, 255],
        }
    }
}

fn video_args(format: ContainerFormat) -> &'static [&'static str] {
    match format {
        ContainerFormat::Mp4 => &[
            "-c:v", "libx264", "-pix_fmt", "yuv420p", "-preset", "veryfast",
        ],
        ContainerFormat::WebM => &[
            "-c:v", "libvpx-vp9", "-pix_fmt", "yuv420p", "-deadline", "realtime", "-b:v", "0",
            "-crf", "32",
        ],
    }
}

fn audio_args(format: ContainerFormat) -> &'static [&'static str] {
    match format {
        ContainerFormat::Mp4 => &["-c:a", "aac", "-b:a", "192k"],
        ContainerFormat::WebM => &["-c:a", "libopus", "-b:a", "128k"],
    }
}

fn required_encoders(format: ContainerFormat) -> [&'static str; 2] {
    match format {
        ContainerFormat::Mp4 => ["libx264", "aac"],
        ContainerFormat::WebM => ["libvpx-vp9", "libopus"],
    }
}

struct Recording {
    cfg: SinkConfig,
    dir: tempfile::TempDir,
    video_path: PathBuf,
    audio_path: PathBuf,
    audio_out: Option<BufWriter<std::fs::File>>,
    audio_samples: u64,
}

/// Sink that encodes through the system `ffmpeg`.
///
/// Frames stream to an `ffmpeg` child over stdin and are encoded into a video-only file in the
/// chosen container. Mixed audio is spooled to a raw `f32le` file. `end` waits for the encoder,
/// muxes both into the final container and returns its bytes.
pub struct FfmpegSink {
    opts: FfmpegSinkOpts,

    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,

    scratch: Vec<u8>,
    rec: Option<Recording>,
    last_idx: Option<FrameIndex>,
}

impl std::fmt::Debug for FfmpegSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSink")
            .field("program", &self.opts.program)
            .field("recording", &self.child.is_some())
            .field("last_idx", &self.last_idx)
            .finish()
    }
}

impl FfmpegSink {
    /// Create a new sink that streams into `ffmpeg`.
    pub fn new(opts: FfmpegSinkOpts) -> Self {
        Self {
            opts,
            child: None,
            stdin: None,
            stderr_drain: None,
            scratch: Vec::new(),
            rec: None,
            last_idx: None,
        }
    }

    fn ffmpeg_listing(&self, flag: &str) -> Option<String> {
        let out = Command::new(&self.opts.program)
            .args(["-hide_banner", flag])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()?;
        out.status
            .success()
            .then(|| String::from_utf8_lossy(&out.stdout).into_owned())
    }

    fn wait_encoder(&mut self) -> ReelResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| ReelError::recording(format!("failed to wait for ffmpeg to finish: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ReelError::recording("ffmpeg stderr drain thread panicked"))?
                .map_err(|e| ReelError::recording(format!("ffmpeg stderr read failed: {e}")))?,
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(ReelError::recording(format!(
                "ffmpeg exited with status {}: {}",
                status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn mux(&self, rec: &Recording) -> ReelResult<PathBuf> {
        let out_path = rec
            .dir
            .path()
            .join(format!("reel.{}", rec.cfg.format.extension()));
        let Some(audio) = rec.cfg.audio.filter(|_| rec.audio_samples > 0) else {
            return Ok(rec.video_path.clone());
        };

        let mut cmd = Command::new(&self.opts.program);
        cmd.args(["-y", "-loglevel", "error", "-i"])
            .arg(&rec.video_path)
            .args([
                "-f",
                "f32le",
                "-ar",
                &audio.sample_rate.to_string(),
                "-ac",
                &audio.channels.to_string(),
                "-i",
            ])
            .arg(&rec.audio_path)
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"])
            .args(audio_args(rec.cfg.format));
        if rec.cfg.format == ContainerFormat::Mp4 {
            cmd.args(["-movflags", "+faststart"]);
        }
        cmd.arg(&out_path);

        let out = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .map_err(|e| ReelError::recording(format!("failed to spawn ffmpeg mux pass: {e}")))?;
        if !out.status.success() {
            return Err(ReelError::recording(format!(
                "ffmpeg mux exited with status {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(out_path)
    }
}

impl CaptureSink for FfmpegSink {
    fn is_type_supported(&self, format: ContainerFormat) -> bool {
        let Some(encoders) = self.ffmpeg_listing("-encoders") else {
            return false;
        };
        let Some(muxers) = self.ffmpeg_listing("-muxers") else {
            return false;
        };
        let has_encoder = |name: &str| {
            encoders
                .lines()
                .any(|l| l.split_whitespace().nth(1) == Some(name))
        };
        let has_muxer = muxers.lines().any(|l| {
            l.split_whitespace()
                .nth(1)
                .is_some_and(|names| names.split(',').any(|n| n == format.extension()))
        });
        has_muxer && required_encoders(format).iter().all(|e| has_encoder(e))
    }

    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        if self.child.is_some() {
            return Err(ReelError::recording("ffmpeg sink is already recording"));
        }
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(ReelError::validation("fps must be non-zero"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(ReelError::validation(
                "ffmpeg sink width/height must be non-zero",
            ));
        }
        if !cfg.width.is_multiple_of(2) || !cfg.height.is_multiple_of(2) {
            return Err(ReelError::validation(
                "ffmpeg sink width/height must be even (required for yuv420p output)",
            ));
        }
        if let Some(audio) = cfg.audio
            && (audio.sample_rate == 0 || audio.channels == 0)
        {
            return Err(ReelError::validation(
                "audio sample_rate and channels must be non-zero when audio is enabled",
            ));
        }

        let dir = tempfile::Builder::new()
            .prefix("reelcast-")
            .tempdir()
            .context("create capture scratch directory")?;
        let video_path = dir
            .path()
            .join(format!("video.{}", cfg.format.extension()));
        let audio_path = dir.path().join("audio.f32le");
        let audio_out = match cfg.audio {
            Some(_) => Some(BufWriter::new(
                std::fs::File::create(&audio_path).context("create audio spool file")?,
            )),
            None => None,
        };

        let mut cmd = Command::new(&self.opts.program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Input: raw premultiplied RGBA8 frames. `ffmpeg` does not understand premul, so we
        // flatten alpha before writing to stdin (push_frame).
        cmd.args([
            "-y",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.width, cfg.height),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an"])
            .args(video_args(cfg.format))
            .arg(&video_path);

        let mut child = cmd.spawn().map_err(|e| {
            ReelError::capture_unsupported(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelError::recording("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::recording("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::info!(
            format = %cfg.format,
            width = cfg.width,
            height = cfg.height,
            scratch = %dir.path().display(),
            "ffmpeg capture started"
        );
        self.scratch = vec![0u8; (cfg.width as usize) * (cfg.height as usize) * 4];
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        self.rec = Some(Recording {
            cfg,
            dir,
            video_path,
            audio_path,
            audio_out,
            audio_samples: 0,
        });
        self.last_idx = None;
        Ok(())
    }

    fn is_recording(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        let cfg = &self
            .rec
            .as_ref()
            .ok_or_else(|| ReelError::recording("ffmpeg sink not started"))?
            .cfg;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(ReelError::recording(
                "ffmpeg sink received out-of-order frame index",
            ));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }
        if frame.data.len() != self.scratch.len() {
            return Err(ReelError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }
        self.last_idx = Some(idx);

        // Flatten premultiplied RGBA8 over the configured background.
        flatten_premul_over_bg_to_opaque_rgba8(&mut self.scratch, &frame.data, self.opts.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(ReelError::recording("ffmpeg sink is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            ReelError::recording(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn push_audio(&mut self, interleaved: &[f32]) -> ReelResult<()> {
        let rec = self
            .rec
            .as_mut()
            .ok_or_else(|| ReelError::recording("ffmpeg sink not started"))?;
        let Some(out) = rec.audio_out.as_mut() else {
            return Err(ReelError::validation("capture was configured without audio"));
        };
        for &sample in interleaved {
            out.write_all(&sample.to_le_bytes())
                .map_err(|e| ReelError::recording(format!("failed to spool audio: {e}")))?;
        }
        rec.audio_samples += interleaved.len() as u64;
        Ok(())
    }

    fn end(&mut self) -> ReelResult<RecordedMedia> {
        let mut rec = self
            .rec
            .take()
            .ok_or_else(|| ReelError::recording("ffmpeg sink not started"))?;
        let encoded = self.wait_encoder();
        if let Some(mut out) = rec.audio_out.take() {
            out.flush()
                .map_err(|e| ReelError::recording(format!("failed to flush audio spool: {e}")))?;
        }
        encoded?;

        let final_path = self.mux(&rec)?;
        let bytes = read_output(&final_path)?;
        tracing::info!(
            format = %rec.cfg.format,
            bytes = bytes.len(),
            frames = self.last_idx.map_or(0, |i| i.0 + 1),
            "ffmpeg capture finished"
        );
        Ok(RecordedMedia {
            bytes,
            format: rec.cfg.format,
        })
    }

    fn abort(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
        self.rec = None;
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.abort();
    }
}

fn read_output(path: &Path) -> ReelResult<Vec<u8>> {
    let bytes = std::fs::read(path)
        .map_err(|e| ReelError::recording(format!("failed to read '{}': {e}", path.display())))?;
    if bytes.is_empty() {
        return Err(ReelError::recording("encoder produced an empty container"));
    }
    Ok(bytes)
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> ReelResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(ReelError::validation(
            "flatten expects equal-length rgba8 buffers",
        ));
    }

    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let inv = 255u16 - u16::from(s[3]);
        for c in 0..3 {
            d[c] = (u16::from(s[c]) + mul_div255_u16(bg[c], inv)).min(255) as u8;
        }
        d[3] = 255;
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

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
