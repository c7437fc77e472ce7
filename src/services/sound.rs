//! Alert sound playback with rodio.
//!
//! The audio output stream is not `Send` on every platform, so it lives on a
//! dedicated thread that is spawned on the first playback and reused until
//! [`SoundSink::release`] is called.

use async_trait::async_trait;
use rodio::source::SineWave;
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::AppError;
use crate::services::alerts::SoundSink;

/// Length of the built-in chime.
const CHIME_DURATION: Duration = Duration::from_millis(180);

/// Frequency of the built-in chime (A5).
const CHIME_FREQUENCY_HZ: f32 = 880.0;

/// A playback request with a channel for its result.
struct PlayRequest {
    reply: oneshot::Sender<Result<(), AppError>>,
}

/// Plays a sound file, or a short chime when none is configured.
pub struct RodioSound {
    sound_file: Option<PathBuf>,
    player: Mutex<Option<mpsc::Sender<PlayRequest>>>,
}

impl RodioSound {
    pub fn new(sound_file: Option<PathBuf>) -> Self {
        Self {
            sound_file,
            player: Mutex::new(None),
        }
    }

    /// Queue a request on the audio thread, spawning it if needed.
    fn submit(&self, request: PlayRequest) -> Result<(), AppError> {
        let mut player = self
            .player
            .lock()
            .map_err(|_| AppError::internal("audio player lock poisoned"))?;

        let request = match player.as_ref() {
            Some(tx) => match tx.send(request) {
                Ok(()) => return Ok(()),
                // The audio thread exited (e.g. no output device); start over
                Err(mpsc::SendError(request)) => request,
            },
            None => request,
        };

        let tx = spawn_audio_thread(self.sound_file.clone())?;
        tx.send(request)
            .map_err(|_| AppError::notification("Audio thread exited immediately"))?;
        *player = Some(tx);
        Ok(())
    }
}

#[async_trait]
impl SoundSink for RodioSound {
    async fn play(&self) -> Result<(), AppError> {
        let (reply, result) = oneshot::channel();
        self.submit(PlayRequest { reply })?;

        result
            .await
            .map_err(|_| AppError::notification("Audio thread dropped the request"))?
    }

    fn release(&self) {
        if let Ok(mut player) = self.player.lock() {
            if player.take().is_some() {
                log::debug!("[sound] Audio output released");
            }
        }
    }
}

/// Spawn the thread that owns the output stream.
///
/// The thread exits when the sender is dropped or the stream cannot be opened.
fn spawn_audio_thread(sound_file: Option<PathBuf>) -> Result<mpsc::Sender<PlayRequest>, AppError> {
    let (tx, rx) = mpsc::channel::<PlayRequest>();

    std::thread::Builder::new()
        .name("notifier-audio".to_string())
        .spawn(move || {
            let stream = match OutputStreamBuilder::open_default_stream() {
                Ok(stream) => stream,
                Err(e) => {
                    let message = format!("No audio output available: {}", e);
                    // Answer whatever is queued; the next play starts a new thread
                    while let Ok(request) = rx.try_recv() {
                        let _ = request.reply.send(Err(AppError::notification(message.clone())));
                    }
                    return;
                }
            };

            for request in rx.iter() {
                let sink = Sink::connect_new(stream.mixer());
                let result = append_sound(&sink, sound_file.as_deref());
                if result.is_ok() {
                    sink.detach();
                }
                let _ = request.reply.send(result);
            }
        })
        .map_err(|e| AppError::notification(format!("Failed to start audio thread: {}", e)))?;

    Ok(tx)
}

fn append_sound(sink: &Sink, sound_file: Option<&Path>) -> Result<(), AppError> {
    match sound_file {
        Some(path) => {
            let file = File::open(path).map_err(|e| {
                AppError::notification(format!("Cannot open {}: {}", path.display(), e))
            })?;
            let source = Decoder::new(BufReader::new(file)).map_err(|e| {
                AppError::notification(format!("Cannot decode {}: {}", path.display(), e))
            })?;
            sink.append(source);
        }
        None => sink.append(chime()),
    }
    Ok(())
}

fn chime() -> impl Source + Send + 'static {
    SineWave::new(CHIME_FREQUENCY_HZ)
        .take_duration(CHIME_DURATION)
        .amplify(0.2)
}
