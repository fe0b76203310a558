//! Speech collaborators: transcription in, synthesis out.
//!
//! Both directions shell out to external tooling (ffmpeg for container
//! conversion, configurable transcriber/synthesizer commands), bounded by
//! one timeout so a stuck subprocess cannot hang the request.

use async_trait::async_trait;
use mesa_common::error::MesaError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SpeechConfig;

#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Turn an uploaded audio clip into text.
    async fn transcribe(&self, audio: &[u8]) -> Result<String, MesaError>;

    /// Turn text into an audio asset; returns the asset's file name in
    /// the media directory.
    async fn synthesize(&self, text: &str) -> Result<String, MesaError>;
}

/// Subprocess-backed speech service.
pub struct CommandSpeech {
    config: SpeechConfig,
    media_dir: PathBuf,
}

impl CommandSpeech {
    pub fn new(config: SpeechConfig, media_dir: &Path) -> Self {
        Self {
            config,
            media_dir: media_dir.to_path_buf(),
        }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<String, MesaError> {
        debug!("Running {program} {args:?}");
        let child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MesaError::Upstream(format!("{program}: {e}")))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| MesaError::Timeout(self.config.timeout_secs))?
            .map_err(|e| MesaError::Upstream(format!("{program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MesaError::Upstream(format!(
                "{program} failed: {}",
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Split a configured command string into program + leading args.
    fn command_parts(cmd: &str) -> Result<Vec<&str>, MesaError> {
        let parts: Vec<&str> = cmd.split_whitespace().collect();
        if parts.is_empty() {
            return Err(MesaError::Upstream("empty speech command".into()));
        }
        Ok(parts)
    }
}

#[async_trait]
impl SpeechService for CommandSpeech {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, MesaError> {
        let stem = Uuid::new_v4().to_string();
        let clip_path = std::env::temp_dir().join(format!("{stem}.webm"));
        let wav_path = std::env::temp_dir().join(format!("{stem}.wav"));

        tokio::fs::write(&clip_path, audio).await?;

        let result = async {
            self.run(
                "ffmpeg",
                &[
                    "-y",
                    "-i",
                    clip_path.to_str().unwrap_or_default(),
                    wav_path.to_str().unwrap_or_default(),
                ],
            )
            .await?;

            let parts = Self::command_parts(&self.config.transcriber_cmd)?;
            let mut args: Vec<&str> = parts[1..].to_vec();
            let wav = wav_path.to_str().unwrap_or_default().to_string();
            args.push(&wav);
            let transcript = self.run(parts[0], &args).await?;
            Ok(transcript.trim().to_string())
        }
        .await;

        let _ = tokio::fs::remove_file(&clip_path).await;
        let _ = tokio::fs::remove_file(&wav_path).await;

        if let Ok(text) = &result {
            info!("Transcribed {} bytes of audio: {text}", audio.len());
        }
        result
    }

    async fn synthesize(&self, text: &str) -> Result<String, MesaError> {
        tokio::fs::create_dir_all(&self.media_dir).await?;
        let file_name = format!("{}.wav", Uuid::new_v4());
        let out_path = self.media_dir.join(&file_name);

        let parts = Self::command_parts(&self.config.synthesizer_cmd)?;
        let mut args: Vec<&str> = parts[1..].to_vec();
        let out = out_path.to_str().unwrap_or_default().to_string();
        args.push(&out);
        args.push(text);

        self.run(parts[0], &args).await?;
        debug!("Synthesized speech asset {file_name}");
        Ok(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech_with(synthesizer: &str, dir: &Path) -> CommandSpeech {
        CommandSpeech::new(
            SpeechConfig {
                synthesizer_cmd: synthesizer.to_string(),
                timeout_secs: 5,
                ..Default::default()
            },
            dir,
        )
    }

    #[tokio::test]
    async fn synthesize_writes_into_media_dir() {
        let dir = tempfile::tempdir().unwrap();
        // "touch" stands in for a synthesizer: it creates the output file.
        // The text argument is a path too so touch leaves it in the tempdir.
        let text = dir.path().join("spoken-text");
        let speech = speech_with("touch", dir.path());
        let file = speech.synthesize(text.to_str().unwrap()).await.unwrap();
        assert!(file.ends_with(".wav"));
        assert!(dir.path().join(&file).exists());
    }

    #[tokio::test]
    async fn missing_tool_is_an_upstream_error() {
        let dir = tempfile::tempdir().unwrap();
        let speech = speech_with("definitely-not-a-real-binary", dir.path());
        let err = speech.synthesize("hello").await.unwrap_err();
        assert!(matches!(err, MesaError::Upstream(_)));
    }
}
