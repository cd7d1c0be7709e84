//! `AudioAnalyzer`: the uniform async interface callers program against.
//!
//! [`AudioOrchestrator`] implements it with worker dispatch and inline
//! fallback.  [`InlineAnalyzer`] implements it without any background
//! thread, for when the worker is disabled in config.

use async_trait::async_trait;

use crate::audio::{AudioFormat, PreprocessOptions};

use super::handlers;
use super::orchestrator::{AudioOrchestrator, DispatchError};
use super::protocol::{ChunkAnalysis, PreprocessResult, SpectrumResult, WaveformResult};

/// Async analysis operations over raw PCM16 chunks.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// (e.g. held as `Arc<dyn AudioAnalyzer>`).
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn process_audio_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<ChunkAnalysis, DispatchError>;

    async fn generate_waveform(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<WaveformResult, DispatchError>;

    async fn compute_fft(
        &self,
        data: &[u8],
        format: AudioFormat,
        fft_size: usize,
        frequency_bins: usize,
    ) -> Result<SpectrumResult, DispatchError>;

    async fn preprocess_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        options: PreprocessOptions,
    ) -> Result<PreprocessResult, DispatchError>;
}

#[async_trait]
impl AudioAnalyzer for AudioOrchestrator {
    async fn process_audio_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<ChunkAnalysis, DispatchError> {
        AudioOrchestrator::process_audio_chunk(self, data, format, bar_count).await
    }

    async fn generate_waveform(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<WaveformResult, DispatchError> {
        AudioOrchestrator::generate_waveform(self, data, format, bar_count).await
    }

    async fn compute_fft(
        &self,
        data: &[u8],
        format: AudioFormat,
        fft_size: usize,
        frequency_bins: usize,
    ) -> Result<SpectrumResult, DispatchError> {
        AudioOrchestrator::compute_fft(self, data, format, fft_size, frequency_bins).await
    }

    async fn preprocess_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        options: PreprocessOptions,
    ) -> Result<PreprocessResult, DispatchError> {
        AudioOrchestrator::preprocess_chunk(self, data, format, options).await
    }
}

// ---------------------------------------------------------------------------
// InlineAnalyzer
// ---------------------------------------------------------------------------

/// Runs every operation on the calling task.
///
/// Unlike the orchestrator's fallback, this *does* compute the FFT inline:
/// there is no worker to protect the caller from.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineAnalyzer;

#[async_trait]
impl AudioAnalyzer for InlineAnalyzer {
    async fn process_audio_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<ChunkAnalysis, DispatchError> {
        Ok(handlers::process_audio_chunk(data, &format, bar_count)?)
    }

    async fn generate_waveform(
        &self,
        data: &[u8],
        format: AudioFormat,
        bar_count: usize,
    ) -> Result<WaveformResult, DispatchError> {
        Ok(handlers::generate_waveform(data, &format, bar_count)?)
    }

    async fn compute_fft(
        &self,
        data: &[u8],
        format: AudioFormat,
        fft_size: usize,
        frequency_bins: usize,
    ) -> Result<SpectrumResult, DispatchError> {
        Ok(handlers::compute_fft(data, &format, fft_size, frequency_bins)?)
    }

    async fn preprocess_chunk(
        &self,
        data: &[u8],
        format: AudioFormat,
        options: PreprocessOptions,
    ) -> Result<PreprocessResult, DispatchError> {
        Ok(handlers::preprocess_chunk(data, &format, options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::audio::float_to_pcm16;
    use crate::worker::OrchestratorConfig;

    fn tone() -> Vec<u8> {
        let samples: Vec<f32> = (0..2_048)
            .map(|i| (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 16_000.0).sin() * 0.5)
            .collect();
        float_to_pcm16(&samples)
    }

    #[test]
    fn analyzers_are_object_safe() {
        let _: Box<dyn AudioAnalyzer> = Box::new(InlineAnalyzer);
    }

    #[tokio::test]
    async fn inline_and_orchestrated_results_match() {
        let format = AudioFormat::mono16(16_000);
        let orchestrator = AudioOrchestrator::new(OrchestratorConfig::default());
        assert!(orchestrator.wait_ready(Duration::from_secs(2)).await);

        let analyzers: Vec<Arc<dyn AudioAnalyzer>> =
            vec![Arc::new(InlineAnalyzer), Arc::new(orchestrator)];

        let pcm = tone();
        let mut levels = Vec::new();
        let mut dominants = Vec::new();
        for analyzer in &analyzers {
            let chunk = analyzer.process_audio_chunk(&pcm, format, 28).await.unwrap();
            let spectrum = analyzer.compute_fft(&pcm, format, 2_048, 64).await.unwrap();
            levels.push((chunk.rms_level, chunk.peak_level));
            dominants.push(spectrum.dominant_frequency);
        }

        assert!((levels[0].0 - levels[1].0).abs() < 1e-6);
        assert!((levels[0].1 - levels[1].1).abs() < 1e-6);
        assert_eq!(dominants[0], dominants[1]);
    }

    #[tokio::test]
    async fn inline_fft_never_zeroes() {
        let spectrum = InlineAnalyzer
            .compute_fft(&tone(), AudioFormat::mono16(16_000), 2_048, 16)
            .await
            .unwrap();
        assert!(spectrum.dominant_frequency > 0.0);
    }
}
