//! Audio driver: the engine's clock source.
//!
//! Opens a cpal output stream and, before rendering each block, reports
//! the elapsed frames to the engine so it can advance the beat cursor
//! and drain due actions. Rendering itself lives in the DSP process;
//! this stream outputs silence.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use soir_core::Engine;
use std::sync::Arc;

pub struct AudioDriver {
    stream: Stream,
    sample_rate: u32,
}

impl AudioDriver {
    /// Sample rate of the default output device, without opening a
    /// stream. The session host needs it before the engine exists.
    pub fn probe() -> Result<u32> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output device available"))?;
        let config = device.default_output_config()?;
        Ok(config.sample_rate().0)
    }

    /// Open the default output device and start driving `engine`.
    pub fn start(engine: Arc<Engine>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no output device available"))?;
        let config = device.default_output_config()?;

        let sample_format = config.sample_format();
        let sample_rate = config.sample_rate().0;
        let config: StreamConfig = config.into();

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, engine)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, engine)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, engine)?,
            _ => return Err(anyhow!("unsupported sample format: {:?}", sample_format)),
        };
        stream.play()?;

        Ok(Self {
            stream,
            sample_rate,
        })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        engine: Arc<Engine>,
    ) -> Result<Stream>
    where
        T: Sample + SizedSample + Send + 'static,
    {
        let channels = config.channels as usize;

        let err_fn = |err| log::error!("output audio stream error: {}", err);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let frames = (data.len() / channels) as u32;
                    engine.on_block(frames);

                    for sample in data.iter_mut() {
                        *sample = T::EQUILIBRIUM;
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| anyhow!("failed to build output stream: {}", e))?;

        Ok(stream)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn play(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| anyhow!("failed to play stream: {}", e))
    }

    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| anyhow!("failed to pause stream: {}", e))
    }
}
