//! Mono circular delay line.

/// Delays one channel by a fixed number of frames.
#[derive(Debug, Clone)]
pub struct DelayBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayBuffer {
    pub fn new(delay_samples: usize) -> Self {
        Self {
            buffer: vec![0.0; delay_samples.max(1)],
            write_pos: 0,
            delay_samples,
        }
    }

    #[inline]
    fn read_pos(&self) -> usize {
        // buffer length equals the delay, so the oldest sample sits at write_pos
        self.write_pos
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        if self.delay_samples == 0 {
            return input;
        }
        let pos = self.read_pos();
        let delayed = self.buffer[pos];
        self.buffer[pos] = input;
        self.write_pos = (pos + 1) % self.buffer.len();
        delayed
    }

    /// Delays `input` into `output`. Returns the frames processed, the
    /// shorter of the two lengths.
    #[inline]
    pub fn process_batch(&mut self, input: &[f32], output: &mut [f32]) -> usize {
        let nframes = input.len().min(output.len());
        if self.delay_samples == 0 {
            output[..nframes].copy_from_slice(&input[..nframes]);
            return nframes;
        }
        for (out, &sample) in output[..nframes].iter_mut().zip(&input[..nframes]) {
            *out = self.process(sample);
        }
        nframes
    }

    /// Delays `buf` in place.
    #[inline]
    pub fn process_in_place(&mut self, buf: &mut [f32]) {
        if self.delay_samples == 0 {
            return;
        }
        for sample in buf.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Changes the delay and clears the history. Allocates when the delay grows.
    pub fn set_delay(&mut self, delay_samples: usize) {
        if delay_samples == self.delay_samples {
            return;
        }
        self.delay_samples = delay_samples;
        self.buffer.resize(delay_samples.max(1), 0.0);
        self.clear();
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}
