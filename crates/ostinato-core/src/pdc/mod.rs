//! Delay compensation helpers.

mod delay_buffer;

pub use delay_buffer::DelayBuffer;
