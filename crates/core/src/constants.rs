//! Shared constants for the TDOA bearing pipeline.

/// Frame sentinel byte. A frame starts with two of these.
pub const HEADER_BYTE: u8 = 0xFF;

/// Number of sentinel bytes preceding every frame payload.
pub const HEADER_LEN: usize = 2;

/// Default samples per channel (1ms at 250kHz = 250 samples)
pub const DEFAULT_SAMPLES_PER_CHANNEL: usize = 250;

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 250_000.0;

/// Speed of sound in air (m/s)
pub const DEFAULT_SPEED_OF_SOUND: f64 = 343.0;

/// Distance between the two sensors (m)
pub const DEFAULT_SENSOR_SPACING_M: f64 = 0.05;

/// Wire block labels, in emission order.
pub const LABEL_CHANNEL_A: &str = "SIG1_DATA";
pub const LABEL_CHANNEL_B: &str = "SIG2_DATA";
pub const LABEL_CORRELATION: &str = "CORR_DATA";

/// Total wire length of one frame carrying `samples_per_channel` samples per channel.
pub const fn frame_len(samples_per_channel: usize) -> usize {
    HEADER_LEN + 2 * samples_per_channel
}

/// Length of the correlation sequence for two inputs of length `n`.
pub const fn result_len(n: usize) -> usize {
    if n == 0 {
        0
    } else {
        2 * n - 1
    }
}
