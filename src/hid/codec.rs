//! Byte codecs for firmware configuration blocks
//!
//! Wire formats match the GPK RC firmware:
//! - Trackpad: 19 bytes. Flags and small fields bit-packed into bytes 0-6,
//!   six big-endian u16 timing/distance fields in bytes 7-18.
//! - Pomodoro: 8 bytes. Direct fields in bytes 0-5, packed flags + 2-bit
//!   phase in byte 6, cycle count in byte 7.
//!
//! All functions are pure; encoders never mutate their input.

use crate::sync::device::{PomodoroConfig, PomodoroPhase, TrackpadConfig};

/// Size of an encoded trackpad configuration
pub const TRACKPAD_CONFIG_LEN: usize = 19;

/// Size of an encoded pomodoro configuration
pub const POMODORO_CONFIG_LEN: usize = 8;

/// Encode a trackpad configuration into its 19-byte wire format.
///
/// Packing:
/// - byte 0: `hf_waveform_number(7b) << 1 | can_hf_for_layer`
/// - byte 1: `can_drag << 7 | drag_strength_mode << 6 | drag_strength(5b) << 1 | can_trackpad_layer`
/// - byte 2: `can_reverse_scrolling_direction << 7 | default_speed(6b) << 1 | can_short_scroll`
/// - byte 3: `scroll_step(4b)`
/// - bytes 4-6: reserved
/// - bytes 7-18: scroll_term, drag_term, tap_term, swipe_term, pinch_term,
///   gesture_term as big-endian u16
pub fn encode_trackpad(config: &TrackpadConfig) -> [u8; TRACKPAD_CONFIG_LEN] {
    let mut bytes = [0u8; TRACKPAD_CONFIG_LEN];

    bytes[0] = ((config.hf_waveform_number & 0x7F) << 1) | config.can_hf_for_layer as u8;
    bytes[1] = ((config.can_drag as u8) << 7)
        | ((config.drag_strength_mode as u8) << 6)
        | ((config.drag_strength & 0x1F) << 1)
        | config.can_trackpad_layer as u8;
    bytes[2] = ((config.can_reverse_scrolling_direction as u8) << 7)
        | ((config.default_speed & 0x3F) << 1)
        | config.can_short_scroll as u8;
    bytes[3] = config.scroll_step & 0x0F;

    let terms = [
        config.scroll_term,
        config.drag_term,
        config.tap_term,
        config.swipe_term,
        config.pinch_term,
        config.gesture_term,
    ];
    for (i, term) in terms.iter().enumerate() {
        let offset = 7 + i * 2;
        bytes[offset..offset + 2].copy_from_slice(&term.to_be_bytes());
    }

    bytes
}

/// Decode a 19-byte trackpad configuration.
///
/// UI-only fields (`auto_layer_*`) are not on the wire and come back as
/// defaults; callers overlay them from the settings store.
pub fn decode_trackpad(bytes: &[u8; TRACKPAD_CONFIG_LEN]) -> TrackpadConfig {
    let term = |i: usize| {
        let offset = 7 + i * 2;
        u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
    };

    TrackpadConfig {
        hf_waveform_number: (bytes[0] >> 1) & 0x7F,
        can_hf_for_layer: bytes[0] & 0x01 != 0,
        can_drag: bytes[1] & 0x80 != 0,
        drag_strength_mode: bytes[1] & 0x40 != 0,
        drag_strength: (bytes[1] >> 1) & 0x1F,
        can_trackpad_layer: bytes[1] & 0x01 != 0,
        can_reverse_scrolling_direction: bytes[2] & 0x80 != 0,
        default_speed: (bytes[2] >> 1) & 0x3F,
        can_short_scroll: bytes[2] & 0x01 != 0,
        scroll_step: bytes[3] & 0x0F,
        scroll_term: term(0),
        drag_term: term(1),
        tap_term: term(2),
        swipe_term: term(3),
        pinch_term: term(4),
        gesture_term: term(5),
        auto_layer_enabled: false,
        auto_layer_settings: serde_json::Value::Null,
    }
}

/// Encode a pomodoro configuration into its 8-byte wire format.
///
/// Layout: `[work_time, break_time, long_break_time, work_interval,
/// work_hf_pattern, break_hf_pattern, flags, cycle]` where
/// `flags = timer_active << 7 | notify_haptic_enable << 6 | continuous_mode << 5 | phase(2b)`
/// and a zero `pomodoro_cycle` encodes as 1.
pub fn encode_pomodoro(config: &PomodoroConfig) -> [u8; POMODORO_CONFIG_LEN] {
    let flags = ((config.timer_active & 0x01) << 7)
        | ((config.notify_haptic_enable & 0x01) << 6)
        | ((config.continuous_mode & 0x01) << 5)
        | (config.phase.as_byte() & 0x03);

    [
        config.work_time,
        config.break_time,
        config.long_break_time,
        config.work_interval,
        config.work_hf_pattern,
        config.break_hf_pattern,
        flags,
        if config.pomodoro_cycle == 0 {
            1
        } else {
            config.pomodoro_cycle
        },
    ]
}

/// Decode an 8-byte pomodoro configuration. Runtime status fields
/// (minutes/seconds/state/current cycle) are not on the wire and decode as 0.
pub fn decode_pomodoro(bytes: &[u8; POMODORO_CONFIG_LEN]) -> PomodoroConfig {
    let flags = bytes[6];
    PomodoroConfig {
        work_time: bytes[0],
        break_time: bytes[1],
        long_break_time: bytes[2],
        work_interval: bytes[3],
        work_hf_pattern: bytes[4],
        break_hf_pattern: bytes[5],
        timer_active: (flags >> 7) & 0x01,
        notify_haptic_enable: (flags >> 6) & 0x01,
        continuous_mode: (flags >> 5) & 0x01,
        phase: PomodoroPhase::from_byte(flags & 0x03),
        pomodoro_cycle: bytes[7],
        ..Default::default()
    }
}
