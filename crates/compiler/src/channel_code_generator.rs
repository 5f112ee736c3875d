//! Channel state to code generator

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use log::debug;

use crate::alpha_code::{AlphaCode, VolumeField, WriteDelta};
use crate::driver_constants::MAX_SUSTAIN_FRAMES;
use crate::register_dump::ChannelState;
use crate::value_newtypes::AudioVolume;

fn volume_field(last: AudioVolume, next: AudioVolume) -> VolumeField {
    if next.as_u8() == last.as_u8().wrapping_add(1) {
        VolumeField::StepUp
    } else if last.as_u8() > 0 && next.as_u8() == last.as_u8() - 1 {
        VolumeField::StepDown
    } else {
        VolumeField::Absolute(next)
    }
}

/// Translates one interval into `AlphaCode`s, appending to `out`.
///
/// Returns the state the decoder holds after interpreting the emitted
/// codes.  A `PAUSE` only zeroes the volume register, so control and
/// frequency stay at their last committed values through silence.
pub fn encode_channel_state_codes(
    next: &ChannelState,
    duration: u8,
    last: &ChannelState,
    out: &mut Vec<AlphaCode>,
) -> ChannelState {
    if duration == 0 {
        debug!("0 duration note");
    }
    let mut frames = u32::from(duration).max(1);

    let control_changed = next.control != last.control;
    let frequency_changed = next.frequency != last.frequency;
    let volume_changed = next.volume != last.volume;

    let committed;
    if next.volume.as_u8() == 0 {
        out.push(AlphaCode::Pause { duration: 1 });
        frames -= 1;
        committed = ChannelState {
            control: last.control,
            frequency: last.frequency,
            volume: AudioVolume::MIN,
        };
    } else if control_changed || frequency_changed || volume_changed {
        // A control change forces the frequency and volume flags on:
        // the decoder reads all three as one packed byte pair.
        out.push(AlphaCode::WriteDelta(WriteDelta {
            control: control_changed.then_some(next.control),
            frequency: (frequency_changed || control_changed).then_some(next.frequency),
            volume: (volume_changed || control_changed)
                .then(|| volume_field(last.volume, next.volume)),
            duration: 1,
        }));
        frames -= 1;
        committed = *next;
    } else {
        committed = *last;
    }

    while frames > 0 {
        let d = frames.min(u32::from(MAX_SUSTAIN_FRAMES)) as u8;
        out.push(AlphaCode::Sustain { duration: d });
        frames -= u32::from(d);
    }

    committed
}

/// The TIAComp format-0 byte encoding of one interval.
///
/// ```text
///   fffff010 ccccvvvv           frequency + control + volume, duration 1
///   fffff110 ccccvvvv           " " ", duration 2
///   dddd1100                    sustain d+1 frames
///   dddd0100                    pause d+1 frames
///   xxxx0001                    volume = x >> 4, duration 1
///   xxxx1001                    volume = x >> 4, duration 2
///   xxxx0101                    control = x >> 4, duration 1
///   xxxx1101                    control = x >> 4, duration 2
///   xxxxx011                    frequency = x >> 3, duration 1
///   xxxxx111                    frequency = x >> 3, duration 2
///   00000000                    stop
/// ```
///
/// Returns the frames not yet covered when `encode_remainder` is false
/// and a register changed; otherwise the remainder is emitted as
/// sustain bytes and 0 is returned.
pub fn encode_channel_state_bytes(
    next: &ChannelState,
    duration: u8,
    last: &ChannelState,
    encode_remainder: bool,
    out: &mut Vec<u8>,
) -> u8 {
    if duration == 0 {
        debug!("0 duration note");
    }
    let mut framecount = u32::from(duration).max(1);

    let audcx = next.control.as_u8();
    let audfx = next.frequency.as_u8();
    let audvx = next.volume.as_u8();
    let cc = next.control != last.control;
    let fc = next.frequency != last.frequency;
    let vc = next.volume != last.volume;
    let delta = usize::from(cc) + usize::from(fc) + usize::from(vc);

    if audvx == 0 && delta != 0 {
        // volume is zero, pause
        let dmod: u8;
        if framecount > 16 {
            dmod = 15;
            framecount -= 16;
        } else {
            dmod = (framecount - 1) as u8;
            framecount = 0;
        }
        out.push(dmod << 4 | 0x04);
    } else if delta == 1 {
        // only one register changed
        let dmod: u8;
        if framecount > 2 {
            dmod = 1;
            framecount -= 2;
        } else {
            dmod = (framecount - 1) as u8;
            framecount = 0;
        }
        let rx = if fc {
            audfx << 3 | dmod << 2 | 0x03
        } else if cc {
            audcx << 4 | dmod << 3 | 0x05
        } else {
            audvx << 4 | dmod << 3 | 0x01
        };
        out.push(rx);
    } else if delta > 1 {
        // write all registers
        let dmod: u8;
        if framecount > 2 {
            dmod = 1;
            framecount -= 2;
        } else {
            dmod = (framecount - 1) as u8;
            framecount = 0;
        }
        out.push(audfx << 3 | dmod << 2 | 0x02);
        out.push(audcx << 4 | audvx);
    }

    if delta > 0 && !encode_remainder {
        return framecount as u8;
    }

    while framecount > 0 {
        let dmod: u8;
        if framecount > 16 {
            dmod = 15;
            framecount -= 16;
        } else {
            dmod = (framecount - 1) as u8;
            framecount = 0;
        }
        out.push(dmod << 4 | 0x0c);
    }

    0
}
