//! Basic track data export

// SPDX-FileCopyrightText: © 2024 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt::Write;

use crate::data::{ExportConfig, Project};
use crate::driver_constants::{BASIC_RLE_MAX_DURATION, MAX_BASIC_DATA_POINTS, N_TIA_CHANNELS};
use crate::errors::{ExportError, OverflowError};
use crate::export::ExportOutput;
use crate::register_dump::{capture_channel_state_sequence, ChannelState, ChannelStateSequence};

/// Split frequency and control/volume tables, 2 bytes per data point.
///
/// Suitable for sound effects and short game music; every track of
/// both channels must fit a single 256-entry table.
pub(crate) fn write_track_data(
    project: &Project,
    config: &ExportConfig,
    encode_duration: bool,
    ret: &mut Vec<ExportOutput>,
) -> Result<(), ExportError> {
    let num_songs = project.subsongs.len();

    let mut out = String::with_capacity(4096);
    writeln!(out, "; Furnace Tracker audio data file")?;
    writeln!(out, "; Basic data format")?;
    writeln!(out, "; Song: {}", project.name)?;
    writeln!(out, "; Author: {}", project.author)?;

    writeln!(out, "\nAUDIO_NUM_TRACKS = {}", num_songs)?;

    if encode_duration {
        writeln!(out, "\n#include \"cores/basicx_player_core.asm\"")?;
    } else {
        writeln!(out, "\n#include \"cores/basic_player_core.asm\"")?;
    }

    // lookup table for use in player apps, one per channel
    let mut song_table_size = 0;
    for channel in 0..N_TIA_CHANNELS {
        writeln!(out, "AUDIO_TRACKS_{}:", channel)?;
        for subsong in 0..num_songs {
            writeln!(out, "    byte AUDIO_TRACK_{}_{}", subsong, channel)?;
            song_table_size += 1;
        }
    }

    // channels play back independently; a duration field of 3 bits
    // limits the capture granularity
    let max_duration = if encode_duration {
        BASIC_RLE_MAX_DURATION
    } else {
        1
    };
    let mut sequences: Vec<ChannelStateSequence> = Vec::with_capacity(num_songs * N_TIA_CHANNELS);
    let mut data_points = 0;
    for (subsong, s) in project.subsongs.iter().enumerate() {
        for channel in 0..N_TIA_CHANNELS {
            let mut sequence = ChannelStateSequence::new(ChannelState::SILENCE, max_duration);
            capture_channel_state_sequence(
                &s.writes,
                subsong,
                &config.channel_address_map(channel)?,
                &mut sequence,
            )?;
            data_points += sequence.size() + 1;
            sequences.push(sequence);
        }
    }

    if data_points > MAX_BASIC_DATA_POINTS {
        return Err(OverflowError::TooManyDataPoints(data_points).into());
    }

    // Frequency table: dddfffff packed duration + frequency
    let mut freq_table_size = 0;
    writeln!(out, "\n    ; FREQUENCY TABLE")?;
    writeln!(out, "AUDIO_F:")?;
    for channel in 0..N_TIA_CHANNELS {
        for subsong in 0..num_songs {
            let sequence = &sequences[subsong * N_TIA_CHANNELS + channel];
            writeln!(out, "    ; TRACK {}, CHANNEL {}", subsong, channel)?;
            write!(
                out,
                "AUDIO_TRACK_{}_{} = . - AUDIO_F + 1",
                subsong, channel
            )?;
            for (i, n) in sequence.intervals.iter().enumerate() {
                if i % 16 == 0 {
                    write!(out, "\n    byte ")?;
                } else {
                    write!(out, ",")?;
                }
                let fx = n.state.frequency.as_u8();
                let dx = n.duration - 1;
                write!(out, "{}", dx << 5 | fx)?;
                freq_table_size += 1;
            }
            writeln!(out, "\n    byte 0;")?;
            freq_table_size += 1;
        }
    }

    // Control-volume table: ccccvvvv, control forced nonzero on silence
    let mut cv_table_size = 0;
    writeln!(out, "\n    ; CONTROL/VOLUME TABLE")?;
    writeln!(out, "AUDIO_CV:")?;
    for channel in 0..N_TIA_CHANNELS {
        for subsong in 0..num_songs {
            let sequence = &sequences[subsong * N_TIA_CHANNELS + channel];
            write!(out, "    ; TRACK {}, CHANNEL {}", subsong, channel)?;
            for (i, n) in sequence.intervals.iter().enumerate() {
                if i % 16 == 0 {
                    write!(out, "\n    byte ")?;
                } else {
                    write!(out, ",")?;
                }
                let cx = n.state.control.as_u8();
                let vx = n.state.volume.as_u8();
                let rx = if vx == 0 { 0xf0 | vx } else { cx << 4 | vx };
                write!(out, "{}", rx)?;
                cv_table_size += 1;
            }
            writeln!(out, "\n    byte 0;")?;
            cv_table_size += 1;
        }
    }

    writeln!(out)?;
    writeln!(out, "; Num Tracks {}", num_songs)?;
    writeln!(out, "; All Tracks Sequence Length {}", data_points)?;
    writeln!(out, "; Track Table Size {}", song_table_size)?;
    writeln!(out, "; Freq Table Size {}", freq_table_size)?;
    writeln!(out, "; CV Table Size {}", cv_table_size)?;
    let total = song_table_size + freq_table_size + cv_table_size;
    writeln!(out, "; Total Data Size {}", total)?;

    ret.push(ExportOutput::text("Track_data.asm", out));
    Ok(())
}
