//! TIAComp track data export

// SPDX-FileCopyrightText: © 2024 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt::Write;

use crate::channel_code_generator::encode_channel_state_bytes;
use crate::data::{ExportConfig, Project};
use crate::driver_constants::{MAX_INTERVAL_DURATION, N_TIA_CHANNELS};
use crate::errors::ExportError;
use crate::export::ExportOutput;
use crate::register_dump::{capture_channel_state_sequence, ChannelState, ChannelStateSequence};

/// Compact delta encoding, typically 1-2 bytes per interval.
pub(crate) fn write_track_data(
    project: &Project,
    config: &ExportConfig,
    ret: &mut Vec<ExportOutput>,
) -> Result<(), ExportError> {
    let num_songs = project.subsongs.len();

    let mut out = String::with_capacity(4096);
    writeln!(out, "; Furnace Tracker audio data file")?;
    writeln!(out, "; TIAComp delta encoding")?;
    writeln!(out, "; Song: {}", project.name)?;
    writeln!(out, "; Author: {}", project.author)?;

    writeln!(out, "\nAUDIO_NUM_TRACKS = {}", num_songs)?;

    writeln!(out, "\n#include \"cores/tiacomp_player_core.asm\"")?;

    // lookup table for use in player apps, one per channel
    let mut song_table_size = 0;
    for channel in 0..N_TIA_CHANNELS {
        writeln!(out, "AUDIO_TRACKS_{}:", channel)?;
        for subsong in 0..num_songs {
            writeln!(out, "    byte AUDIO_TRACK_{}_{}", subsong, channel)?;
            song_table_size += 1;
        }
    }

    let mut track_data_size = 0;
    writeln!(out, "AUDIO_DATA:")?;
    for (subsong, s) in project.subsongs.iter().enumerate() {
        for channel in 0..N_TIA_CHANNELS {
            let mut sequence =
                ChannelStateSequence::new(ChannelState::SILENCE, MAX_INTERVAL_DURATION);
            capture_channel_state_sequence(
                &s.writes,
                subsong,
                &config.channel_address_map(channel)?,
                &mut sequence,
            )?;

            writeln!(
                out,
                "AUDIO_TRACK_{}_{} = . - AUDIO_DATA + 1",
                subsong, channel
            )?;

            let mut last = sequence.initial_state;
            let mut code_seq = Vec::new();
            for n in &sequence.intervals {
                code_seq.clear();
                writeln!(
                    out,
                    "    ;F{} C{} V{} D{}",
                    n.state.frequency, n.state.control, n.state.volume, n.duration
                )?;
                encode_channel_state_bytes(&n.state, n.duration, &last, true, &mut code_seq);
                track_data_size += code_seq.len();
                write!(out, "    byte ")?;
                for (i, b) in code_seq.iter().enumerate() {
                    if i > 0 {
                        write!(out, ",")?;
                    }
                    write!(out, "{}", b)?;
                }
                writeln!(out)?;

                // a pause only zeroes the volume register
                last = if n.state.volume.as_u8() == 0 {
                    ChannelState {
                        control: last.control,
                        frequency: last.frequency,
                        volume: n.state.volume,
                    }
                } else {
                    n.state
                };
            }
            writeln!(out, "    byte 0")?;
            track_data_size += 1;
        }
    }

    writeln!(out)?;
    writeln!(out, "; Num Tracks {}", num_songs)?;
    writeln!(out, "; Track Table Size {}", song_table_size)?;
    writeln!(out, "; Data Table Size {}", track_data_size)?;
    writeln!(out, "; Total Data Size {}", song_table_size + track_data_size)?;

    ret.push(ExportOutput::text("Track_data.asm", out));
    Ok(())
}
