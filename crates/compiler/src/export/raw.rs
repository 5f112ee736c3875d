//! Raw track data export

// SPDX-FileCopyrightText: © 2024 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt::Write;

use crate::data::{ExportConfig, Project};
use crate::driver_constants::{MAX_INTERVAL_DURATION, N_TIA_CHANNELS};
use crate::errors::ExportError;
use crate::export::ExportOutput;
use crate::register_dump::{capture_channel_state_sequence, ChannelState, ChannelStateSequence};

/// 4 bytes per interval, no driver support:
///
/// ```text
///   AUDCx, AUDFx, AUDVx, duration
///   ...
///   0
/// ```
pub(crate) fn write_track_data(
    project: &Project,
    config: &ExportConfig,
    ret: &mut Vec<ExportOutput>,
) -> Result<(), ExportError> {
    let mut out = String::with_capacity(4096);
    writeln!(out, "; Song: {}", project.name)?;
    writeln!(out, "; Author: {}", project.author)?;

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

            let mut data_size = 0;
            let mut total_frames: u64 = 0;
            writeln!(out)?;
            writeln!(out, "TRACK_{}_CHANNEL_{}", subsong, channel)?;
            for n in &sequence.intervals {
                writeln!(
                    out,
                    "    byte {}, {}, {}, {}",
                    n.state.control, n.state.frequency, n.state.volume, n.duration
                )?;
                data_size += 4;
                total_frames += u64::from(n.duration);
            }
            writeln!(out, "    byte 0")?;
            data_size += 1;
            writeln!(out, "    ; {} bytes {} frames", data_size, total_frames)?;
        }
    }

    ret.push(ExportOutput::text("Track_data.asm", out));
    Ok(())
}
