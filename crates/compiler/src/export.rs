//! Track data exporter

// SPDX-FileCopyrightText: © 2024 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

mod basic;
mod raw;
mod tiacomp;
mod tiazip;

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::data::{ExportConfig, Project};
use crate::driver_constants::TICKS_PER_SECOND;
use crate::errors::{ConfigError, ExportError};
use crate::text_graphics::write_text_graphics;

/// The track data encoders, from raw dumps to TIAZip compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiaExportType {
    /// raw data export - no driver support
    Raw,
    /// simple 2 channel sound driver
    Basic,
    /// simple 2 channel sound driver with duration
    BasicRle,
    /// TIAComp compact delta encoding
    TiaComp,
    /// sequence pattern export (deprecated)
    FSeq,
    /// TIAZip LZ-based compression
    TiaZip,
}

impl TiaExportType {
    pub fn from_config_name(name: &str) -> Result<TiaExportType, ConfigError> {
        match name {
            "RAW" => Ok(Self::Raw),
            "BASIC" => Ok(Self::Basic),
            "BASIC_RLE" => Ok(Self::BasicRle),
            "TIACOMP" => Ok(Self::TiaComp),
            "FSEQ" => Ok(Self::FSeq),
            "TIAZIP" => Ok(Self::TiaZip),
            _ => Err(ConfigError::UnknownExportType(name.to_owned())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "RAW",
            Self::Basic => "BASIC",
            Self::BasicRle => "BASIC_RLE",
            Self::TiaComp => "TIACOMP",
            Self::FSeq => "FSEQ",
            Self::TiaZip => "TIAZIP",
        }
    }
}

/// One output file of an export run.
pub struct ExportOutput {
    pub filename: String,
    pub data: Vec<u8>,
}

impl ExportOutput {
    fn text(filename: &str, text: String) -> ExportOutput {
        ExportOutput {
            filename: filename.to_owned(),
            data: text.into_bytes(),
        }
    }
}

pub(crate) fn check_abort(abort: &AtomicBool) -> Result<(), ExportError> {
    if abort.load(Ordering::Relaxed) {
        Err(ExportError::Aborted)
    } else {
        Ok(())
    }
}

/// Runs the configured encoder over every subsong and appends the
/// track metadata file.
///
/// The whole pipeline is single-threaded; `abort` is advisory and
/// checked between subsongs/channels and between major phases.
pub fn export_project(
    project: &Project,
    config: &ExportConfig,
    abort: &AtomicBool,
) -> Result<Vec<ExportOutput>, ExportError> {
    let export_type = TiaExportType::from_config_name(&config.tia_export_type)?;
    info!(
        "exporting {} subsongs as {}",
        project.subsongs.len(),
        export_type.name()
    );

    let mut ret = Vec::new();

    if config.debug_output {
        ret.push(write_register_dump(project)?);
    }
    check_abort(abort)?;

    match export_type {
        TiaExportType::Raw => raw::write_track_data(project, config, &mut ret)?,
        TiaExportType::Basic => basic::write_track_data(project, config, false, &mut ret)?,
        TiaExportType::BasicRle => basic::write_track_data(project, config, true, &mut ret)?,
        TiaExportType::TiaComp => tiacomp::write_track_data(project, config, &mut ret)?,
        TiaExportType::FSeq => return Err(ExportError::DeprecatedExportType("FSEQ")),
        TiaExportType::TiaZip => tiazip::write_track_data(project, config, abort, &mut ret)?,
    }
    check_abort(abort)?;

    ret.push(write_track_meta(project)?);

    Ok(ret)
}

fn write_track_meta(project: &Project) -> Result<ExportOutput, ExportError> {
    info!("writing track title graphics");
    let mut out = String::with_capacity(4096);

    writeln!(out, "; Name: {}", project.name)?;
    writeln!(out, "; Author: {}", project.author)?;
    writeln!(out, "; Album: {}", project.category)?;
    writeln!(out, "; System: {}", project.system_name)?;
    writeln!(out, "; Subsongs: {}", project.subsongs.len())?;
    writeln!(out)?;

    let mut title = if project.name.is_empty() {
        "furnace tracker".to_owned()
    } else {
        format!("{} by {}", project.name, project.author)
    };
    if title.chars().count() > 26 {
        title = title.chars().take(23).collect();
        title.push_str("...");
    }
    write_text_graphics(&mut out, &title)?;

    Ok(ExportOutput::text("Track_meta.asm", out))
}

/// The `debugOutput` side channel: every register write with its frame
/// arithmetic.  No effect on the compressed bytes.
fn write_register_dump(project: &Project) -> Result<ExportOutput, ExportError> {
    let mut out = String::with_capacity(4096);
    writeln!(out, "; Song: {}", project.name)?;
    writeln!(out, "; Author: {}", project.author)?;

    for (subsong, s) in project.subsongs.iter().enumerate() {
        let mut max_frames = 0;

        writeln!(out, "\n; Song {}", subsong)?;

        for write in &s.writes {
            let (frame, residual_ticks) = write.frame(subsong)?;
            if frame > max_frames {
                max_frames = frame;
            }

            writeln!(
                out,
                "; {} T{}.{} F{}.{}: SS{} ORD{} ROW{} SYS{}> {} = {}",
                write.write_index,
                write.seconds,
                write.ticks,
                frame,
                residual_ticks,
                write.row_index.subsong,
                write.row_index.ord,
                write.row_index.row,
                write.system_index,
                write.addr,
                write.val
            )?;
        }

        writeln!(out)?;
        writeln!(out, "; Writes: {}", s.writes.len())?;
        writeln!(out, "; Frames: {}", max_frames)?;
        writeln!(out, "; Ticks per second: {}", TICKS_PER_SECOND)?;
    }

    Ok(ExportOutput::text("RegisterDump.txt", out))
}
