//! A single location for all of the errors in the compiler

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fmt::Display;
use std::io;

use crate::alpha_code::AlphaCode;

#[derive(Debug)]
pub enum DeserializeError {
    OpenError(String, io::Error),
    SerdeError(String, serde_json::error::Error),
}

#[derive(Debug)]
pub enum ValueError {
    AudioControlOutOfRange(u32),
    AudioFrequencyOutOfRange(u32),
    AudioVolumeOutOfRange(u32),
    DurationZero,
    DurationOutOfRange(u32),
}

#[derive(Debug)]
pub enum ConfigError {
    UnknownExportType(String),
    InvalidChannelAddressMap(usize),
}

/// Fatal for the subsong it was raised in.
#[derive(Debug)]
pub enum TimingError {
    ZeroFrameRate { subsong: usize, write_index: u32 },
}

#[derive(Debug)]
pub enum OverflowError {
    TooManyDataPoints(usize),
    ChannelLengthMismatch(usize, usize),
    JumpAddressOutOfRange(usize),
}

/// The validator found a mismatch between the replayed streams and the
/// uncompressed code sequence.  Always a compressor bug.
#[derive(Debug)]
pub struct DivergenceError {
    pub subsong: usize,
    pub channel: usize,
    pub position: usize,
    pub expected: Option<AlphaCode>,
    pub got: Option<AlphaCode>,
}

#[derive(Debug)]
pub struct BitstreamCapacityError {
    pub capacity: usize,
    pub requested: usize,
}

#[derive(Debug)]
pub enum ExportError {
    ConfigError(ConfigError),
    TimingError(TimingError),
    OverflowError(OverflowError),
    DivergenceError(DivergenceError),
    BitstreamCapacityError(BitstreamCapacityError),
    DeprecatedExportType(&'static str),
    FormatError(std::fmt::Error),
    Aborted,
}

impl From<std::fmt::Error> for ExportError {
    fn from(e: std::fmt::Error) -> Self {
        Self::FormatError(e)
    }
}

impl From<ConfigError> for ExportError {
    fn from(e: ConfigError) -> Self {
        Self::ConfigError(e)
    }
}

impl From<TimingError> for ExportError {
    fn from(e: TimingError) -> Self {
        Self::TimingError(e)
    }
}

impl From<OverflowError> for ExportError {
    fn from(e: OverflowError) -> Self {
        Self::OverflowError(e)
    }
}

impl From<DivergenceError> for ExportError {
    fn from(e: DivergenceError) -> Self {
        Self::DivergenceError(e)
    }
}

impl From<BitstreamCapacityError> for ExportError {
    fn from(e: BitstreamCapacityError) -> Self {
        Self::BitstreamCapacityError(e)
    }
}

// Display
// =======

impl Display for DeserializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenError(filename, e) => write!(f, "Unable to open {}: {}", filename, e),
            Self::SerdeError(filename, e) => write!(f, "Unable to read {}: {}", filename, e),
        }
    }
}

impl Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AudioControlOutOfRange(v) => {
                write!(f, "AUDCx value out of range (4 bits): {}", v)
            }
            Self::AudioFrequencyOutOfRange(v) => {
                write!(f, "AUDFx value out of range (5 bits): {}", v)
            }
            Self::AudioVolumeOutOfRange(v) => {
                write!(f, "AUDVx value out of range (4 bits): {}", v)
            }
            Self::DurationZero => write!(f, "interval duration cannot be zero"),
            Self::DurationOutOfRange(v) => write!(f, "interval duration out of range: {}", v),
        }
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownExportType(s) => write!(f, "unknown tiaExportType: {}", s),
            Self::InvalidChannelAddressMap(channel) => {
                write!(f, "channel {} address map must name 3 registers", channel)
            }
        }
    }
}

impl Display for TimingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroFrameRate {
                subsong,
                write_index,
            } => write!(
                f,
                "subsong {}: zero frame rate at register write {}",
                subsong, write_index
            ),
        }
    }
}

impl Display for OverflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyDataPoints(n) => write!(
                f,
                "cannot export data in this format: data sequence has {} > 256 data points",
                n
            ),
            Self::ChannelLengthMismatch(a, b) => write!(
                f,
                "cannot export data in this format: channel data sequence lengths [{}, {}] do not match",
                a, b
            ),
            Self::JumpAddressOutOfRange(addr) => {
                write!(f, "jump address does not fit in 15 bits: {}", addr)
            }
        }
    }
}

impl Display for DivergenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "subsong {} channel {}: replay diverged at code {}: expected {:?}, got {:?}",
            self.subsong, self.channel, self.position, self.expected, self.got
        )
    }
}

impl Display for BitstreamCapacityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "bitstream buffer exhausted: capacity {} bits, requested {}",
            self.capacity, self.requested
        )
    }
}

impl Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigError(e) => e.fmt(f),
            Self::TimingError(e) => e.fmt(f),
            Self::OverflowError(e) => e.fmt(f),
            Self::DivergenceError(e) => e.fmt(f),
            Self::BitstreamCapacityError(e) => e.fmt(f),
            Self::DeprecatedExportType(s) => {
                write!(f, "export type {} is deprecated and cannot be exported", s)
            }
            Self::FormatError(e) => write!(f, "error formatting output: {}", e),
            Self::Aborted => write!(f, "export aborted"),
        }
    }
}
