//! Virtual machine instruction words and the code alphabet

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashMap};

use crate::value_newtypes::{AudioControl, AudioFrequency, AudioVolume};

/// Index of an `AlphaCode` within the observed alphabet.
pub type AlphaChar = u32;

/// Wire-word opcode tags (high byte of the 64-bit encoding).
pub mod tags {
    pub const STOP: u8 = 0x00;
    pub const WRITE_DELTA: u8 = 0x01;
    pub const PAUSE: u8 = 0x02;
    pub const SUSTAIN: u8 = 0x03;
    pub const JUMP: u8 = 0x04;
    pub const BRANCH_POINT: u8 = 0x05;
    pub const SKIP: u8 = 0x06;
    pub const TAKE_DATA_JUMP: u8 = 0x07;
    pub const TAKE_TRACK_JUMP: u8 = 0x08;
    pub const RETURN_LAST: u8 = 0x09;
    pub const RETURN_FF: u8 = 0x0a;
    pub const RETURN_NOOP: u8 = 0x0b;
}

/// The volume field of a `WRITE_DELTA`.
///
/// A ±1 step from the previous volume is stored as a sentinel so the
/// decoder can reconstruct it without the absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeField {
    Absolute(AudioVolume),
    StepUp,
    StepDown,
}

impl VolumeField {
    pub const STEP_UP_BYTE: u8 = 0x10;
    pub const STEP_DOWN_BYTE: u8 = 0xf0;

    pub fn to_byte(self) -> u8 {
        match self {
            Self::Absolute(v) => v.as_u8(),
            Self::StepUp => Self::STEP_UP_BYTE,
            Self::StepDown => Self::STEP_DOWN_BYTE,
        }
    }

    fn from_byte(b: u8) -> Option<Self> {
        match b {
            Self::STEP_UP_BYTE => Some(Self::StepUp),
            Self::STEP_DOWN_BYTE => Some(Self::StepDown),
            b => AudioVolume::try_from(b).ok().map(Self::Absolute),
        }
    }
}

/// The three change-flag/value pairs of a `WRITE_DELTA`.
///
/// A `None` field is an unchanged register (change-flag clear).  At
/// least one field must be `Some`; the code emitter never produces an
/// empty delta and the validator rejects one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteDelta {
    pub control: Option<AudioControl>,
    pub frequency: Option<AudioFrequency>,
    pub volume: Option<VolumeField>,
    pub duration: u8,
}

impl WriteDelta {
    pub const CONTROL_FLAG: u8 = 0x4;
    pub const FREQUENCY_FLAG: u8 = 0x2;
    pub const VOLUME_FLAG: u8 = 0x1;

    /// Change-flag bit pattern (the abstract-tree symbol payload).
    pub fn mask(&self) -> u8 {
        let mut mask = 0;
        if self.control.is_some() {
            mask |= Self::CONTROL_FLAG;
        }
        if self.frequency.is_some() {
            mask |= Self::FREQUENCY_FLAG;
        }
        if self.volume.is_some() {
            mask |= Self::VOLUME_FLAG;
        }
        mask
    }
}

/// Target of a `JUMP` operand.
///
/// `address` indexes a code within the compressed code sequence until
/// the bitstream encoder rewrites it to a global bit offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpTarget {
    pub subsong: u8,
    pub channel: u8,
    pub address: u16,
}

/// One virtual-machine instruction, the unit of compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaCode {
    Stop,
    WriteDelta(WriteDelta),
    Pause { duration: u8 },
    Sustain { duration: u8 },
    Jump(JumpTarget),
    BranchPoint,
    Skip,
    TakeDataJump,
    TakeTrackJump,
    ReturnLast,
    ReturnFf,
    ReturnNoop,
}

impl AlphaCode {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Stop => tags::STOP,
            Self::WriteDelta(_) => tags::WRITE_DELTA,
            Self::Pause { .. } => tags::PAUSE,
            Self::Sustain { .. } => tags::SUSTAIN,
            Self::Jump(_) => tags::JUMP,
            Self::BranchPoint => tags::BRANCH_POINT,
            Self::Skip => tags::SKIP,
            Self::TakeDataJump => tags::TAKE_DATA_JUMP,
            Self::TakeTrackJump => tags::TAKE_TRACK_JUMP,
            Self::ReturnLast => tags::RETURN_LAST,
            Self::ReturnFf => tags::RETURN_FF,
            Self::ReturnNoop => tags::RETURN_NOOP,
        }
    }

    /// The 64-bit wire encoding.  The high byte is the opcode tag;
    /// payload bytes depend on the tag.  The encoding is injective, so
    /// the `u64` order is the deterministic total order on codes.
    pub fn to_wire_word(&self) -> u64 {
        let tag = u64::from(self.tag()) << 56;
        match *self {
            Self::WriteDelta(d) => {
                let control = d.control.map(|c| c.as_u8()).unwrap_or(0);
                let frequency = d.frequency.map(|f| f.as_u8()).unwrap_or(0);
                let volume = d.volume.map(|v| v.to_byte()).unwrap_or(0);
                tag | u64::from(d.mask()) << 48
                    | u64::from(control) << 40
                    | u64::from(frequency) << 32
                    | u64::from(volume) << 24
                    | u64::from(d.duration)
            }
            Self::Pause { duration } | Self::Sustain { duration } => tag | u64::from(duration),
            Self::Jump(j) => {
                tag | u64::from(j.subsong) << 32
                    | u64::from(j.channel) << 24
                    | u64::from(j.address)
            }
            _ => tag,
        }
    }

    pub fn from_wire_word(word: u64) -> Option<Self> {
        let payload = |shift: u8| (word >> shift) as u8;
        match (word >> 56) as u8 {
            tags::STOP => Some(Self::Stop),
            tags::WRITE_DELTA => {
                let mask = payload(48);
                let control = if mask & WriteDelta::CONTROL_FLAG != 0 {
                    Some(AudioControl::try_from(payload(40)).ok()?)
                } else {
                    None
                };
                let frequency = if mask & WriteDelta::FREQUENCY_FLAG != 0 {
                    Some(AudioFrequency::try_from(payload(32)).ok()?)
                } else {
                    None
                };
                let volume = if mask & WriteDelta::VOLUME_FLAG != 0 {
                    Some(VolumeField::from_byte(payload(24))?)
                } else {
                    None
                };
                if mask == 0 {
                    return None;
                }
                Some(Self::WriteDelta(WriteDelta {
                    control,
                    frequency,
                    volume,
                    duration: payload(0),
                }))
            }
            tags::PAUSE => Some(Self::Pause {
                duration: payload(0),
            }),
            tags::SUSTAIN => Some(Self::Sustain {
                duration: payload(0),
            }),
            tags::JUMP => Some(Self::Jump(JumpTarget {
                subsong: payload(32),
                channel: payload(24),
                address: word as u16,
            })),
            tags::BRANCH_POINT => Some(Self::BranchPoint),
            tags::SKIP => Some(Self::Skip),
            tags::TAKE_DATA_JUMP => Some(Self::TakeDataJump),
            tags::TAKE_TRACK_JUMP => Some(Self::TakeTrackJump),
            tags::RETURN_LAST => Some(Self::ReturnLast),
            tags::RETURN_FF => Some(Self::ReturnFf),
            tags::RETURN_NOOP => Some(Self::ReturnNoop),
            _ => None,
        }
    }
}

impl Ord for AlphaCode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_wire_word().cmp(&other.to_wire_word())
    }
}

impl PartialOrd for AlphaCode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The observed alphabet: distinct codes ordered by descending
/// frequency (ties by wire word), and the inverse index.
pub struct Alphabet {
    codes: Vec<AlphaCode>,
    index: HashMap<AlphaCode, AlphaChar>,
}

impl Alphabet {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[AlphaCode] {
        &self.codes
    }

    pub fn index_of(&self, code: &AlphaCode) -> AlphaChar {
        self.index[code]
    }

    /// Maps a code sequence into alphabet indices for the suffix tree.
    pub fn index_sequence(&self, codes: &[AlphaCode]) -> Vec<AlphaChar> {
        codes.iter().map(|c| self.index[c]).collect()
    }
}

/// Assigns an `AlphaChar` to every distinct observed code.
///
/// The ordering is a deterministic function of the frequency map, so
/// two runs over identical input build identical alphabets.
pub fn create_alphabet(frequency_map: &BTreeMap<AlphaCode, usize>) -> Alphabet {
    let mut codes: Vec<AlphaCode> = frequency_map.keys().copied().collect();
    codes.sort_by(|a, b| {
        frequency_map[b]
            .cmp(&frequency_map[a])
            .then_with(|| a.cmp(b))
    });

    let index = codes
        .iter()
        .enumerate()
        .map(|(i, &c)| (c, i as AlphaChar))
        .collect();

    Alphabet { codes, index }
}
