//! TIA driver constants

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

// These values MUST match the 6502 player cores.

#![allow(clippy::assertions_on_constants)]

/// TIA audio register addresses.
pub mod addresses {
    pub const AUDC0: u16 = 0x15;
    pub const AUDC1: u16 = 0x16;
    pub const AUDF0: u16 = 0x17;
    pub const AUDF1: u16 = 0x18;
    pub const AUDV0: u16 = 0x19;
    pub const AUDV1: u16 = 0x1a;
}

pub const N_TIA_CHANNELS: usize = 2;
pub const N_CHANNEL_REGISTERS: usize = 3;

/// Index of the control, frequency and volume registers within a
/// `ChannelState`.
pub const CONTROL_REGISTER: usize = 0;
pub const FREQUENCY_REGISTER: usize = 1;
pub const VOLUME_REGISTER: usize = 2;

pub const CONTROL_BITS: u8 = 4;
pub const FREQUENCY_BITS: u8 = 5;
pub const VOLUME_BITS: u8 = 4;

/// Engine tick rate the register-write log is timestamped against.
pub const TICKS_PER_SECOND: u32 = 1000000;

/// Longest interval the TIAZIP capture will emit before splitting.
pub const MAX_INTERVAL_DURATION: u8 = u8::MAX;

/// Longest run a single SUSTAIN code may cover.
pub const MAX_SUSTAIN_FRAMES: u8 = 32;

/// Capture granularity for the BASIC_RLE format (3-bit duration field).
pub const BASIC_RLE_MAX_DURATION: u8 = 8;

/// Largest number of data points a BASIC table format can address.
pub const MAX_BASIC_DATA_POINTS: usize = 256;

/// Minimum match length the span compressor will turn into a
/// back-reference.
pub const MIN_BACK_REFERENCE_LENGTH: usize = 3;

/// Bitstream buffers are sized to one 4KiB ROM bank per channel per
/// stream.
pub const BITSTREAM_BLOCK_SIZE: usize = 4096 * 8;

/// Leaf cap for every Huffman tree; codes beyond the cap share the
/// literal-escape leaf.
pub const MAX_HUFFMAN_LEAVES: usize = 128;

/// Direct-addressable jump lookup table size.
pub const JUMP_TABLE_SIZE: usize = 32;
pub const JUMP_TABLE_INDEX_BITS: u8 = 5;

/// Inline jump operands are absolute bitstream offsets of this width.
pub const JUMP_ADDRESS_BITS: u8 = 15;

const _: () = assert!(
    JUMP_TABLE_SIZE <= (1 << JUMP_TABLE_INDEX_BITS),
    "jump table does not fit the table index width"
);

const _: () = assert!(
    BITSTREAM_BLOCK_SIZE <= (1 << JUMP_ADDRESS_BITS),
    "a full bitstream block must be addressable by an inline jump"
);
