//! TIA audio export compiler

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

mod bitstream;
mod suffix_tree;
mod value_newtypes;

pub mod alpha_code;
pub mod channel_code_generator;
pub mod code_interpreter;
pub mod control_flow;
pub mod data;
pub mod driver_constants;
pub mod errors;
pub mod export;
pub mod huffman;
pub mod register_dump;
pub mod span_compressor;
pub mod stream_encoder;
pub mod text_graphics;

pub use bitstream::Bitstream;
pub use suffix_tree::{PriorSpan, SuffixTree};
pub use value_newtypes::{AudioControl, AudioFrequency, AudioVolume};
