//! TIAZip track data export

// SPDX-FileCopyrightText: © 2024 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::AtomicBool;

use log::{debug, info};

use crate::alpha_code::{create_alphabet, AlphaCode};
use crate::bitstream::Bitstream;
use crate::channel_code_generator::{encode_channel_state_bytes, encode_channel_state_codes};
use crate::code_interpreter::validate_code_sequence;
use crate::control_flow::{build_compressed_streams, CompressedStreams};
use crate::data::{ExportConfig, Project};
use crate::driver_constants::{MAX_INTERVAL_DURATION, N_TIA_CHANNELS};
use crate::errors::ExportError;
use crate::export::{check_abort, ExportOutput};
use crate::huffman::HuffmanTree;
use crate::register_dump::{capture_channel_state_sequence, ChannelState, ChannelStateSequence};
use crate::span_compressor::compress_spans;
use crate::stream_encoder::encode_bitstreams;
use crate::suffix_tree::SuffixTree;

struct ChannelCodes {
    subsong: usize,
    channel: usize,
    codes: Vec<AlphaCode>,
}

/// The full TIAZip pipeline: capture, code emission, span compression,
/// control-flow rewriting, validation, bitstream encoding, and the
/// assembly output.
pub(crate) fn write_track_data(
    project: &Project,
    config: &ExportConfig,
    abort: &AtomicBool,
    ret: &mut Vec<ExportOutput>,
) -> Result<(), ExportError> {
    let num_songs = project.subsongs.len();

    let mut out = String::with_capacity(16 * 1024);
    writeln!(out, "; Furnace Tracker audio data file")?;
    writeln!(out, "; TIAZip data format")?;
    writeln!(out, "; Song: {}", project.name)?;
    writeln!(out, "; Author: {}", project.author)?;

    writeln!(out, "\nAUDIO_NUM_TRACKS = {}", num_songs)?;

    writeln!(out, "\n#include \"cores/tiazip_player_core.asm\"")?;

    // track lookup table; note reverse order for the copy routine
    let mut song_table_size = 0;
    writeln!(out, "AUDIO_TRACKS:")?;
    for subsong in 0..num_songs {
        writeln!(out, "    byte >JUMPS_S{0}_C1_START, <JUMPS_S{0}_C1_START", subsong)?;
        writeln!(out, "    byte >JUMPS_S{0}_C0_START, <JUMPS_S{0}_C0_START", subsong)?;
        writeln!(out, "    byte >SPANS_S{0}_C1_START, <SPANS_S{0}_C1_START", subsong)?;
        writeln!(out, "    byte >SPANS_S{0}_C0_START, <SPANS_S{0}_C0_START", subsong)?;
        song_table_size += 8;
    }

    // capture and code emission, with a raw binary dump per channel
    let mut frequency_map: BTreeMap<AlphaCode, usize> = BTreeMap::new();
    let mut channel_codes: Vec<ChannelCodes> = Vec::with_capacity(num_songs * N_TIA_CHANNELS);
    let mut total_uncompressed_codes = 0;
    let mut total_uncompressed_bytes = 0;

    for (subsong, s) in project.subsongs.iter().enumerate() {
        for channel in 0..N_TIA_CHANNELS {
            check_abort(abort)?;

            let mut sequence =
                ChannelStateSequence::new(ChannelState::SILENCE, MAX_INTERVAL_DURATION);
            capture_channel_state_sequence(
                &s.writes,
                subsong,
                &config.channel_address_map(channel)?,
                &mut sequence,
            )?;

            let mut codes = Vec::new();
            let mut binary_data = Vec::new();
            let mut committed = sequence.initial_state;
            for n in &sequence.intervals {
                encode_channel_state_bytes(&n.state, n.duration, &committed, true, &mut binary_data);
                committed =
                    encode_channel_state_codes(&n.state, n.duration, &committed, &mut codes);
            }
            codes.push(AlphaCode::Stop);

            for code in &codes {
                *frequency_map.entry(*code).or_insert(0) += 1;
            }
            total_uncompressed_codes += codes.len();
            total_uncompressed_bytes += binary_data.len();

            debug!(
                "subsong {} channel {}: {} intervals, {} codes",
                subsong,
                channel,
                sequence.size(),
                codes.len()
            );

            ret.push(ExportOutput {
                filename: format!("Track_binary.{}.{}.o", subsong, channel),
                data: binary_data,
            });
            channel_codes.push(ChannelCodes {
                subsong,
                channel,
                codes,
            });
        }
    }

    // index all distinct codes into the alphabet
    let alphabet = create_alphabet(&frequency_map);
    info!("alphabet size: {}", alphabet.len());

    // span compression and control-flow rewriting per channel; the
    // suffix tree only lives for its channel
    let mut compressed: Vec<CompressedStreams> = Vec::with_capacity(channel_codes.len());
    let mut total_compressed_codes = 0;
    let mut total_span_codes = 0;
    for cc in &channel_codes {
        check_abort(abort)?;

        let alpha_sequence = alphabet.index_sequence(&cc.codes);
        let tree = SuffixTree::new(&alpha_sequence, alphabet.len());
        let parse = compress_spans(cc.subsong, cc.channel, &alpha_sequence, &tree);
        drop(tree);

        debug!(
            "subsong {} channel {}: {} spans, {} back-references",
            cc.subsong,
            cc.channel,
            parse.spans.len(),
            parse.back_reference_count()
        );

        let streams = build_compressed_streams(cc.subsong, cc.channel, &cc.codes, &parse);

        // replay against the uncompressed sequence before anything is
        // written out
        validate_code_sequence(cc.subsong, cc.channel, &cc.codes, &streams)?;

        total_compressed_codes += streams.compressed_code_sequence.len();
        total_span_codes += streams.span_sequence.len();
        compressed.push(streams);
    }

    check_abort(abort)?;

    // bitstream encoding, canonical (subsong, channel) order
    let channels: Vec<(usize, usize, &CompressedStreams)> = channel_codes
        .iter()
        .zip(compressed.iter())
        .map(|(cc, streams)| (cc.subsong, cc.channel, streams))
        .collect();
    let mut encoded = encode_bitstreams(&channels, config.huffman_leaf_limit)?;

    // assemble the output, grouped by stream type: every channel's
    // data block first, back to back, because the inline jump
    // addresses are global bit offsets into the concatenated data
    // blocks; then all span blocks, then all jump blocks
    let mut total_compressed_bytes = 0;
    for ec in &mut encoded.channels {
        total_compressed_bytes += write_byte_block(
            &mut out,
            &format!("AUDIO_DATA_S{}_C{}_START", ec.subsong, ec.channel),
            &mut ec.data,
        )?;
    }
    for ec in &mut encoded.channels {
        total_compressed_bytes += write_byte_block(
            &mut out,
            &format!("SPANS_S{}_C{}_START", ec.subsong, ec.channel),
            &mut ec.spans,
        )?;
    }
    for ec in &mut encoded.channels {
        total_compressed_bytes += write_byte_block(
            &mut out,
            &format!("JUMPS_S{}_C{}_START", ec.subsong, ec.channel),
            &mut ec.jumps,
        )?;
    }

    // direct-addressable jump table, split into lo/hi bytes
    writeln!(out, "\nAUDIO_JUMP_TABLE_LO:")?;
    for addr in &encoded.jump_table {
        writeln!(out, "    byte ${:02x}", addr & 0xff)?;
    }
    writeln!(out, "AUDIO_JUMP_TABLE_HI:")?;
    for addr in &encoded.jump_table {
        writeln!(out, "    byte ${:02x}", addr >> 8)?;
    }
    total_compressed_bytes += encoded.jump_table.len() * 2;

    writeln!(out)?;
    writeln!(out, "\n; Song data size: {}", song_table_size)?;
    writeln!(out, "; Uncompressed Sequence Length: {}", total_uncompressed_codes)?;
    writeln!(out, "; Uncompressed Bytes: {}", total_uncompressed_bytes)?;
    writeln!(out, "; Compressed Data Sequence Length: {}", total_compressed_codes)?;
    writeln!(out, "; Compressed Span Sequence Length: {}", total_span_codes)?;
    writeln!(out, "; Compressed Bytes {}", total_compressed_bytes)?;

    ret.push(ExportOutput::text("Track_data.asm", out));

    if config.debug_output {
        ret.push(write_tree_report(&encoded.trees, &encoded.jump_table)?);
    }

    Ok(())
}

/// `byte $xx` rows, 16 bytes per line, with a byte-count trailer.
fn write_byte_block(
    out: &mut String,
    label: &str,
    stream: &mut Bitstream,
) -> Result<usize, std::fmt::Error> {
    write!(out, "\n{}", label)?;
    stream.seek(0);
    let mut written = 0;
    while stream.has_bits() {
        let uc = stream.read_byte();
        if written % 16 == 0 {
            write!(out, "\n    byte ${:02x}", uc)?;
        } else {
            write!(out, ", ${:02x}", uc)?;
        }
        written += 1;
    }
    writeln!(out, "\n; {} bytes: {}", label, written)?;
    Ok(written)
}

fn write_tree_summary(
    out: &mut String,
    name: &str,
    tree: &HuffmanTree,
) -> Result<(), std::fmt::Error> {
    writeln!(
        out,
        "; {} tree: {} leaves, depth {}, weight {}",
        name,
        tree.leaf_count(),
        tree.depth(),
        tree.total_weight()
    )
}

fn write_tree_report(
    trees: &crate::stream_encoder::FieldTrees,
    jump_table: &[u16],
) -> Result<ExportOutput, ExportError> {
    let mut out = String::with_capacity(4096);
    writeln!(out, "; TIAZip encoding report")?;
    write_tree_summary(&mut out, "abstract", &trees.abstract_tree)?;
    write_tree_summary(&mut out, "control", &trees.control)?;
    write_tree_summary(&mut out, "volume", &trees.volume)?;
    write_tree_summary(&mut out, "duration", &trees.duration)?;
    write_tree_summary(&mut out, "span", &trees.span)?;

    writeln!(out, "; jump table ({} entries):", jump_table.len())?;
    for (i, addr) in jump_table.iter().enumerate() {
        writeln!(out, ";   {} -> bit {}", i, addr)?;
    }

    Ok(ExportOutput::text("TiazipReport.txt", out))
}
