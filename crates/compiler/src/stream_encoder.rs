//! Dual-bitstream encoder

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::alpha_code::{tags, AlphaCode, JumpTarget};
use crate::bitstream::Bitstream;
use crate::control_flow::CompressedStreams;
use crate::driver_constants::{
    BITSTREAM_BLOCK_SIZE, FREQUENCY_BITS, JUMP_ADDRESS_BITS, JUMP_TABLE_INDEX_BITS,
    JUMP_TABLE_SIZE,
};
use crate::errors::{ExportError, OverflowError};
use crate::huffman::{build_huffman_tree, HuffmanTree, Symbol};

/// Escape symbol for every tree: codes culled by the leaf cap are
/// emitted as this code followed by the raw field byte.
pub const LITERAL_ESCAPE: Symbol = u64::MAX;

/// One Huffman tree per syntactic position.  The frequency field has
/// no tree: its domain is small and uniform, 5 literal bits win.
pub struct FieldTrees {
    pub abstract_tree: HuffmanTree,
    pub control: HuffmanTree,
    pub volume: HuffmanTree,
    pub duration: HuffmanTree,
    pub span: HuffmanTree,
}

struct FieldIndexes {
    abstract_index: HashMap<Symbol, Vec<bool>>,
    control: HashMap<Symbol, Vec<bool>>,
    volume: HashMap<Symbol, Vec<bool>>,
    duration: HashMap<Symbol, Vec<bool>>,
    span: HashMap<Symbol, Vec<bool>>,
}

/// The encoded streams of one (subsong, channel).
pub struct EncodedChannel {
    pub subsong: usize,
    pub channel: usize,
    pub data: Bitstream,
    pub spans: Bitstream,
    pub jumps: Bitstream,
}

pub struct EncodedStreams {
    pub channels: Vec<EncodedChannel>,
    /// Global bit addresses of the tabulated jump targets.
    pub jump_table: Vec<u16>,
    pub trees: FieldTrees,
}

/// Abstract-tree symbol of a data-stream code: the opcode shape.  A
/// `WRITE_DELTA` contributes one symbol per distinct change-flag
/// pattern.
fn abstract_symbol(code: &AlphaCode) -> Symbol {
    match code {
        AlphaCode::WriteDelta(d) => u64::from(tags::WRITE_DELTA) << 8 | u64::from(d.mask()),
        _ => u64::from(code.tag()) << 8,
    }
}

fn span_symbol(code: &AlphaCode) -> Symbol {
    u64::from(code.tag())
}

#[derive(Clone, Copy)]
enum StreamKind {
    Data,
    Jump,
}

/// A jump operand emitted as placeholder bits, resolved against the
/// finalized position map in the patch pass.
struct ForwardReference {
    channel_index: usize,
    stream: StreamKind,
    bit_pos: usize,
    target: JumpTarget,
    tabulated: Option<usize>,
}

/// Encodes every channel's compressed + span sequences into the three
/// output bitstreams.
///
/// Channels must arrive in canonical order (subsong ascending, channel
/// ascending); the shared data offset grows per channel so inline jump
/// addresses are global bit offsets.
pub fn encode_bitstreams(
    channels: &[(usize, usize, &CompressedStreams)],
    huffman_leaf_limit: usize,
) -> Result<EncodedStreams, ExportError> {
    // First pass over the sequences: per-field statistics and jump
    // target frequencies.
    let mut abstract_freq = BTreeMap::new();
    let mut control_freq = BTreeMap::new();
    let mut volume_freq = BTreeMap::new();
    let mut duration_freq = BTreeMap::new();
    let mut span_freq = BTreeMap::new();
    let mut jump_targets: BTreeMap<(u8, u8, u16), usize> = BTreeMap::new();

    let mut record_jump = |target: &JumpTarget| {
        *jump_targets
            .entry((target.subsong, target.channel, target.address))
            .or_insert(0) += 1;
    };

    for &(_, _, streams) in channels {
        for code in &streams.compressed_code_sequence {
            match code {
                AlphaCode::Jump(t) => record_jump(t),
                AlphaCode::WriteDelta(d) => {
                    *abstract_freq.entry(abstract_symbol(code)).or_insert(0) += 1;
                    if let Some(c) = d.control {
                        *control_freq.entry(u64::from(c.as_u8())).or_insert(0) += 1;
                    }
                    if let Some(v) = d.volume {
                        *volume_freq.entry(u64::from(v.to_byte())).or_insert(0) += 1;
                    }
                }
                AlphaCode::Pause { duration } | AlphaCode::Sustain { duration } => {
                    *abstract_freq.entry(abstract_symbol(code)).or_insert(0) += 1;
                    *duration_freq.entry(u64::from(*duration)).or_insert(0) += 1;
                }
                AlphaCode::BranchPoint | AlphaCode::TakeDataJump => {
                    *abstract_freq.entry(abstract_symbol(code)).or_insert(0) += 1;
                }
                other => unreachable!("{:?} cannot appear in a data stream", other),
            }
        }

        let mut sc = 0;
        let spans = &streams.span_sequence;
        while sc < spans.len() {
            match spans[sc] {
                AlphaCode::TakeTrackJump => {
                    *span_freq.entry(span_symbol(&spans[sc])).or_insert(0) += 1;
                    if let AlphaCode::Jump(t) = spans[sc + 1] {
                        record_jump(&t);
                    }
                    sc += 2;
                }
                AlphaCode::ReturnLast | AlphaCode::ReturnFf => {
                    *span_freq.entry(span_symbol(&spans[sc])).or_insert(0) += 1;
                    // the RETURN_NOOP alignment slot is not encoded
                    sc += 2;
                }
                _ => {
                    *span_freq.entry(span_symbol(&spans[sc])).or_insert(0) += 1;
                    sc += 1;
                }
            }
        }
    }

    // Most frequent jump targets become table entries; ties resolve to
    // the smaller (subsong, channel, address).
    let mut targets: Vec<(&(u8, u8, u16), &usize)> = jump_targets.iter().collect();
    targets.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    let table_targets: Vec<(u8, u8, u16)> = targets
        .iter()
        .take(JUMP_TABLE_SIZE)
        .map(|(&k, _)| k)
        .collect();
    let table_lookup: HashMap<(u8, u8, u16), usize> = table_targets
        .iter()
        .enumerate()
        .map(|(i, &k)| (k, i))
        .collect();

    debug!(
        "jump table: {} of {} distinct targets",
        table_targets.len(),
        jump_targets.len()
    );

    let trees = FieldTrees {
        abstract_tree: build_huffman_tree(&abstract_freq, huffman_leaf_limit, LITERAL_ESCAPE),
        control: build_huffman_tree(&control_freq, huffman_leaf_limit, LITERAL_ESCAPE),
        volume: build_huffman_tree(&volume_freq, huffman_leaf_limit, LITERAL_ESCAPE),
        duration: build_huffman_tree(&duration_freq, huffman_leaf_limit, LITERAL_ESCAPE),
        span: build_huffman_tree(&span_freq, huffman_leaf_limit, LITERAL_ESCAPE),
    };
    let indexes = FieldIndexes {
        abstract_index: trees.abstract_tree.build_index(),
        control: trees.control.build_index(),
        volume: trees.volume.build_index(),
        duration: trees.duration.build_index(),
        span: trees.span.build_index(),
    };

    // Emission: data, spans, jumps per channel.  Jump operands are
    // placeholders recorded as forward references.
    let mut encoded: Vec<EncodedChannel> = Vec::with_capacity(channels.len());
    let mut position_map: HashMap<(u8, u8, u16), usize> = HashMap::new();
    let mut forward_references: Vec<ForwardReference> = Vec::new();
    let mut stream_data_offset = 0usize;

    for (channel_index, &(subsong, channel, streams)) in channels.iter().enumerate() {
        let mut data = Bitstream::new(BITSTREAM_BLOCK_SIZE);
        let mut spans = Bitstream::new(BITSTREAM_BLOCK_SIZE);
        let mut jumps = Bitstream::new(BITSTREAM_BLOCK_SIZE);

        let mut code_index = 0usize;
        let mut iter = streams.compressed_code_sequence.iter();
        while let Some(code) = iter.next() {
            position_map.insert(
                (subsong as u8, channel as u8, code_index as u16),
                stream_data_offset + data.position(),
            );
            match code {
                AlphaCode::WriteDelta(d) => {
                    write_code(&mut data, &indexes.abstract_index, abstract_symbol(code))?;
                    if let Some(c) = d.control {
                        write_code(&mut data, &indexes.control, u64::from(c.as_u8()))?;
                    }
                    if let Some(f) = d.frequency {
                        data.write_bits(u64::from(f.as_u8()), FREQUENCY_BITS)?;
                    }
                    if let Some(v) = d.volume {
                        write_code(&mut data, &indexes.volume, u64::from(v.to_byte()))?;
                    }
                }
                AlphaCode::Pause { duration } | AlphaCode::Sustain { duration } => {
                    write_code(&mut data, &indexes.abstract_index, abstract_symbol(code))?;
                    write_code(&mut data, &indexes.duration, u64::from(*duration))?;
                }
                AlphaCode::BranchPoint | AlphaCode::TakeDataJump => {
                    write_code(&mut data, &indexes.abstract_index, abstract_symbol(code))?;
                    // the adjacent JUMP is this code's operand
                    code_index += 1;
                    let target = match iter.next() {
                        Some(AlphaCode::Jump(t)) => *t,
                        other => unreachable!("missing JUMP operand: {:?}", other),
                    };
                    write_jump_operand(
                        &mut data,
                        StreamKind::Data,
                        channel_index,
                        &target,
                        &table_lookup,
                        &mut forward_references,
                    )?;
                }
                other => unreachable!("{:?} cannot appear in a data stream", other),
            }
            code_index += 1;
        }

        let span_sequence = &streams.span_sequence;
        let mut sc = 0;
        while sc < span_sequence.len() {
            let code = &span_sequence[sc];
            write_code(&mut spans, &indexes.span, span_symbol(code))?;
            match code {
                AlphaCode::TakeTrackJump => {
                    let target = match span_sequence[sc + 1] {
                        AlphaCode::Jump(t) => t,
                        other => unreachable!("missing JUMP operand: {:?}", other),
                    };
                    write_jump_operand(
                        &mut jumps,
                        StreamKind::Jump,
                        channel_index,
                        &target,
                        &table_lookup,
                        &mut forward_references,
                    )?;
                    sc += 2;
                }
                AlphaCode::ReturnLast | AlphaCode::ReturnFf => sc += 2,
                _ => sc += 1,
            }
        }

        // the next data stream starts on the following byte boundary
        stream_data_offset += data.bytes_used() * 8;

        encoded.push(EncodedChannel {
            subsong,
            channel,
            data,
            spans,
            jumps,
        });
    }

    // Patch pass: resolve every forward reference against the final
    // position map.
    for fr in &forward_references {
        let key = (fr.target.subsong, fr.target.channel, fr.target.address);
        let stream = match fr.stream {
            StreamKind::Data => &mut encoded[fr.channel_index].data,
            StreamKind::Jump => &mut encoded[fr.channel_index].jumps,
        };
        stream.seek(fr.bit_pos);
        match fr.tabulated {
            Some(index) => {
                stream.write_bits(index as u64, JUMP_TABLE_INDEX_BITS)?;
            }
            None => {
                let address = position_map[&key];
                if address >= 1 << JUMP_ADDRESS_BITS {
                    return Err(OverflowError::JumpAddressOutOfRange(address).into());
                }
                stream.write_bits(address as u64, JUMP_ADDRESS_BITS)?;
            }
        }
    }

    // the jump table itself holds resolved global bit addresses
    let mut jump_table = Vec::with_capacity(table_targets.len());
    for key in &table_targets {
        let address = position_map[key];
        if address >= 1 << JUMP_ADDRESS_BITS {
            return Err(OverflowError::JumpAddressOutOfRange(address).into());
        }
        jump_table.push(address as u16);
    }

    Ok(EncodedStreams {
        channels: encoded,
        jump_table,
        trees,
    })
}

fn write_code(
    stream: &mut Bitstream,
    index: &HashMap<Symbol, Vec<bool>>,
    symbol: Symbol,
) -> Result<(), ExportError> {
    match index.get(&symbol) {
        Some(path) => {
            for &bit in path {
                stream.write_bit(bit)?;
            }
        }
        None => {
            // culled by the leaf cap: escape code then the raw byte
            for &bit in &index[&LITERAL_ESCAPE] {
                stream.write_bit(bit)?;
            }
            stream.write_bits(symbol & 0xff, 8)?;
        }
    }
    Ok(())
}

/// Writes the 1-bit tabulated flag and a placeholder operand, recording
/// a forward reference for the patch pass.
fn write_jump_operand(
    stream: &mut Bitstream,
    kind: StreamKind,
    channel_index: usize,
    target: &JumpTarget,
    table_lookup: &HashMap<(u8, u8, u16), usize>,
    forward_references: &mut Vec<ForwardReference>,
) -> Result<(), ExportError> {
    let key = (target.subsong, target.channel, target.address);
    let tabulated = table_lookup.get(&key).copied();
    stream.write_bit(tabulated.is_some())?;

    let bit_pos = stream.position();
    let width = match tabulated {
        Some(_) => JUMP_TABLE_INDEX_BITS,
        None => JUMP_ADDRESS_BITS,
    };
    stream.write_bits(0, width)?;

    forward_references.push(ForwardReference {
        channel_index,
        stream: kind,
        bit_pos,
        target: *target,
        tabulated,
    });
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alpha_code::AlphaChar;
    use crate::control_flow::build_compressed_streams;
    use crate::driver_constants::MAX_HUFFMAN_LEAVES;
    use crate::span_compressor::compress_spans;
    use crate::suffix_tree::SuffixTree;

    fn compress(seq: &[AlphaChar]) -> CompressedStreams {
        let mut codes: Vec<AlphaCode> = seq
            .iter()
            .map(|&c| AlphaCode::Sustain {
                duration: (c + 1) as u8,
            })
            .collect();
        codes.push(AlphaCode::Stop);
        let mut alpha: Vec<AlphaChar> = seq.to_vec();
        alpha.push(63);
        let tree = SuffixTree::new(&alpha, 64);
        let parse = compress_spans(0, 0, &alpha, &tree);
        build_compressed_streams(0, 0, &codes, &parse)
    }

    #[test]
    fn literal_program_decodes_back() {
        let streams = compress(&[0, 1, 2, 3]);
        let EncodedStreams {
            channels, trees, ..
        } = encode_bitstreams(&[(0, 0, &streams)], MAX_HUFFMAN_LEAVES).unwrap();
        let mut channel = channels.into_iter().next().unwrap();

        channel.data.seek(0);
        for d in [1u8, 2, 3, 4] {
            let sym = trees.abstract_tree.decode(&mut channel.data);
            assert_eq!(sym, u64::from(tags::SUSTAIN) << 8);
            let duration = trees.duration.decode(&mut channel.data);
            assert_eq!(duration, u64::from(d));
        }
        // terminating branch point and its operand
        let sym = trees.abstract_tree.decode(&mut channel.data);
        assert_eq!(sym, u64::from(tags::BRANCH_POINT) << 8);

        channel.spans.seek(0);
        let stop = trees.span.decode(&mut channel.spans);
        assert_eq!(stop, u64::from(tags::STOP));
    }

    #[test]
    fn jump_operands_are_patched_to_code_positions() {
        // a motif repeat forces a branch point with a default jump back
        // to position 0
        let streams = compress(&[0, 1, 2, 3, 4, 0, 1, 2, 3, 4, 0, 1, 2, 3, 4]);
        let EncodedStreams {
            channels,
            jump_table,
            trees,
        } = encode_bitstreams(&[(0, 0, &streams)], MAX_HUFFMAN_LEAVES).unwrap();
        let mut channel = channels.into_iter().next().unwrap();

        // the most frequent target sits in the jump table and its
        // address is the stream start
        assert!(!jump_table.is_empty());
        assert_eq!(jump_table[0], 0);

        // decode up to the first branch point and check its operand is
        // a table reference
        channel.data.seek(0);
        for _ in 0..5 {
            let sym = trees.abstract_tree.decode(&mut channel.data);
            assert_eq!(sym, u64::from(tags::SUSTAIN) << 8);
            trees.duration.decode(&mut channel.data);
        }
        let sym = trees.abstract_tree.decode(&mut channel.data);
        assert_eq!(sym, u64::from(tags::BRANCH_POINT) << 8);
        let tabulated = channel.data.read_bit();
        assert!(tabulated);
        let index = channel.data.read_bits(JUMP_TABLE_INDEX_BITS);
        assert_eq!(jump_table[index as usize], 0);
    }

    #[test]
    fn encoding_is_deterministic() {
        let streams = compress(&[0, 1, 2, 0, 1, 2, 0, 1, 2, 3, 4, 0, 1, 2, 5]);
        let a = encode_bitstreams(&[(0, 0, &streams)], MAX_HUFFMAN_LEAVES).unwrap();
        let b = encode_bitstreams(&[(0, 0, &streams)], MAX_HUFFMAN_LEAVES).unwrap();

        let bytes = |mut bs: Bitstream| -> Vec<u8> {
            bs.seek(0);
            let mut out = Vec::new();
            while bs.has_bits() {
                out.push(bs.read_byte());
            }
            out
        };
        let a0 = a.channels.into_iter().next().unwrap();
        let b0 = b.channels.into_iter().next().unwrap();
        assert_eq!(bytes(a0.data), bytes(b0.data));
        assert_eq!(bytes(a0.spans), bytes(b0.spans));
        assert_eq!(bytes(a0.jumps), bytes(b0.jumps));
        assert_eq!(a.jump_table, b.jump_table);
    }
}
