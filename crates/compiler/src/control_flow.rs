//! Control-flow rewriting of the parsed spans

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use log::debug;

use crate::alpha_code::{AlphaCode, JumpTarget};
use crate::span_compressor::SpanParse;

/// The two parallel instruction streams of one (subsong, channel).
///
/// `compressed_code_sequence` is the linear decoder program: payload
/// codes plus branch points and unconditional data jumps.
/// `span_sequence` is the decision taken at each branch point, in
/// traversal order, terminated by `STOP`.
pub struct CompressedStreams {
    pub compressed_code_sequence: Vec<AlphaCode>,
    pub span_sequence: Vec<AlphaCode>,
}

fn jump(subsong: usize, channel: usize, address: usize) -> AlphaCode {
    AlphaCode::Jump(JumpTarget {
        subsong: subsong as u8,
        channel: channel as u8,
        address: address as u16,
    })
}

fn jump_address(code: AlphaCode) -> usize {
    match code {
        AlphaCode::Jump(t) => usize::from(t.address),
        _ => unreachable!("operand slot does not hold a JUMP"),
    }
}

/// Rewrites the linear code sequence into the dual-stream decoder
/// program.
///
/// Every position of the parse is visited once.  Literal positions
/// emit their code (and any control codes) into the data stream;
/// back-reference positions only emit decisions into the span stream,
/// because the decoder seeks back to the original copy of the data.
pub fn build_compressed_streams(
    subsong: usize,
    channel: usize,
    code_sequence: &[AlphaCode],
    parse: &SpanParse,
) -> CompressedStreams {
    let n = code_sequence.len();
    assert!(n > 0 && code_sequence[n - 1] == AlphaCode::Stop);

    let copy_map = &parse.copy_map;
    let branch_map = &parse.branch_frequency_map;
    let skip_map = &parse.skip_map;

    let mut compressed: Vec<AlphaCode> = Vec::with_capacity(n);
    let mut span_sequence: Vec<AlphaCode> = Vec::new();

    // position-space address of every literal, patched to
    // compressed-stream indices afterwards
    let mut labels = vec![usize::MAX; n];

    for i in 0..n {
        let leftmost = copy_map[i];

        if leftmost == i {
            labels[i] = compressed.len();

            if i == n - 1 {
                // the terminating STOP lives in the span stream; its
                // data-stream slot is a branch point with an unused
                // return-to-front default
                compressed.push(AlphaCode::BranchPoint);
                compressed.push(jump(subsong, channel, 0));
                span_sequence.push(AlphaCode::Stop);
                break;
            }

            compressed.push(code_sequence[i]);

            let next = copy_map[i + 1];
            let branching = branch_map[i].len() >= 2;
            if !branching {
                if next != i + 1 {
                    // sole successor, unconditional data jump
                    debug!("{}: data jump to {}", i, next);
                    compressed.push(AlphaCode::TakeDataJump);
                    compressed.push(jump(subsong, channel, next));
                }
            } else {
                debug!("{}: branch point, default {}", i, skip_map[i]);
                compressed.push(AlphaCode::BranchPoint);
                compressed.push(jump(subsong, channel, skip_map[i]));
                push_decision(
                    &mut span_sequence,
                    subsong,
                    channel,
                    next,
                    i + 1,
                    skip_map[i],
                );
            }
        } else {
            // traversal of an already-emitted copy
            let next = copy_map[i + 1];
            if branch_map[leftmost].len() >= 2 {
                push_decision(
                    &mut span_sequence,
                    subsong,
                    channel,
                    next,
                    leftmost + 1,
                    skip_map[leftmost],
                );
            }
        }
    }

    // rewrite parse positions to compressed-stream addresses
    for code in compressed.iter_mut().chain(span_sequence.iter_mut()) {
        if let AlphaCode::Jump(t) = code {
            let label = labels[usize::from(t.address)];
            debug_assert!(label != usize::MAX);
            t.address = label as u16;
        }
    }

    let mut streams = CompressedStreams {
        compressed_code_sequence: compressed,
        span_sequence,
    };
    rewrite_returns(&mut streams);
    streams
}

fn push_decision(
    span_sequence: &mut Vec<AlphaCode>,
    subsong: usize,
    channel: usize,
    next: usize,
    fall_through: usize,
    default: usize,
) {
    if next == default {
        span_sequence.push(AlphaCode::TakeDataJump);
    } else if next == fall_through {
        span_sequence.push(AlphaCode::Skip);
    } else {
        span_sequence.push(AlphaCode::TakeTrackJump);
        span_sequence.push(jump(subsong, channel, next));
    }
}

/// Replays the streams once and rewrites every `TAKE_TRACK_JUMP` whose
/// target equals the current return address into `RETURN_LAST`, or the
/// high-water mark into `RETURN_FF`.  The operand slot becomes
/// `RETURN_NOOP` so span-stream alignment is preserved.
///
/// Each span-stream entry is consumed by exactly one traversal, so a
/// rewrite is applied with the decoder state of that traversal and the
/// simulation continues under the rewritten semantics.
fn rewrite_returns(streams: &mut CompressedStreams) {
    let data = &streams.compressed_code_sequence;
    let spans = &mut streams.span_sequence;

    let mut pc = 0;
    let mut sc = 0;
    let mut last_pos = 0;
    let mut max_pos = 0;

    fn set_last(last_pos: &mut usize, max_pos: &mut usize, value: usize) {
        *last_pos = value;
        if value > *max_pos {
            *max_pos = value;
        }
    }

    loop {
        match data[pc] {
            AlphaCode::TakeDataJump => {
                let target = jump_address(data[pc + 1]);
                set_last(&mut last_pos, &mut max_pos, pc + 2);
                pc = target;
            }
            AlphaCode::BranchPoint => {
                let default = jump_address(data[pc + 1]);
                let resume = pc + 2;
                match spans[sc] {
                    AlphaCode::Stop => break,
                    AlphaCode::Skip => {
                        sc += 1;
                        pc = resume;
                    }
                    AlphaCode::TakeDataJump => {
                        sc += 1;
                        set_last(&mut last_pos, &mut max_pos, resume);
                        pc = default;
                    }
                    AlphaCode::TakeTrackJump => {
                        let target = jump_address(spans[sc + 1]);
                        if target == last_pos {
                            debug!("rewriting track jump at {} to RETURN_LAST", sc);
                            spans[sc] = AlphaCode::ReturnLast;
                            spans[sc + 1] = AlphaCode::ReturnNoop;
                        } else if target == max_pos {
                            debug!("rewriting track jump at {} to RETURN_FF", sc);
                            spans[sc] = AlphaCode::ReturnFf;
                            spans[sc + 1] = AlphaCode::ReturnNoop;
                        } else {
                            set_last(&mut last_pos, &mut max_pos, resume);
                        }
                        sc += 2;
                        pc = target;
                    }
                    other => unreachable!("invalid span decision {:?}", other),
                }
            }
            _ => pc += 1,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::alpha_code::AlphaChar;
    use crate::span_compressor::compress_spans;
    use crate::suffix_tree::SuffixTree;

    // Distinct payload codes for small hand-built sequences.
    fn payload(i: AlphaChar) -> AlphaCode {
        AlphaCode::Sustain {
            duration: (i + 1) as u8,
        }
    }

    fn build(seq_codes: &[AlphaChar]) -> (Vec<AlphaCode>, CompressedStreams) {
        let mut codes: Vec<AlphaCode> = seq_codes.iter().map(|&c| payload(c)).collect();
        codes.push(AlphaCode::Stop);

        let alphabet_len = 64;
        let mut alpha: Vec<AlphaChar> = seq_codes.to_vec();
        alpha.push(63); // stop's alphabet index, unique
        let tree = SuffixTree::new(&alpha, alphabet_len);
        let parse = compress_spans(0, 0, &alpha, &tree);
        let streams = build_compressed_streams(0, 0, &codes, &parse);
        (codes, streams)
    }

    #[test]
    fn literal_only_sequence_is_emitted_verbatim() {
        let (_, streams) = build(&[0, 1, 2, 3]);
        assert_eq!(
            streams.compressed_code_sequence,
            vec![
                payload(0),
                payload(1),
                payload(2),
                payload(3),
                AlphaCode::BranchPoint,
                AlphaCode::Jump(crate::alpha_code::JumpTarget {
                    subsong: 0,
                    channel: 0,
                    address: 0
                }),
            ]
        );
        assert_eq!(streams.span_sequence, vec![AlphaCode::Stop]);
    }

    #[test]
    fn repeated_motif_data_is_not_re_emitted() {
        // motif x3 then stop: repeats contribute only span decisions
        let (_, streams) = build(&[0, 1, 2, 3, 4, 0, 1, 2, 3, 4, 0, 1, 2, 3, 4]);

        let payload_count = streams
            .compressed_code_sequence
            .iter()
            .filter(|c| matches!(c, AlphaCode::Sustain { .. }))
            .count();
        assert_eq!(payload_count, 5);
    }

    #[test]
    fn length_bound_holds() {
        let (codes, streams) = build(&[0, 1, 2, 0, 1, 2, 0, 1, 2, 3, 4, 0, 1, 2, 5]);
        let branch_points = streams
            .compressed_code_sequence
            .iter()
            .filter(|c| matches!(c, AlphaCode::BranchPoint | AlphaCode::TakeDataJump))
            .count();
        assert!(
            streams.compressed_code_sequence.len() <= codes.len() + 2 * branch_points,
            "compressed {} > {} + 2*{}",
            streams.compressed_code_sequence.len(),
            codes.len(),
            branch_points
        );
    }

    #[test]
    fn span_stream_ends_with_stop() {
        let (_, streams) = build(&[0, 1, 2, 3, 4, 0, 1, 2, 3, 4]);
        assert_eq!(streams.span_sequence.last(), Some(&AlphaCode::Stop));
    }
}
