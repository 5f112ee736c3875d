//! Compressed stream interpreter and validator

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::alpha_code::AlphaCode;
use crate::control_flow::CompressedStreams;
use crate::errors::DivergenceError;

fn jump_address(code: AlphaCode) -> usize {
    match code {
        AlphaCode::Jump(t) => usize::from(t.address),
        _ => unreachable!("operand slot does not hold a JUMP"),
    }
}

/// Replays the dual streams with the same state machine the 6502
/// decoder runs and compares every payload code against the
/// uncompressed sequence.
///
/// A mismatch is a compressor bug: the error is never retried or
/// masked, it fails the export.
pub fn validate_code_sequence(
    subsong: usize,
    channel: usize,
    code_sequence: &[AlphaCode],
    streams: &CompressedStreams,
) -> Result<(), DivergenceError> {
    let data = &streams.compressed_code_sequence;
    let spans = &streams.span_sequence;
    let n = code_sequence.len();

    let divergence = |position: usize, got: Option<AlphaCode>| DivergenceError {
        subsong,
        channel,
        position,
        expected: code_sequence.get(position).copied(),
        got,
    };

    let mut pc = 0;
    let mut sc = 0;
    let mut last_pos = 0;
    let mut max_pos = 0;
    let mut cursor = 0;

    // A control-flow cycle that emits nothing must fail the build, not
    // hang it.
    let mut fuel = 16 * n + 256;

    loop {
        if fuel == 0 {
            return Err(divergence(cursor, None));
        }
        fuel -= 1;

        match data[pc] {
            AlphaCode::BranchPoint => {
                let default = jump_address(data[pc + 1]);
                let resume = pc + 2;
                match spans[sc] {
                    AlphaCode::Stop => {
                        // the replay must have consumed everything up
                        // to the terminating STOP
                        if cursor != n - 1 || code_sequence[cursor] != AlphaCode::Stop {
                            return Err(divergence(cursor, None));
                        }
                        return Ok(());
                    }
                    AlphaCode::Skip => {
                        sc += 1;
                        pc = resume;
                    }
                    AlphaCode::TakeDataJump => {
                        sc += 1;
                        last_pos = resume;
                        max_pos = max_pos.max(last_pos);
                        pc = default;
                    }
                    AlphaCode::TakeTrackJump => {
                        let target = jump_address(spans[sc + 1]);
                        last_pos = resume;
                        max_pos = max_pos.max(last_pos);
                        sc += 2;
                        pc = target;
                    }
                    AlphaCode::ReturnLast => {
                        debug_assert!(spans[sc + 1] == AlphaCode::ReturnNoop);
                        sc += 2;
                        pc = last_pos;
                    }
                    AlphaCode::ReturnFf => {
                        debug_assert!(spans[sc + 1] == AlphaCode::ReturnNoop);
                        sc += 2;
                        pc = max_pos;
                    }
                    other => return Err(divergence(cursor, Some(other))),
                }
            }
            AlphaCode::TakeDataJump => {
                let target = jump_address(data[pc + 1]);
                last_pos = pc + 2;
                max_pos = max_pos.max(last_pos);
                pc = target;
            }
            code => {
                if cursor >= n || code_sequence[cursor] != code {
                    return Err(divergence(cursor, Some(code)));
                }
                cursor += 1;
                pc += 1;
            }
        }
    }
}
