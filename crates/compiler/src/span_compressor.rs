//! Greedy span discovery

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use log::debug;

use crate::alpha_code::AlphaChar;
use crate::driver_constants::MIN_BACK_REFERENCE_LENGTH;
use crate::suffix_tree::SuffixTree;

/// A half-open slice of one channel's code sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub subsong: usize,
    pub channel: usize,
    pub start: usize,
    pub length: usize,
}

/// Result of the greedy parse.
///
/// `copy_map[i]` is the leftmost origin of position `i`
/// (`copy_map[i] == i` exactly at literal positions).
/// `branch_frequency_map[src]` counts, per successor, how often the
/// leftmost position `src` was followed by that successor across all
/// traversals.  `skip_map[src]` is the default branch target.
pub struct SpanParse {
    pub spans: Vec<Span>,
    pub copy_map: Vec<usize>,
    pub branch_frequency_map: Vec<BTreeMap<usize, usize>>,
    pub skip_map: Vec<usize>,
}

impl SpanParse {
    /// Spans whose origin lies before their application position.
    pub fn back_reference_count(&self) -> usize {
        let mut pos = 0;
        let mut count = 0;
        for s in &self.spans {
            if s.start < pos {
                count += 1;
            }
            pos += s.length;
        }
        count
    }
}

/// Greedy left-to-right parse of `alpha_sequence` into literal spans
/// and back-references of length > `MIN_BACK_REFERENCE_LENGTH`.
pub fn compress_spans(
    subsong: usize,
    channel: usize,
    alpha_sequence: &[AlphaChar],
    tree: &SuffixTree,
) -> SpanParse {
    let n = alpha_sequence.len();

    let mut spans = Vec::new();
    let mut copy_map = vec![0usize; n];
    let mut branch_frequency_map: Vec<BTreeMap<usize, usize>> = vec![BTreeMap::new(); n];

    let mut current = Span {
        subsong,
        channel,
        start: 0,
        length: 0,
    };

    let mut i = 0;
    while i < n {
        let prior = tree.find_prior(i);
        if prior.length > MIN_BACK_REFERENCE_LENGTH {
            if current.length > 0 {
                spans.push(current);
            }
            spans.push(Span {
                subsong,
                channel,
                start: prior.start,
                length: prior.length,
            });
            debug!(
                "{}: back-reference to {} - {}",
                i, prior.start, prior.length
            );

            // traversing the prior span, duplicate the copy map
            for j in prior.start..prior.start + prior.length {
                let next_addr = copy_map[j];
                copy_map[i] = next_addr;
                if i > 0 {
                    let last_addr = copy_map[i - 1];
                    *branch_frequency_map[last_addr].entry(next_addr).or_insert(0) += 1;
                }
                i += 1;
            }
            current.start = i;
            current.length = 0;
        } else {
            if i > 0 {
                let last_addr = copy_map[i - 1];
                *branch_frequency_map[last_addr].entry(i).or_insert(0) += 1;
            }
            copy_map[i] = i;
            current.length += 1;
            i += 1;
        }
    }
    if current.length > 0 {
        spans.push(current);
    }

    // Default branch per position: the most frequent successor that is
    // not the physical neighbour (ties towards the smaller index), so
    // SKIP and TAKE_DATA_JUMP decisions can never collide.  Positions
    // with fewer than two recorded successors never branch; their
    // entry is the untaken neighbour.
    let skip_map = branch_frequency_map
        .iter()
        .enumerate()
        .map(|(src, table)| {
            if table.len() < 2 {
                src + 1
            } else {
                let (&target, _) = table
                    .iter()
                    .filter(|&(&succ, _)| succ != src + 1)
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                    .unwrap();
                target
            }
        })
        .collect();

    SpanParse {
        spans,
        copy_map,
        branch_frequency_map,
        skip_map,
    }
}
