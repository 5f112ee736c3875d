//! TIAZip end-to-end tests

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

use compiler::alpha_code::{create_alphabet, tags, AlphaCode, VolumeField, WriteDelta};
use compiler::channel_code_generator::encode_channel_state_codes;
use compiler::code_interpreter::validate_code_sequence;
use compiler::control_flow::{build_compressed_streams, CompressedStreams};
use compiler::data::{ExportConfig, Project, Subsong};
use compiler::driver_constants::{
    addresses, FREQUENCY_BITS, JUMP_ADDRESS_BITS, JUMP_TABLE_INDEX_BITS,
};
use compiler::export::export_project;
use compiler::register_dump::{ChannelState, ChannelStateInterval, RegisterWrite, RowIndex};
use compiler::span_compressor::compress_spans;
use compiler::stream_encoder::{encode_bitstreams, EncodedStreams, FieldTrees};
use compiler::{Bitstream, SuffixTree};

const HZ: f32 = 50.0;
const TICKS_PER_FRAME: u32 = 1000000 / 50;

fn state(control: u8, frequency: u8, volume: u8) -> ChannelState {
    ChannelState::from_registers([control, frequency, volume])
}

fn interval(control: u8, frequency: u8, volume: u8, duration: u8) -> ChannelStateInterval {
    ChannelStateInterval {
        state: state(control, frequency, volume),
        duration,
    }
}

fn register_write(write_index: u32, frame: u32, addr: u16, val: u8) -> RegisterWrite {
    RegisterWrite {
        write_index,
        system_index: 0,
        addr,
        val,
        hz: HZ,
        seconds: 0,
        ticks: frame * TICKS_PER_FRAME,
        row_index: RowIndex {
            subsong: 0,
            ord: 0,
            row: 0,
        },
    }
}

fn project(subsongs: Vec<Vec<RegisterWrite>>) -> Project {
    Project {
        name: "test song".to_owned(),
        author: "test author".to_owned(),
        category: String::new(),
        system_name: String::new(),
        subsongs: subsongs
            .into_iter()
            .map(|writes| Subsong { writes })
            .collect(),
    }
}

/// Runs the compression pipeline over hand-built intervals, returning
/// the uncompressed code sequence and the validated streams.
fn compress_channel(
    subsong: usize,
    channel: usize,
    intervals: &[ChannelStateInterval],
) -> (Vec<AlphaCode>, CompressedStreams) {
    let mut codes = Vec::new();
    let mut committed = ChannelState::SILENCE;
    for n in intervals {
        committed = encode_channel_state_codes(&n.state, n.duration, &committed, &mut codes);
    }
    codes.push(AlphaCode::Stop);

    let mut frequency_map = BTreeMap::new();
    for code in &codes {
        *frequency_map.entry(*code).or_insert(0) += 1;
    }
    let alphabet = create_alphabet(&frequency_map);

    let alpha_sequence = alphabet.index_sequence(&codes);
    let tree = SuffixTree::new(&alpha_sequence, alphabet.len());
    let parse = compress_spans(subsong, channel, &alpha_sequence, &tree);
    let streams = build_compressed_streams(subsong, channel, &codes, &parse);

    validate_code_sequence(subsong, channel, &codes, &streams).unwrap();
    (codes, streams)
}

fn compress_intervals(intervals: &[ChannelStateInterval]) -> (Vec<AlphaCode>, CompressedStreams) {
    compress_channel(0, 0, intervals)
}

/// Walks a data stream linearly, resolving every branch/data-jump
/// operand the way the decoder does.
fn decode_jump_targets(
    trees: &FieldTrees,
    jump_table: &[u16],
    data: &mut Bitstream,
) -> Vec<usize> {
    data.seek(0);
    let mut targets = Vec::new();
    while data.position() < data.size() {
        let sym = trees.abstract_tree.decode(data);
        match (sym >> 8) as u8 {
            tags::WRITE_DELTA => {
                let mask = (sym & 0xff) as u8;
                if mask & WriteDelta::CONTROL_FLAG != 0 {
                    trees.control.decode(data);
                }
                if mask & WriteDelta::FREQUENCY_FLAG != 0 {
                    data.read_bits(FREQUENCY_BITS);
                }
                if mask & WriteDelta::VOLUME_FLAG != 0 {
                    trees.volume.decode(data);
                }
            }
            tags::PAUSE | tags::SUSTAIN => {
                trees.duration.decode(data);
            }
            tags::BRANCH_POINT | tags::TAKE_DATA_JUMP => {
                let target = if data.read_bit() {
                    usize::from(jump_table[data.read_bits(JUMP_TABLE_INDEX_BITS) as usize])
                } else {
                    data.read_bits(JUMP_ADDRESS_BITS) as usize
                };
                targets.push(target);
            }
            other => panic!("unexpected abstract symbol tag {}", other),
        }
    }
    targets
}

// S1: 16 frames of silence
#[test]
fn silence_compresses_to_a_few_bytes() {
    let intervals = [interval(0, 0, 0, 16)];
    let (codes, streams) = compress_intervals(&intervals);

    assert_eq!(
        codes,
        vec![
            AlphaCode::Pause { duration: 1 },
            AlphaCode::Sustain { duration: 15 },
            AlphaCode::Stop,
        ]
    );

    let encoded = encode_bitstreams(&[(0, 0, &streams)], 128).unwrap();
    assert!(encoded.channels[0].data.bytes_used() <= 4);
}

// S2: 128 frames of a constant tone
#[test]
fn constant_tone_is_one_delta_and_sustains() {
    let intervals = [interval(4, 10, 8, 128)];
    let (codes, _) = compress_intervals(&intervals);

    assert_eq!(
        codes[0],
        AlphaCode::WriteDelta(WriteDelta {
            control: Some(4u8.try_into().unwrap()),
            frequency: Some(10u8.try_into().unwrap()),
            volume: Some(VolumeField::Absolute(8u8.try_into().unwrap())),
            duration: 1,
        })
    );
    let sustains: Vec<&AlphaCode> = codes[1..codes.len() - 1].iter().collect();
    assert_eq!(sustains.len(), 4);
    let total: u32 = sustains
        .iter()
        .map(|c| match c {
            AlphaCode::Sustain { duration } => u32::from(*duration),
            other => panic!("expected SUSTAIN, got {:?}", other),
        })
        .sum();
    assert_eq!(total, 127);
    assert!(sustains.iter().all(|c| match c {
        AlphaCode::Sustain { duration } => *duration <= 32,
        _ => false,
    }));
    assert_eq!(codes.last(), Some(&AlphaCode::Stop));
}

// S3: an 8-interval motif repeated 4 times
#[test]
fn repeated_motif_repetitions_become_branch_decisions() {
    let mut intervals = Vec::new();
    for _ in 0..4 {
        for f in 1..=8 {
            intervals.push(interval(4, f, 8, 1));
        }
    }
    let (codes, streams) = compress_intervals(&intervals);
    assert_eq!(codes.len(), 33);

    // the motif is emitted once; repetitions need no payload codes
    let payload_count = streams
        .compressed_code_sequence
        .iter()
        .filter(|c| matches!(c, AlphaCode::WriteDelta(_)))
        .count();
    assert!(
        payload_count <= 9,
        "motif data re-emitted: {} payload codes",
        payload_count
    );
    assert!(streams.span_sequence.len() > 1);

    // compressed byte count stays under twice the literal cost
    let encoded = encode_bitstreams(&[(0, 0, &streams)], 128).unwrap();
    let compressed_bytes = encoded.channels[0].data.bytes_used()
        + encoded.channels[0].spans.bytes_used()
        + encoded.channels[0].jumps.bytes_used();
    let literal_cost = codes.len(); // one byte per code in the delta dump
    assert!(
        compressed_bytes <= 2 * literal_cost,
        "{} > 2 * {}",
        compressed_bytes,
        literal_cost
    );
}

// S4: two channels with independent content
#[test]
fn two_channel_export_produces_independent_streams() {
    let mut writes = Vec::new();
    // channel 0: constant tone for 128 frames
    writes.push(register_write(0, 0, addresses::AUDC0, 4));
    writes.push(register_write(1, 0, addresses::AUDF0, 10));
    writes.push(register_write(2, 0, addresses::AUDV0, 8));
    // channel 1: stays silent; a final write ends the song at frame 128
    writes.push(register_write(3, 128, addresses::AUDV0, 0));

    let project = project(vec![writes]);
    let config = ExportConfig::default();
    let abort = AtomicBool::new(false);

    let outputs = export_project(&project, &config, &abort).unwrap();

    let track_data = outputs
        .iter()
        .find(|o| o.filename == "Track_data.asm")
        .expect("missing Track_data.asm");
    let text = std::str::from_utf8(&track_data.data).unwrap();

    assert!(text.contains("AUDIO_DATA_S0_C0_START"));
    assert!(text.contains("AUDIO_DATA_S0_C1_START"));
    assert!(text.contains("SPANS_S0_C0_START"));
    assert!(text.contains("JUMPS_S0_C1_START"));

    // every data block precedes every span and jump block: inline jump
    // addresses assume the data blocks are laid out contiguously.
    // ("\n" prefix skips the AUDIO_TRACKS pointer-table references.)
    let block = |label: &str| {
        let needle = format!("\n{}", label);
        text.find(&needle).unwrap_or_else(|| panic!("missing block {}", label))
    };
    assert!(block("AUDIO_DATA_S0_C0_START") < block("AUDIO_DATA_S0_C1_START"));
    assert!(block("AUDIO_DATA_S0_C1_START") < block("SPANS_S0_C0_START"));
    assert!(block("SPANS_S0_C1_START") < block("JUMPS_S0_C0_START"));

    assert!(outputs.iter().any(|o| o.filename == "Track_meta.asm"));
    assert!(outputs.iter().any(|o| o.filename == "Track_binary.0.0.o"));
    assert!(outputs.iter().any(|o| o.filename == "Track_binary.0.1.o"));
}

// the global addressing contract behind that layout: a second
// channel's jump operands must resolve into its own region of the
// concatenated data blocks
#[test]
fn jump_addresses_stay_inside_their_channels_data_block() {
    // channel 0: a short silence program; channel 1: a motif whose
    // repeats force branch points and data jumps
    let (_, ch0) = compress_channel(0, 0, &[interval(0, 0, 0, 16)]);
    let mut motif = Vec::new();
    for _ in 0..3 {
        for f in 1..=6 {
            motif.push(interval(4, f, 8, 1));
        }
    }
    let (_, ch1) = compress_channel(0, 1, &motif);

    let EncodedStreams {
        mut channels,
        jump_table,
        trees,
    } = encode_bitstreams(&[(0, 0, &ch0), (0, 1, &ch1)], 128).unwrap();

    // channel 1's data begins on the byte boundary after channel 0's
    let ch0_bits = channels[0].data.bytes_used() * 8;
    let ch1_bits = channels[1].data.size();

    let targets = decode_jump_targets(&trees, &jump_table, &mut channels[1].data);
    assert!(!targets.is_empty());
    for target in targets {
        assert!(
            target >= ch0_bits && target < ch0_bits + ch1_bits,
            "channel 1 jump target {} outside its data block [{}, {})",
            target,
            ch0_bits,
            ch0_bits + ch1_bits
        );
    }
}

// S5: a one-step-per-frame volume ramp
#[test]
fn volume_ramp_uses_the_step_sentinel() {
    let mut last = state(4, 10, 0);
    for v in 1..=7 {
        let mut codes = Vec::new();
        last = encode_channel_state_codes(&state(4, 10, v), 1, &last, &mut codes);
        assert_eq!(
            codes,
            vec![AlphaCode::WriteDelta(WriteDelta {
                control: None,
                frequency: None,
                volume: Some(VolumeField::StepUp),
                duration: 1,
            })],
            "volume step {}",
            v
        );
    }
}

#[test]
fn no_write_delta_without_change_flags() {
    let mut intervals = Vec::new();
    for f in 0..20u8 {
        intervals.push(interval(f % 3, (f * 7) % 32, (f % 15) + 1, (f % 5) + 1));
        intervals.push(interval(f % 3, (f * 7) % 32, 0, 3));
    }
    let (codes, _) = compress_intervals(&intervals);
    for code in &codes {
        if let AlphaCode::WriteDelta(d) = code {
            assert_ne!(d.mask(), 0);
        }
    }
}

#[test]
fn pause_implies_zero_volume() {
    let intervals = [
        interval(4, 10, 8, 4),
        interval(4, 10, 0, 6),
        interval(4, 12, 8, 4),
        interval(4, 12, 0, 2),
    ];
    let mut codes = Vec::new();
    let mut committed = ChannelState::SILENCE;
    for n in &intervals {
        let before = codes.len();
        committed = encode_channel_state_codes(&n.state, n.duration, &committed, &mut codes);
        let emitted_pause = codes[before..]
            .iter()
            .any(|c| matches!(c, AlphaCode::Pause { .. }));
        assert_eq!(emitted_pause, n.state.volume.as_u8() == 0);
    }
}

#[test]
fn length_bound_over_a_mixed_sequence() {
    let mut intervals = Vec::new();
    for round in 0..6u8 {
        for f in 1..=6u8 {
            intervals.push(interval(4, f, 8, 2));
        }
        intervals.push(interval(4, (round % 4) + 20, 8, 1));
    }
    let (codes, streams) = compress_intervals(&intervals);

    let control_sites = streams
        .compressed_code_sequence
        .iter()
        .filter(|c| matches!(c, AlphaCode::BranchPoint | AlphaCode::TakeDataJump))
        .count();
    assert!(streams.compressed_code_sequence.len() <= codes.len() + 2 * control_sites);
}

#[test]
fn export_is_deterministic() {
    let mut writes = Vec::new();
    for i in 0..10u32 {
        writes.push(register_write(i * 3, i * 13, addresses::AUDC0, (i % 4) as u8));
        writes.push(register_write(i * 3 + 1, i * 13, addresses::AUDF0, (i % 29) as u8));
        writes.push(register_write(i * 3 + 2, i * 13 + 5, addresses::AUDV0, (i % 15) as u8));
    }
    writes.push(register_write(100, 200, addresses::AUDV1, 0));

    let project_a = project(vec![writes.clone()]);
    let project_b = project(vec![writes]);
    let config = ExportConfig::default();
    let abort = AtomicBool::new(false);

    let a = export_project(&project_a, &config, &abort).unwrap();
    let b = export_project(&project_b, &config, &abort).unwrap();

    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.filename, y.filename);
        assert_eq!(x.data, y.data, "{} differs between runs", x.filename);
    }
}

#[test]
fn aborted_export_fails_cleanly() {
    let project = project(vec![vec![register_write(0, 16, addresses::AUDV0, 0)]]);
    let config = ExportConfig::default();
    let abort = AtomicBool::new(true);

    assert!(export_project(&project, &config, &abort).is_err());
}

#[test]
fn unknown_export_type_is_a_config_error() {
    let project = project(vec![vec![]]);
    let config = ExportConfig {
        tia_export_type: "ZIP9000".to_owned(),
        ..ExportConfig::default()
    };
    let abort = AtomicBool::new(false);

    assert!(export_project(&project, &config, &abort).is_err());
}

#[test]
fn fseq_is_rejected_as_deprecated() {
    let project = project(vec![vec![]]);
    let config = ExportConfig {
        tia_export_type: "FSEQ".to_owned(),
        ..ExportConfig::default()
    };
    let abort = AtomicBool::new(false);

    assert!(export_project(&project, &config, &abort).is_err());
}
