//! JSON Data

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use serde::Deserialize;

use crate::driver_constants::{MAX_HUFFMAN_LEAVES, N_CHANNEL_REGISTERS};
use crate::errors::{ConfigError, DeserializeError};
use crate::register_dump::{
    ChannelAddressMap, RegisterWrite, CHANNEL_0_ADDRESSES, CHANNEL_1_ADDRESSES,
};

/// One independently addressable song within the project.
#[derive(Deserialize, Debug)]
pub struct Subsong {
    pub writes: Vec<RegisterWrite>,
}

/// The register-dump project file: song metadata plus the per-subsong
/// register-write logs captured from playback.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub system_name: String,
    pub subsongs: Vec<Subsong>,
}

pub struct ProjectFile {
    pub path: PathBuf,
    pub file_name: String,
    pub project: Project,
}

pub fn load_project_file(path: PathBuf) -> Result<ProjectFile, DeserializeError> {
    let file_name = path
        .file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string();

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => return Err(DeserializeError::OpenError(file_name, e)),
    };
    let reader = BufReader::new(file);

    let project = match serde_json::from_reader(reader) {
        Ok(p) => p,
        Err(e) => return Err(DeserializeError::SerdeError(file_name, e)),
    };

    Ok(ProjectFile {
        path,
        file_name,
        project,
    })
}

/// Export configuration.
///
/// Recognized keys mirror the tracker's `romout.*` settings:
/// `tiaExportType` selects the encoder, `debugOutput` adds the
/// register-dump report, and the channel address arrays override the
/// default TIA register map.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default = "default_export_type")]
    pub tia_export_type: String,
    #[serde(default)]
    pub debug_output: bool,
    #[serde(default = "default_huffman_leaf_limit")]
    pub huffman_leaf_limit: usize,
    #[serde(default)]
    pub channel0_addresses: Option<[u16; N_CHANNEL_REGISTERS]>,
    #[serde(default)]
    pub channel1_addresses: Option<[u16; N_CHANNEL_REGISTERS]>,
}

fn default_export_type() -> String {
    "TIAZIP".to_owned()
}

fn default_huffman_leaf_limit() -> usize {
    MAX_HUFFMAN_LEAVES
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tia_export_type: default_export_type(),
            debug_output: false,
            huffman_leaf_limit: MAX_HUFFMAN_LEAVES,
            channel0_addresses: None,
            channel1_addresses: None,
        }
    }
}

impl ExportConfig {
    pub fn channel_address_map(&self, channel: usize) -> Result<ChannelAddressMap, ConfigError> {
        let (overrides, default) = match channel {
            0 => (&self.channel0_addresses, CHANNEL_0_ADDRESSES),
            1 => (&self.channel1_addresses, CHANNEL_1_ADDRESSES),
            _ => return Err(ConfigError::InvalidChannelAddressMap(channel)),
        };
        match overrides {
            Some([control, frequency, volume]) => {
                if control == frequency || control == volume || frequency == volume {
                    return Err(ConfigError::InvalidChannelAddressMap(channel));
                }
                Ok(ChannelAddressMap {
                    control: *control,
                    frequency: *frequency,
                    volume: *volume,
                })
            }
            None => Ok(default),
        }
    }
}

pub fn load_export_config(path: PathBuf) -> Result<ExportConfig, DeserializeError> {
    let file_name = path
        .file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .to_string();

    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) => return Err(DeserializeError::OpenError(file_name, e)),
    };

    match serde_json::from_reader(BufReader::new(file)) {
        Ok(c) => Ok(c),
        Err(e) => Err(DeserializeError::SerdeError(file_name, e)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver_constants::addresses;

    #[test]
    fn config_defaults() {
        let config: ExportConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.tia_export_type, "TIAZIP");
        assert!(!config.debug_output);

        let map = config.channel_address_map(1).unwrap();
        assert_eq!(map.control, addresses::AUDC1);
        assert_eq!(map.volume, addresses::AUDV1);
    }

    #[test]
    fn address_overrides_must_be_distinct() {
        let config: ExportConfig =
            serde_json::from_str(r#"{"channel0Addresses": [21, 21, 25]}"#).unwrap();
        assert!(config.channel_address_map(0).is_err());
    }

    #[test]
    fn project_files_parse() {
        let json = r#"{
            "name": "test song",
            "author": "someone",
            "subsongs": [{"writes": [
                {"writeIndex": 0, "systemIndex": 0, "addr": 25, "val": 8,
                 "hz": 50.0, "seconds": 0, "ticks": 0,
                 "rowIndex": {"subsong": 0, "ord": 0, "row": 0}}
            ]}]
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.subsongs.len(), 1);
        assert_eq!(project.subsongs[0].writes[0].addr, 25);
    }
}
