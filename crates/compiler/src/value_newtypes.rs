//! Newtype generation macros

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

use crate::driver_constants::{CONTROL_BITS, FREQUENCY_BITS, VOLUME_BITS};
use crate::errors::ValueError;

macro_rules! u8_value_newtype {
    ($name:ident, $error:ident, $max:expr) => {
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name(u8);

        #[allow(dead_code)]
        impl $name {
            pub const MIN: Self = Self(0);
            pub const MAX: Self = Self($max);

            pub const fn as_u8(&self) -> u8 {
                self.0
            }
        }

        impl TryFrom<u8> for $name {
            type Error = ValueError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                if value <= Self::MAX.0 {
                    Ok(Self(value))
                } else {
                    Err(ValueError::$error(u32::from(value)))
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = ValueError;

            fn try_from(value: u32) -> Result<Self, Self::Error> {
                if value <= Self::MAX.0.into() {
                    Ok(Self(u8::try_from(value).unwrap()))
                } else {
                    Err(ValueError::$error(value))
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

pub(crate) use u8_value_newtype;

u8_value_newtype!(AudioControl, AudioControlOutOfRange, (1 << CONTROL_BITS) - 1);
u8_value_newtype!(AudioFrequency, AudioFrequencyOutOfRange, (1 << FREQUENCY_BITS) - 1);
u8_value_newtype!(AudioVolume, AudioVolumeOutOfRange, (1 << VOLUME_BITS) - 1);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_ranges() {
        assert!(AudioControl::try_from(15u8).is_ok());
        assert!(AudioControl::try_from(16u8).is_err());
        assert!(AudioFrequency::try_from(31u8).is_ok());
        assert!(AudioFrequency::try_from(32u8).is_err());
        assert!(AudioVolume::try_from(15u8).is_ok());
        assert!(AudioVolume::try_from(16u8).is_err());
    }
}
