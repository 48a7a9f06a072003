// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::read_to_string;
use std::path::Path;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::Fallible;
use crate::error::fail;
use crate::model::FsrsParameters;
use crate::schedule::SchedulerSettings;
use crate::types::timestamp::DayBoundary;

pub const CONFIG_FILENAME: &str = "recall.toml";

/// Collection settings, read from `recall.toml`. Every key is optional.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub new_cards_per_day: u32,
    /// The local hour at which the daily new-card allowance resets.
    pub reset_hour: u32,
    /// Fixes the reset hour to a UTC offset instead of the local time zone.
    pub utc_offset_minutes: Option<i32>,
    pub request_retention: f64,
    pub maximum_interval: u32,
    pub enable_fuzz: bool,
}

impl Default for Config {
    fn default() -> Self {
        let fsrs = FsrsParameters::default();
        Self {
            new_cards_per_day: 5,
            reset_hour: 4,
            utc_offset_minutes: None,
            request_retention: fsrs.request_retention,
            maximum_interval: fsrs.maximum_interval,
            enable_fuzz: fsrs.enable_fuzz,
        }
    }
}

impl Config {
    /// Load the config from the given directory, or the defaults if there is
    /// no config file.
    pub fn load(directory: &Path) -> Fallible<Self> {
        let path = directory.join(CONFIG_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Fallible<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Fallible<()> {
        if self.reset_hour > 23 {
            return fail(format!("reset_hour must be below 24, got {}.", self.reset_hour));
        }
        if !(self.request_retention > 0.0 && self.request_retention < 1.0) {
            return fail("request_retention must be between 0 and 1.");
        }
        if self.maximum_interval < 1 {
            return fail("maximum_interval must be at least 1.");
        }
        if let Some(minutes) = self.utc_offset_minutes {
            if minutes.abs() >= 24 * 60 {
                return fail("utc_offset_minutes must be within a day.");
            }
        }
        Ok(())
    }

    pub fn boundary(&self) -> Fallible<DayBoundary> {
        match self.utc_offset_minutes {
            Some(minutes) => match FixedOffset::east_opt(minutes * 60) {
                Some(offset) => DayBoundary::fixed(self.reset_hour, offset),
                None => fail("utc_offset_minutes must be within a day."),
            },
            None => DayBoundary::local(self.reset_hour),
        }
    }

    pub fn scheduler_settings(&self) -> Fallible<SchedulerSettings> {
        Ok(SchedulerSettings {
            new_cards_per_day: self.new_cards_per_day,
            boundary: self.boundary()?,
        })
    }

    pub fn fsrs_parameters(&self) -> FsrsParameters {
        FsrsParameters {
            request_retention: self.request_retention,
            maximum_interval: self.maximum_interval,
            enable_fuzz: self.enable_fuzz,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_defaults_when_missing() -> Fallible<()> {
        let dir = tempdir()?;
        let config = Config::load(dir.path())?;
        assert_eq!(config, Config::default());
        assert_eq!(config.new_cards_per_day, 5);
        Ok(())
    }

    #[test]
    fn test_partial_file() -> Fallible<()> {
        let dir = tempdir()?;
        write(
            dir.path().join(CONFIG_FILENAME),
            "new_cards_per_day = 20\nutc_offset_minutes = 540\n",
        )?;
        let config = Config::load(dir.path())?;
        assert_eq!(config.new_cards_per_day, 20);
        assert_eq!(config.reset_hour, 4);
        let boundary = config.boundary()?;
        assert_eq!(boundary.hour(), 4);
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(Config::parse("new_cards_per_dya = 3").is_err());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(Config::parse("reset_hour = 24").is_err());
        assert!(Config::parse("request_retention = 1.0").is_err());
        assert!(Config::parse("maximum_interval = 0").is_err());
        assert!(Config::parse("utc_offset_minutes = 1440").is_err());
    }

    #[test]
    fn test_fsrs_parameters() -> Fallible<()> {
        let config = Config::parse("enable_fuzz = false\nmaximum_interval = 365")?;
        let params = config.fsrs_parameters();
        assert!(!params.enable_fuzz);
        assert_eq!(params.maximum_interval, 365);
        assert_eq!(params.request_retention, 0.9);
        Ok(())
    }
}
