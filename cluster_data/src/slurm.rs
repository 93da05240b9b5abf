use std::borrow::Borrow;
use std::fmt::Debug;

use chrono::NaiveDateTime;
use derive_more::derive::{Deref, Display, From, Into};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Into)]
pub struct SlurmUser(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Into)]
pub struct NodeName(pub String);

impl From<&str> for SlurmUser {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<&str> for NodeName {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for SlurmUser {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// squeue `%S`, e.g. `2024-10-14T10:23:45`. Slurm prints local time without an offset.
pub const JOB_START_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// ps `lstart`, e.g. `Mon Oct 14 10:23:45 2024` (day may be space padded, tokens are re-joined
/// with single spaces before parsing)
pub const PROCESS_START_FMT: &str = "%a %b %d %H:%M:%S %Y";

pub fn parse_job_start(input: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(input.trim(), JOB_START_FMT)
}

pub fn parse_process_start(input: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(input, PROCESS_START_FMT)
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use color_eyre::Result;

    use super::*;

    #[test]
    fn parse_job_start__valid() -> Result<()> {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 14)
            .and_then(|d| d.and_hms_opt(10, 23, 45))
            .ok_or_else(|| color_eyre::eyre::eyre!("invalid date"))?;
        assert_eq!(parse_job_start("2024-10-14T10:23:45")?, expected);
        Ok(())
    }

    #[test]
    fn parse_job_start__placeholder() {
        assert!(parse_job_start("N/A").is_err());
        assert!(parse_job_start("").is_err());
    }

    #[test]
    fn parse_process_start__single_digit_day() -> Result<()> {
        let expected = NaiveDate::from_ymd_opt(2024, 10, 7)
            .and_then(|d| d.and_hms_opt(9, 5, 1))
            .ok_or_else(|| color_eyre::eyre::eyre!("invalid date"))?;
        assert_eq!(parse_process_start("Mon Oct 7 09:05:01 2024")?, expected);
        Ok(())
    }

    #[test]
    fn NodeName__borrow_lookup() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(NodeName::from("guppy3"), 3);
        assert_eq!(map.get("guppy3"), Some(&3));
    }
}
