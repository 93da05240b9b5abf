//! Interactive shells started through `srun --pty`, as seen in the head node's process list.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::NaiveDateTime;
use itertools::Itertools as _;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::slurm::{parse_process_start, SlurmUser};

/// `ps` is asked for `user,lstart,args`; `lstart` is always five tokens.
const LSTART_TOKENS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    pub user: SlurmUser,
    pub started: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionParseError {
    #[error("expected a user and 5 start time tokens, got {0} tokens")]
    TooShort(usize),
    #[error("invalid process start time `{input}`")]
    StartTime {
        input: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl FromStr for Session {
    type Err = SessionParseError;

    /// `alice  Mon Oct 14 10:23:45 2024 srun --pty bash`, the command itself is ignored.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens = line.split_whitespace().collect_vec();
        let [user, rest @ ..] = tokens.as_slice() else {
            return Err(SessionParseError::TooShort(0));
        };
        if rest.len() < LSTART_TOKENS {
            return Err(SessionParseError::TooShort(tokens.len()));
        }

        let input = rest[..LSTART_TOKENS].join(" ");
        let started = parse_process_start(&input)
            .map_err(|source| SessionParseError::StartTime { input, source })?;
        Ok(Self {
            user: SlurmUser::from(*user),
            started,
        })
    }
}

/// The ps query for a grep pattern selecting interactive job steps.
pub fn command(filter: &str) -> String {
    format!("ps -eo user:32,lstart,args --no-headers | grep \"{filter}\"")
}

#[instrument(skip_all)]
pub fn parse_sessions<I>(lines: I) -> HashSet<Session>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let sessions: HashSet<Session> = lines
        .into_iter()
        .filter(|line| !line.as_ref().trim().is_empty())
        .filter_map(|line| {
            line.as_ref()
                .parse()
                .map_err(|e| warn!(line = line.as_ref(), "skipping process line: {e}"))
                .ok()
        })
        .collect();
    info!(sessions = sessions.len(), "found interactive sessions");
    sessions
}
