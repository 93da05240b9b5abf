//! Slurm hostlist expressions, e.g. `guppy[0-3,5]`.

use itertools::Itertools as _;

/// Largest number of names a single `start-end` range may produce.
const MAX_RANGE_LEN: u64 = 10_000;

/// Expand a single hostlist token: a prefix, optionally followed by `[...]` holding a comma
/// separated list of integers and inclusive `start-end` ranges.
///
/// Anything malformed (unbalanced or nested brackets, text after `]`, non numeric entries,
/// reversed or oversized ranges) is returned unchanged as one literal name. Zero padding of the range
/// start is kept, so `node[01-03]` gives `node01`, `node02`, `node03`.
pub fn expand(token: &str) -> Vec<String> {
    try_expand(token).unwrap_or_else(|| vec![token.to_owned()])
}

fn try_expand(token: &str) -> Option<Vec<String>> {
    let Some((prefix, rest)) = token.split_once('[') else {
        return (!token.contains(']')).then(|| vec![token.to_owned()]);
    };
    let ranges = rest.strip_suffix(']')?;
    if prefix.contains(']') || ranges.contains(['[', ']']) {
        return None;
    }

    let mut names = Vec::new();
    for part in ranges.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let (first, last): (u64, u64) = (start.parse().ok()?, end.parse().ok()?);
                if first > last || last - first >= MAX_RANGE_LEN {
                    return None;
                }
                let width = start.len();
                names.extend((first..=last).map(|i| format!("{prefix}{i:0width$}")));
            }
            None => {
                part.parse::<u64>().ok()?;
                names.push(format!("{prefix}{part}"));
            }
        }
    }
    Some(names)
}

/// Expand a whole hostlist column, which may hold several tokens separated by commas outside
/// of brackets (`guppy[1-2],carp7`).
pub fn expand_list(list: &str) -> Vec<String> {
    split_top_level(list)
        .into_iter()
        .filter(|token| !token.is_empty())
        .flat_map(expand)
        .collect_vec()
}

fn split_top_level(list: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                tokens.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    tokens.push(&list[start..]);
    tokens
}
