//! Repeated sheet symbols: `Repeat(CH,LO,HI)` markers and the letter
//! suffixes given to each copy.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static REPEAT_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Repeat\(\w+,(\d+),(\d+)\)").unwrap());

/// Number of instances a sheet symbol with display name `name` expands to.
///
/// Names without a marker count once. Only the first marker is considered.
pub fn repetition_count(name: &str) -> Result<u32> {
    let Some(caps) = REPEAT_MARKER.captures(name) else {
        return Ok(1);
    };

    let invalid = |reason: String| Error::InvalidRepetition {
        name: name.to_string(),
        reason,
    };
    let bound = |idx: usize| {
        caps[idx]
            .parse::<u32>()
            .map_err(|_| invalid(format!("bound {} is out of range", &caps[idx])))
    };
    let (lo, hi) = (bound(1)?, bound(2)?);
    if hi < lo {
        return Err(invalid(format!(
            "upper bound {hi} is below lower bound {lo}"
        )));
    }
    (hi - lo)
        .checked_add(1)
        .ok_or_else(|| invalid(format!("range {lo}..={hi} has too many instances")))
}

/// Letter suffix for the `n`th copy (1-based) of a repeated sheet.
///
/// Uses bijective base-26: 1 → `A`, 26 → `Z`, 27 → `AA`, 52 → `AZ`, 53 → `BA`.
pub fn letters_for_repetition(n: u32) -> String {
    let mut n = n;
    let mut letters = Vec::new();
    while n > 0 {
        let unit = (n - 1) % 26;
        letters.push(char::from(b'A' + unit as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Total repetition count per target filename, in first-seen order.
///
/// Several sheet symbols may point at the same file; their counts add up.
pub fn sum_repetitions<'a>(
    refs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<Vec<(String, u32)>> {
    let mut totals: Vec<(String, u32)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for (filename, name) in refs {
        let count = repetition_count(name)?;
        match positions.get(filename) {
            Some(&idx) => {
                let (_, total) = &mut totals[idx];
                *total = total.checked_add(count).ok_or_else(|| Error::InvalidRepetition {
                    name: name.to_string(),
                    reason: format!("instances of {filename} exceed {}", u32::MAX),
                })?;
            }
            None => {
                positions.insert(filename, totals.len());
                totals.push((filename.to_string(), count));
            }
        }
    }

    Ok(totals)
}
