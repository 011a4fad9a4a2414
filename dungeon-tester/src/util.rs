use anyhow::{Result, bail};
use std::collections::HashSet;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse `--seeds` tokens. Accepts decimal or `0x`-prefixed hex; an empty
/// list falls back to the default seed.
pub fn resolve_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::with_capacity(tokens.len());
    for token in tokens {
        let parsed = match token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => token.parse::<u64>().ok(),
        };
        match parsed {
            Some(seed) => seeds.push(seed),
            None => bail!("Invalid seed: {token}"),
        }
    }
    if seeds.is_empty() {
        seeds.push(1337);
    }
    let mut seen = HashSet::new();
    seeds.retain(|seed| seen.insert(*seed));
    Ok(seeds)
}
