use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::ConfigError;

/// One positional pairing of the three seed inputs.
#[derive(Debug, Clone)]
pub struct SeedTriple {
    pub private_key: String,
    pub proxy: Option<String>,
    pub deposit_address: Option<String>,
}

/// Reads a line-oriented seed file, trimming whitespace and skipping blank
/// lines and `#` comments.
pub fn read_lines(path: &str) -> Result<Vec<String>> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(ConfigError::FileNotFound {
            path: path.to_string(),
        }
        .into());
    }

    let content = fs::read_to_string(p).map_err(|e| ConfigError::IoError {
        path: path.to_string(),
        msg: e.to_string(),
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Pairs keys, proxies and deposit addresses by line position.
///
/// Short proxy/deposit lists are padded with `None`. In mobile-proxy mode the
/// proxy list is cycled to cover every key (typically a single rotating
/// endpoint shared by all wallets). Positions without a private key cannot
/// form a record and are skipped with a warning.
pub fn pair_seed_inputs(
    private_keys: Vec<String>,
    proxies: Vec<String>,
    deposit_addresses: Vec<String>,
    replicate_proxies: bool,
) -> Vec<SeedTriple> {
    let proxies: Vec<String> = if replicate_proxies && !proxies.is_empty() {
        proxies
            .iter()
            .cycle()
            .take(private_keys.len())
            .cloned()
            .collect()
    } else {
        proxies
    };

    let rows = private_keys
        .len()
        .max(proxies.len())
        .max(deposit_addresses.len());

    let mut triples = Vec::with_capacity(private_keys.len());

    for i in 0..rows {
        let Some(key) = private_keys.get(i) else {
            warn!(
                "[store] Seed line {} has a proxy or deposit address but no private key, skipping",
                i + 1
            );
            continue;
        };

        triples.push(SeedTriple {
            private_key: key.clone(),
            proxy: proxies.get(i).cloned(),
            deposit_address: deposit_addresses.get(i).cloned(),
        });
    }

    triples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("0xkey{}", i)).collect()
    }

    #[test]
    fn test_short_lists_padded_with_none() {
        let triples = pair_seed_inputs(keys(3), vec!["p1".into()], vec![], false);
        assert_eq!(triples.len(), 3);
        assert_eq!(triples[0].proxy.as_deref(), Some("p1"));
        assert!(triples[1].proxy.is_none());
        assert!(triples[2].deposit_address.is_none());
    }

    #[test]
    fn test_mobile_mode_cycles_proxies() {
        let triples = pair_seed_inputs(keys(3), vec!["mob".into()], vec![], true);
        assert!(triples.iter().all(|t| t.proxy.as_deref() == Some("mob")));
    }

    #[test]
    fn test_rows_without_keys_are_skipped() {
        let triples = pair_seed_inputs(keys(1), vec!["p1".into(), "p2".into()], vec![], false);
        assert_eq!(triples.len(), 1);
    }

    #[test]
    fn test_read_lines_missing_file_errors() {
        assert!(read_lines("does/not/exist.txt").is_err());
    }

    #[test]
    fn test_read_lines_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.txt");
        std::fs::write(&path, "0xaa\n\n# comment\n  0xbb  \n").unwrap();
        let lines = read_lines(path.to_str().unwrap()).unwrap();
        assert_eq!(lines, vec!["0xaa".to_string(), "0xbb".to_string()]);
    }
}
