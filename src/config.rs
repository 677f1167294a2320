use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::client::{ClientConfig, DEFAULT_API_BASE_URL, DEFAULT_MAX_RESULTS};

#[derive(Debug, Default, PartialEq)]
struct RcConfig {
    url: Option<String>,
    verify: Option<bool>,
    max_results: Option<usize>,
}

pub(crate) fn load_config(url: Option<String>, verify: Option<bool>) -> Result<ClientConfig> {
    load_config_with(url, verify, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with environment lookups going through `env`.
fn load_config_with(
    url: Option<String>,
    verify: Option<bool>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig> {
    let url = url.or_else(|| env("DBNOMICS_API_URL"));

    let mut rc = RcConfig::default();
    for rc_path in rc_candidates(&env) {
        if rc_path.exists() {
            rc = read_rc(&rc_path).with_context(|| {
                format!("failed to read configuration file {}", rc_path.display())
            })?;
            break;
        }
    }

    Ok(resolve(url, verify, rc))
}

fn resolve(url: Option<String>, verify: Option<bool>, rc: RcConfig) -> ClientConfig {
    let url = url
        .or(rc.url)
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

    ClientConfig {
        url: url.trim_end_matches('/').to_string(),
        verify: verify.or(rc.verify).unwrap_or(true),
        default_max_results: rc.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        api_version_range: None,
    }
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    parse_rc(&text)
}

fn parse_rc(text: &str) -> Result<RcConfig> {
    let mut cfg = RcConfig::default();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once(':') else {
            bail!("line {}: expected `key: value`", lineno + 1);
        };
        let v = strip_quotes(v.trim());
        if v.is_empty() {
            continue;
        }
        match k.trim() {
            "url" => cfg.url = Some(v.to_string()),
            "verify" => cfg.verify = Some(v != "0"),
            "max_results" => {
                let max: usize = v
                    .parse()
                    .with_context(|| format!("line {}: invalid max_results {v:?}", lineno + 1))?;
                if max == 0 {
                    bail!("line {}: max_results must be at least 1", lineno + 1);
                }
                cfg.max_results = Some(max);
            }
            _ => {}
        }
    }

    Ok(cfg)
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates(env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    // 1) DBNOMICS_RC (explicit)
    // 2) ./.dbnomicsrc
    // 3) ~/.dbnomicsrc
    if let Some(p) = env("DBNOMICS_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".dbnomicsrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".dbnomicsrc"));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_rc_file() {
        let cfg = parse_rc(
            "# local mirror\n\
             url: \"https://api.dev.db.nomics.world/v22/\"\n\
             verify: 0\n\
             max_results: 200\n\
             unknown: ignored\n",
        )
        .unwrap();
        assert_eq!(
            cfg,
            RcConfig {
                url: Some("https://api.dev.db.nomics.world/v22/".to_string()),
                verify: Some(false),
                max_results: Some(200),
            }
        );
    }

    #[test]
    fn rejects_bad_max_results() {
        assert!(parse_rc("max_results: lots").is_err());
        assert!(parse_rc("max_results: 0").is_err());
        assert!(parse_rc("just some text").is_err());
    }

    #[test]
    fn explicit_values_win_over_rc() {
        let rc = RcConfig {
            url: Some("https://rc/v22".to_string()),
            verify: Some(false),
            max_results: Some(10),
        };
        let cfg = resolve(Some("https://explicit/v22/".to_string()), Some(true), rc);
        assert_eq!(cfg.url, "https://explicit/v22");
        assert!(cfg.verify);
        assert_eq!(cfg.default_max_results, 10);
    }

    #[test]
    fn env_url_wins_over_rc_named_by_env() {
        let mut rc = tempfile::NamedTempFile::new().unwrap();
        writeln!(rc, "url: https://rc.example/v22\nmax_results: 75").unwrap();
        let rc_path = rc.path().to_string_lossy().into_owned();

        let cfg = load_config_with(None, None, |key| match key {
            "DBNOMICS_API_URL" => Some("https://env.example/v22/".to_string()),
            "DBNOMICS_RC" => Some(rc_path.clone()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.url, "https://env.example/v22");
        assert_eq!(cfg.default_max_results, 75);

        let cfg = load_config_with(None, None, |key| {
            (key == "DBNOMICS_RC").then(|| rc_path.clone())
        })
        .unwrap();
        assert_eq!(cfg.url, "https://rc.example/v22");
    }

    #[test]
    fn invalid_rc_named_by_env_is_an_error() {
        let mut rc = tempfile::NamedTempFile::new().unwrap();
        writeln!(rc, "max_results: 0").unwrap();
        let rc_path = rc.path().to_string_lossy().into_owned();
        let err = load_config_with(None, None, |key| {
            (key == "DBNOMICS_RC").then(|| rc_path.clone())
        })
        .unwrap_err();
        assert!(err.to_string().contains("failed to read configuration file"));
    }

    #[test]
    fn defaults_without_any_source() {
        let cfg = resolve(None, None, RcConfig::default());
        assert_eq!(cfg.url, DEFAULT_API_BASE_URL);
        assert!(cfg.verify);
        assert_eq!(cfg.default_max_results, DEFAULT_MAX_RESULTS);
        assert!(cfg.api_version_range.is_none());
    }
}
