use std::env;
use std::time::Duration;

use crate::section::SectionId;
use crate::source::DataSource;

const DEFAULT_DATA: &str = "data/exports";
const DEFAULT_MEDIA: &str = "web/public";

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub data: DataSource,
    pub media: DataSource,
    pub nav_height: u16,
    pub fetch_parallelism: usize,
    pub http_timeout: Duration,
    pub start_section: Option<SectionId>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            data: DataSource::parse(DEFAULT_DATA),
            media: DataSource::parse(DEFAULT_MEDIA),
            nav_height: 3,
            fetch_parallelism: 6,
            http_timeout: Duration::from_secs(10),
            start_section: None,
        }
    }
}

impl ReportConfig {
    /// Read `.env.local`, `.env` and the process environment.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let data = lookup("REPORT_DATA")
            .filter(|v| !v.trim().is_empty())
            .map(|v| DataSource::parse(v.trim()))
            .unwrap_or(defaults.data);
        let media = lookup("REPORT_MEDIA")
            .filter(|v| !v.trim().is_empty())
            .map(|v| DataSource::parse(v.trim()))
            .unwrap_or(defaults.media);
        let nav_height = lookup("REPORT_NAV_HEIGHT")
            .and_then(|val| val.trim().parse::<u16>().ok())
            .unwrap_or(defaults.nav_height)
            .min(12);
        let fetch_parallelism = lookup("REPORT_FETCH_PARALLELISM")
            .and_then(|val| val.trim().parse::<usize>().ok())
            .unwrap_or(defaults.fetch_parallelism)
            .clamp(2, 32);
        let timeout_secs = lookup("REPORT_HTTP_TIMEOUT_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(defaults.http_timeout.as_secs())
            .clamp(1, 120);
        let start_section = lookup("REPORT_START_SECTION").and_then(|v| SectionId::parse(&v));

        Self {
            data,
            media,
            nav_height,
            fetch_parallelism,
            http_timeout: Duration::from_secs(timeout_secs),
            start_section,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = ReportConfig::from_lookup(|_| None);
        assert_eq!(cfg.nav_height, 3);
        assert_eq!(cfg.fetch_parallelism, 6);
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
        assert!(matches!(cfg.data, DataSource::Dir { .. }));
        assert!(cfg.start_section.is_none());
    }

    #[test]
    fn values_are_clamped_and_garbage_ignored() {
        let cfg = ReportConfig::from_lookup(lookup_from(&[
            ("REPORT_DATA", "http://localhost:8000/data/"),
            ("REPORT_NAV_HEIGHT", "40"),
            ("REPORT_FETCH_PARALLELISM", "1"),
            ("REPORT_HTTP_TIMEOUT_SECS", "soon"),
            ("REPORT_START_SECTION", "pace"),
        ]));
        assert!(matches!(cfg.data, DataSource::Http { .. }));
        assert_eq!(cfg.nav_height, 12);
        assert_eq!(cfg.fetch_parallelism, 2);
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.start_section, Some(SectionId::Pace));
    }
}
