use std::collections::HashMap;

use crate::cancel::{Scope, ScopeToken};
use crate::section::SectionId;
use crate::views::Spotlight;

pub const MEDIA_EXTENSIONS: [&str; 4] = ["webp", "png", "jpg", "jpeg"];

const DRIVER_SLUGS: &[(&str, &str)] = &[
    ("VER", "max-verstappen"),
    ("TSU", "yuki-tsunoda"),
    ("NOR", "lando-norris"),
    ("PIA", "oscar-piastri"),
    ("LEC", "charles-leclerc"),
    ("HAM", "lewis-hamilton"),
    ("RUS", "george-russell"),
    ("ANT", "andrea-kimi-antonelli"),
    ("ALO", "fernando-alonso"),
    ("STR", "lance-stroll"),
    ("GAS", "pierre-gasly"),
    ("DOO", "jack-doohan"),
    ("COL", "franco-colapinto"),
    ("OCO", "esteban-ocon"),
    ("BEA", "oliver-bearman"),
    ("LAW", "liam-lawson"),
    ("HAD", "isack-hadjar"),
    ("ALB", "alexander-albon"),
    ("SAI", "carlos-sainz"),
    ("HUL", "nico-hulkenberg"),
    ("BOR", "gabriel-bortoleto"),
];

const TEAM_SLUGS: &[(&str, &str)] = &[
    ("Red Bull Racing", "red-bull"),
    ("Red Bull", "red-bull"),
    ("McLaren", "mclaren"),
    ("Ferrari", "ferrari"),
    ("Mercedes", "mercedes"),
    ("Aston Martin", "aston-martin"),
    ("Alpine", "alpine"),
    ("Haas F1 Team", "haas"),
    ("Haas", "haas"),
    ("Racing Bulls", "racing-bulls"),
    ("RB", "racing-bulls"),
    ("Williams", "williams"),
    ("Kick Sauber", "sauber"),
    ("Sauber", "sauber"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Drivers,
    Teams,
    Cars,
}

impl MediaCategory {
    pub fn dir(self) -> &'static str {
        match self {
            MediaCategory::Drivers => "drivers",
            MediaCategory::Teams => "teams",
            MediaCategory::Cars => "cars",
        }
    }
}

/// Lowercase, non-alphanumerics to `-`, no leading/trailing/double dashes.
pub fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

pub fn driver_slug(code: &str) -> String {
    let code = code.trim();
    DRIVER_SLUGS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, slug)| slug.to_string())
        .unwrap_or_else(|| slugify(code))
}

pub fn team_slug(team: &str) -> String {
    let team = team.trim();
    TEAM_SLUGS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(team))
        .map(|(_, slug)| slug.to_string())
        .unwrap_or_else(|| slugify(team))
}

/// `/media/{category}/{slug}.{ext}` for every supported extension, most preferred first.
pub fn candidates(category: MediaCategory, slug: &str) -> Vec<String> {
    if slug.is_empty() {
        return Vec::new();
    }
    MEDIA_EXTENSIONS
        .iter()
        .map(|ext| format!("/media/{}/{slug}.{ext}", category.dir()))
        .collect()
}

pub fn driver_label(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn team_label(team: &str) -> String {
    team.split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(3)
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Unresolved,
    Cancelled,
}

/// Try `candidates` in order and return the first that loads.
///
/// The token is checked before every attempt and once more before returning a
/// hit, so a superseded request never reports a result.
pub fn resolve_candidates(
    candidates: &[String],
    token: &ScopeToken,
    mut loads: impl FnMut(&str) -> bool,
) -> Resolution {
    for candidate in candidates {
        if !token.is_live() {
            return Resolution::Cancelled;
        }
        if loads(candidate) {
            if !token.is_live() {
                return Resolution::Cancelled;
            }
            return Resolution::Resolved(candidate.clone());
        }
    }
    if token.is_live() {
        Resolution::Unresolved
    } else {
        Resolution::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaSlot {
    DriverPortrait,
    TeamLogo,
    Car,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaKey {
    pub section: SectionId,
    pub slot: MediaSlot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub key: MediaKey,
    pub candidates: Vec<String>,
    pub fallback: String,
}

/// Media a chapter wants for its current spotlight.
pub fn requests_for(section: SectionId, spotlight: &Spotlight) -> Vec<MediaRequest> {
    let mut out = Vec::new();
    if let Some(driver) = spotlight.driver.as_deref() {
        out.push(MediaRequest {
            key: MediaKey {
                section,
                slot: MediaSlot::DriverPortrait,
            },
            candidates: candidates(MediaCategory::Drivers, &driver_slug(driver)),
            fallback: driver_label(driver),
        });
    }
    if let Some(team) = spotlight.team.as_deref() {
        let slug = team_slug(team);
        out.push(MediaRequest {
            key: MediaKey {
                section,
                slot: MediaSlot::TeamLogo,
            },
            candidates: candidates(MediaCategory::Teams, &slug),
            fallback: team_label(team),
        });
        out.push(MediaRequest {
            key: MediaKey {
                section,
                slot: MediaSlot::Car,
            },
            candidates: candidates(MediaCategory::Cars, &slug),
            fallback: team_label(team),
        });
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResolution {
    pub candidates: Vec<String>,
    pub resolved: Option<String>,
    pub resolving: bool,
    pub fallback: String,
}

impl MediaResolution {
    /// What to show: the resolved path, or the fallback label once probing is over.
    pub fn display(&self) -> Option<&str> {
        match (&self.resolved, self.resolving) {
            (Some(url), _) => Some(url.as_str()),
            (None, false) => Some(self.fallback.as_str()),
            (None, true) => None,
        }
    }
}

#[derive(Debug)]
struct MediaEntry {
    resolution: MediaResolution,
    scope: Scope,
}

/// Independent resolutions per slot; each slot owns its own cancellation scope.
#[derive(Debug, Default)]
pub struct MediaBoard {
    entries: HashMap<MediaKey, MediaEntry>,
}

impl MediaBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or keep) a resolution for `request`. Returns a token when probing
    /// has to be issued; identical candidates keep the current resolution.
    pub fn request(&mut self, request: &MediaRequest) -> Option<ScopeToken> {
        if let Some(entry) = self.entries.get(&request.key)
            && entry.resolution.candidates == request.candidates
        {
            return None;
        }
        let entry = self.entries.entry(request.key).or_insert_with(|| MediaEntry {
            resolution: MediaResolution {
                candidates: Vec::new(),
                resolved: None,
                resolving: false,
                fallback: String::new(),
            },
            scope: Scope::new(),
        });
        let token = entry.scope.issue();
        entry.resolution = MediaResolution {
            candidates: request.candidates.clone(),
            resolved: None,
            resolving: !request.candidates.is_empty(),
            fallback: request.fallback.clone(),
        };
        if request.candidates.is_empty() {
            return None;
        }
        Some(token)
    }

    /// Commit a finished lookup. Stale tokens are ignored.
    pub fn commit(&mut self, key: MediaKey, token: &ScopeToken, resolution: Resolution) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        if !entry.scope.owns(token) || !token.is_live() {
            return false;
        }
        match resolution {
            Resolution::Resolved(url) => {
                entry.resolution.resolved = Some(url);
                entry.resolution.resolving = false;
            }
            Resolution::Unresolved => {
                entry.resolution.resolved = None;
                entry.resolution.resolving = false;
            }
            Resolution::Cancelled => return false,
        }
        true
    }

    pub fn get(&self, key: &MediaKey) -> Option<&MediaResolution> {
        self.entries.get(key).map(|e| &e.resolution)
    }

    /// Drop a slot (its spotlight went away), cancelling any lookup in flight.
    pub fn remove(&mut self, key: &MediaKey) {
        if let Some(entry) = self.entries.remove(key) {
            entry.scope.cancel();
        }
    }

    pub fn keys_for(&self, section: SectionId) -> Vec<MediaKey> {
        self.entries
            .keys()
            .filter(|k| k.section == section)
            .copied()
            .collect()
    }

    pub fn cancel_all(&mut self) {
        for entry in self.entries.values() {
            entry.scope.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("  Visa Cash App RB "), "visa-cash-app-rb");
        assert_eq!(slugify("Kick--Sauber!"), "kick-sauber");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn lookup_then_fallback() {
        assert_eq!(driver_slug("nor"), "lando-norris");
        assert_eq!(driver_slug("XYZ"), "xyz");
        assert_eq!(team_slug("Red Bull Racing"), "red-bull");
        assert_eq!(team_slug("Cadillac F1"), "cadillac-f1");
    }

    #[test]
    fn candidate_order_follows_extension_preference() {
        let list = candidates(MediaCategory::Cars, "ferrari");
        assert_eq!(
            list,
            vec![
                "/media/cars/ferrari.webp",
                "/media/cars/ferrari.png",
                "/media/cars/ferrari.jpg",
                "/media/cars/ferrari.jpeg",
            ]
        );
        assert!(candidates(MediaCategory::Cars, "").is_empty());
    }

    #[test]
    fn labels_are_deterministic() {
        assert_eq!(driver_label("ver"), "VER");
        assert_eq!(team_label("Aston Martin"), "AM");
        assert_eq!(team_label("Haas F1 Team"), "HFT");
    }
}
