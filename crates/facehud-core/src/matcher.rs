//! Descriptor matching against the reference gallery.

use crate::gallery::Gallery;
use crate::types::Descriptor;

/// Default euclidean acceptance threshold: a best match further away than
/// this renders as unknown.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.6;

/// Distance reported when the gallery is empty and there is nothing to
/// compare against.
const EMPTY_GALLERY_DISTANCE: f32 = 1.0;

/// Label side of a match: a known gallery identity or the unknown sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchLabel {
    Known(String),
    Unknown,
}

/// Outcome of comparing one live descriptor against the whole gallery.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub label: MatchLabel,
    /// Euclidean distance to the nearest reference descriptor.
    pub distance: f32,
}

impl MatchOutcome {
    pub fn is_known(&self) -> bool {
        matches!(self.label, MatchLabel::Known(_))
    }
}

impl std::fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            MatchLabel::Known(label) => write!(f, "{label} ({:.2})", self.distance),
            MatchLabel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Strategy for resolving a probe descriptor to a gallery identity.
pub trait Matcher {
    fn find_best(&self, probe: &Descriptor, gallery: &Gallery) -> MatchOutcome;
}

/// Nearest-neighbor matcher over euclidean distance with a fixed acceptance
/// threshold. Every entry and every descriptor is compared; the minimum
/// distance wins.
pub struct NearestMatcher {
    threshold: f32,
}

impl NearestMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for NearestMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl Matcher for NearestMatcher {
    fn find_best(&self, probe: &Descriptor, gallery: &Gallery) -> MatchOutcome {
        let mut best: Option<(&str, f32)> = None;

        for entry in gallery.entries() {
            for reference in &entry.descriptors {
                let dist = probe.distance(reference);
                let better = match best {
                    None => true,
                    Some((_, d)) => dist < d,
                };
                if better {
                    best = Some((&entry.label, dist));
                }
            }
        }

        match best {
            Some((label, distance)) if distance <= self.threshold => MatchOutcome {
                label: MatchLabel::Known(label.to_string()),
                distance,
            },
            Some((_, distance)) => MatchOutcome {
                label: MatchLabel::Unknown,
                distance,
            },
            None => MatchOutcome {
                label: MatchLabel::Unknown,
                distance: EMPTY_GALLERY_DISTANCE,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery::Gallery;

    fn gallery_of(entries: &[(&str, Vec<f32>)]) -> Gallery {
        let mut gallery = Gallery::default();
        for (label, values) in entries {
            gallery.push_descriptor(label, Descriptor { values: values.clone() });
        }
        gallery
    }

    #[test]
    fn test_exact_match_at_zero_distance() {
        let gallery = gallery_of(&[("A", vec![0.2, 0.4, 0.6])]);
        let probe = Descriptor { values: vec![0.2, 0.4, 0.6] };

        let outcome = NearestMatcher::default().find_best(&probe, &gallery);
        assert_eq!(outcome.label, MatchLabel::Known("A".into()));
        assert_eq!(outcome.distance, 0.0);
    }

    #[test]
    fn test_far_probe_is_unknown() {
        let gallery = gallery_of(&[("A", vec![0.0, 0.0, 0.0])]);
        let probe = Descriptor { values: vec![10.0, 10.0, 10.0] };

        let outcome = NearestMatcher::default().find_best(&probe, &gallery);
        assert_eq!(outcome.label, MatchLabel::Unknown);
        assert!(outcome.distance > DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn test_nearest_of_several_wins() {
        let gallery = gallery_of(&[
            ("far", vec![1.0, 0.0]),
            ("near", vec![0.1, 0.0]),
        ]);
        let probe = Descriptor { values: vec![0.0, 0.0] };

        let outcome = NearestMatcher::default().find_best(&probe, &gallery);
        assert_eq!(outcome.label, MatchLabel::Known("near".into()));
    }

    #[test]
    fn test_multiple_descriptors_per_entry() {
        let mut gallery = Gallery::default();
        gallery.push_descriptor("A", Descriptor { values: vec![5.0, 5.0] });
        gallery.push_descriptor("A", Descriptor { values: vec![0.05, 0.0] });

        let probe = Descriptor { values: vec![0.0, 0.0] };
        let outcome = NearestMatcher::default().find_best(&probe, &gallery);
        assert_eq!(outcome.label, MatchLabel::Known("A".into()));
        assert!(outcome.distance < 0.1);
    }

    #[test]
    fn test_empty_gallery_is_unknown() {
        let gallery = Gallery::default();
        let probe = Descriptor { values: vec![0.0; 4] };

        let outcome = NearestMatcher::default().find_best(&probe, &gallery);
        assert_eq!(outcome.label, MatchLabel::Unknown);
        assert_eq!(outcome.distance, 1.0);
    }

    #[test]
    fn test_boundary_distance_still_matches() {
        // A best distance exactly at the threshold is accepted.
        let gallery = gallery_of(&[("edge", vec![DEFAULT_MATCH_THRESHOLD, 0.0])]);
        let probe = Descriptor { values: vec![0.0, 0.0] };

        let outcome = NearestMatcher::default().find_best(&probe, &gallery);
        assert_eq!(outcome.label, MatchLabel::Known("edge".into()));
    }

    #[test]
    fn test_display_forms() {
        let known = MatchOutcome { label: MatchLabel::Known("ada".into()), distance: 0.25 };
        assert_eq!(known.to_string(), "ada (0.25)");

        let unknown = MatchOutcome { label: MatchLabel::Unknown, distance: 0.9 };
        assert_eq!(unknown.to_string(), "unknown");
    }
}
