//! Stuck-state detection — spotting an agent that is going in circles.
//!
//! The detector watches the assistant's step outputs. Each one is reduced to
//! a pattern: lowercased, numbers masked to `NUM`, quoted values masked to
//! `VALUE`, whitespace collapsed. A sliding window of recent patterns is
//! compared to the newest one with Sørensen–Dice similarity over word
//! bigrams. Enough near-duplicates in the window means the agent is stuck.
//!
//! The detector fires once per stuck episode: after signalling, it stays
//! quiet until a genuinely different response resets it.

use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""[^"]*"|'[^']*'"#).unwrap());

pub struct StuckDetector {
    window: usize,
    similarity_cutoff: f64,
    duplicate_threshold: usize,
    recent: VecDeque<String>,
    fired: bool,
}

impl StuckDetector {
    pub fn new(window: usize, similarity_cutoff: f64, duplicate_threshold: usize) -> Self {
        Self {
            window,
            similarity_cutoff,
            duplicate_threshold,
            recent: VecDeque::with_capacity(window),
            fired: false,
        }
    }

    pub fn from_config(config: &openmanus_config::StuckConfig) -> Self {
        Self::new(
            config.window,
            config.similarity_cutoff,
            config.duplicate_threshold,
        )
    }

    /// Feed one assistant response into the detector.
    ///
    /// Returns true when the loop should nudge the model onto a new path.
    pub fn observe(&mut self, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }

        let pattern = normalize(content);
        let duplicates = self
            .recent
            .iter()
            .filter(|p| similarity(p, &pattern) >= self.similarity_cutoff)
            .count();

        self.recent.push_back(pattern);
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }

        if duplicates >= self.duplicate_threshold {
            if self.fired {
                return false;
            }
            self.fired = true;
            true
        } else {
            self.fired = false;
            false
        }
    }
}

/// Reduce content to a comparable pattern: case, specific numbers, and
/// quoted values do not count as "different".
fn normalize(content: &str) -> String {
    let lowered = content.to_lowercase();
    let masked = QUOTED.replace_all(&lowered, "VALUE");
    let masked = DIGITS.replace_all(&masked, "NUM");
    masked.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sørensen–Dice coefficient over word bigrams.
///
/// 1.0 = identical, 0.0 = no shared bigrams. Patterns too short to form a
/// bigram fall back to exact equality.
fn similarity(a: &str, b: &str) -> f64 {
    let bigrams_a = word_bigrams(a);
    let bigrams_b = word_bigrams(b);

    if bigrams_a.is_empty() || bigrams_b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }

    let shared = bigrams_a.intersection(&bigrams_b).count();
    (2.0 * shared as f64) / (bigrams_a.len() + bigrams_b.len()) as f64
}

fn word_bigrams(s: &str) -> HashSet<(&str, &str)> {
    let words: Vec<&str> = s.split_whitespace().collect();
    words.windows(2).map(|w| (w[0], w[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> StuckDetector {
        StuckDetector::new(3, 0.9, 1)
    }

    #[test]
    fn normalize_masks_specifics() {
        assert_eq!(
            normalize("How many results?  I found 42 items."),
            normalize("How many results? I found 7 items.")
        );
        assert_eq!(
            normalize(r#"Please specify "London" as the city"#),
            normalize(r#"Please specify "Paris" as the city"#)
        );
    }

    #[test]
    fn similarity_of_identical_text_is_one() {
        let a = normalize("searching the web for rust tutorials");
        assert!((similarity(&a, &a) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn similarity_of_unrelated_text_is_low() {
        let a = normalize("searching the web for rust tutorials");
        let b = normalize("saving the report to disk now");
        assert!(similarity(&a, &b) < 0.2);
    }

    #[test]
    fn fires_on_second_consecutive_duplicate() {
        let mut d = detector();
        assert!(!d.observe("Which city do you want weather for?"));
        // One near-duplicate already in the window trips it.
        assert!(d.observe("Which city do you want weather for?"));
    }

    #[test]
    fn default_config_fires_after_two_consecutive_duplicates() {
        let mut d = StuckDetector::from_config(&openmanus_config::StuckConfig::default());
        assert!(!d.observe("Shall I proceed with the download?"));
        assert!(d.observe("Shall I proceed with the download?"));
        // Still looping: the episode already fired.
        assert!(!d.observe("Shall I proceed with the download?"));
    }

    #[test]
    fn fires_once_per_episode() {
        let mut d = detector();
        d.observe("same thing again");
        assert!(d.observe("same thing again"));
        // Stays quiet until the pattern breaks.
        assert!(!d.observe("same thing again"));
        assert!(!d.observe("same thing again"));
    }

    #[test]
    fn resets_on_different_content() {
        let mut d = detector();
        d.observe("question A repeated here?");
        assert!(d.observe("question A repeated here?"));
        assert!(!d.observe("now doing something totally unrelated with files"));
        // A fresh episode can fire again.
        d.observe("question B comes up next?");
        assert!(d.observe("question B comes up next?"));
    }

    #[test]
    fn masked_variants_count_as_duplicates() {
        let mut d = detector();
        assert!(!d.observe("Found 10 results, should I fetch page 2?"));
        assert!(d.observe("Found 25 results, should I fetch page 3?"));
    }

    #[test]
    fn empty_content_is_ignored() {
        let mut d = detector();
        assert!(!d.observe(""));
        assert!(!d.observe("   "));
    }
}
