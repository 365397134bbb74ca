//! Lexicon-based sentiment scoring.
//!
//! Every token found in the lexicon contributes an assessment of
//! `(polarity, subjectivity)`. Intensifiers scale the next assessment,
//! negations flip and dampen it, and the text score is the mean of all
//! assessments. Text without any assessment scores `(0.0, 0.0)`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Sentiment scores of one text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// Negative to positive, in `[-1.0, 1.0]`.
    pub polarity: f64,
    /// Objective to subjective, in `[0.0, 1.0]`.
    pub subjectivity: f64,
}

/// Anything able to score a text.
pub trait SentimentScorer {
    fn score(&self, text: &str) -> Sentiment;
}

/// Polarity multiplier applied to a negated assessment.
const NEGATION_FACTOR: f64 = -0.5;
/// Extra polarity emphasis per exclamation mark, up to [`MAX_EXCLAMATIONS`].
const EXCLAMATION_BOOST: f64 = 0.1;
const MAX_EXCLAMATIONS: usize = 3;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[:;=]-?[()dDpP]|<3|!|[A-Za-z]+(?:['’][A-Za-z]+)?").expect("valid token regex")
});

#[rustfmt::skip]
static LEXICON: Lazy<HashMap<&'static str, (f64, f64)>> = Lazy::new(|| {
    HashMap::from([
        // positive
        ("good", (0.7, 0.6)), ("great", (0.8, 0.75)), ("excellent", (1.0, 1.0)),
        ("amazing", (0.6, 0.9)), ("awesome", (1.0, 1.0)), ("love", (0.5, 0.6)),
        ("loved", (0.7, 0.8)), ("nice", (0.6, 1.0)), ("happy", (0.8, 1.0)),
        ("best", (1.0, 0.3)), ("better", (0.5, 0.5)), ("wonderful", (1.0, 1.0)),
        ("fantastic", (0.4, 0.9)), ("beautiful", (0.85, 1.0)), ("perfect", (1.0, 1.0)),
        ("brilliant", (0.9, 1.0)), ("cool", (0.35, 0.65)), ("fun", (0.3, 0.2)),
        ("interesting", (0.5, 0.5)), ("glad", (0.5, 1.0)), ("thanks", (0.2, 0.2)),
        ("smart", (0.21, 0.64)), ("right", (0.29, 0.54)), ("true", (0.35, 0.65)),
        ("funny", (0.25, 1.0)), ("kind", (0.6, 0.9)), ("lovely", (0.5, 0.75)),
        ("excited", (0.375, 0.75)), ("exciting", (0.3, 0.8)), ("impressive", (1.0, 1.0)),
        ("useful", (0.3, 0.0)), ("important", (0.4, 1.0)), ("fine", (0.42, 0.5)),
        ("positive", (0.23, 0.55)), ("helpful", (0.5, 0.5)), ("brave", (0.8, 1.0)),
        ("clever", (0.5, 0.75)), ("sweet", (0.35, 0.65)), ("congrats", (0.5, 0.5)),
        // negative
        ("bad", (-0.7, 0.67)), ("terrible", (-1.0, 1.0)), ("awful", (-1.0, 1.0)),
        ("horrible", (-1.0, 1.0)), ("worst", (-1.0, 1.0)), ("worse", (-0.4, 0.6)),
        ("stupid", (-0.8, 1.0)), ("idiot", (-0.8, 0.8)), ("idiots", (-0.8, 0.8)),
        ("dumb", (-0.375, 0.5)), ("hate", (-0.8, 0.9)), ("wrong", (-0.5, 0.9)),
        ("sad", (-0.5, 1.0)), ("angry", (-0.5, 1.0)), ("ugly", (-0.7, 1.0)),
        ("pathetic", (-1.0, 1.0)), ("ridiculous", (-0.33, 1.0)), ("disgusting", (-1.0, 1.0)),
        ("boring", (-1.0, 1.0)), ("annoying", (-0.8, 0.9)), ("useless", (-0.5, 0.2)),
        ("crazy", (-0.6, 0.9)), ("poor", (-0.4, 0.6)), ("fake", (-0.5, 1.0)),
        ("liar", (-0.8, 0.9)), ("shameful", (-0.8, 0.9)), ("evil", (-1.0, 1.0)),
        ("sick", (-0.71, 0.86)), ("insane", (-1.0, 1.0)), ("nasty", (-1.0, 1.0)),
        ("lame", (-0.5, 0.75)), ("sucks", (-0.3, 0.3)), ("disappointing", (-0.6, 0.7)),
        ("embarrassing", (-0.6, 0.8)), ("incompetent", (-0.5, 0.8)), ("ignorant", (-0.5, 0.75)),
        ("clueless", (-0.5, 0.7)), ("toxic", (-0.6, 0.8)), ("garbage", (-0.6, 0.8)),
        ("trash", (-0.6, 0.8)), ("moron", (-0.8, 0.9)), ("loser", (-0.6, 0.8)),
        ("dishonest", (-0.6, 0.9)), ("hypocrite", (-0.7, 0.9)), ("absurd", (-0.5, 0.9)),
        // emoticons
        (":)", (0.5, 1.0)), (":-)", (0.5, 1.0)), (":d", (1.0, 1.0)), (":-d", (1.0, 1.0)),
        (";)", (0.25, 1.0)), ("<3", (0.5, 1.0)), (":(", (-0.75, 1.0)), (":-(", (-0.75, 1.0)),
    ])
});

static INTENSIFIERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("very", 1.3),
        ("really", 1.3),
        ("extremely", 1.5),
        ("incredibly", 1.5),
        ("super", 1.3),
        ("totally", 1.3),
        ("absolutely", 1.4),
        ("truly", 1.2),
        ("quite", 1.1),
        ("pretty", 1.1),
    ])
});

static NEGATIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["not", "never", "no", "hardly", "nothing", "neither", "nor"]));

fn is_negation(token: &str) -> bool {
    NEGATIONS.contains(token) || token.ends_with("n't") || token.ends_with("n’t")
}

/// Default scorer backed by the built-in lexicon.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> Sentiment {
        let mut assessments: Vec<(f64, f64)> = Vec::new();
        let mut intensity: Option<f64> = None;
        let mut negated = false;
        let mut exclamations = 0usize;

        for token in TOKEN_RE.find_iter(text) {
            let token = token.as_str().to_lowercase();

            if token == "!" {
                exclamations += 1;
                continue;
            }

            if let Some(&(polarity, subjectivity)) = LEXICON.get(token.as_str()) {
                let factor = intensity.take().unwrap_or(1.0);
                let mut polarity = polarity * factor;
                let subjectivity = (subjectivity * factor).min(1.0);
                if negated {
                    polarity *= NEGATION_FACTOR;
                    negated = false;
                }
                assessments.push((polarity.clamp(-1.0, 1.0), subjectivity));
            } else if let Some(&factor) = INTENSIFIERS.get(token.as_str()) {
                intensity = Some(intensity.unwrap_or(1.0) * factor);
            } else if is_negation(&token) {
                negated = true;
                intensity = None;
            } else {
                intensity = None;
                negated = false;
            }
        }

        if assessments.is_empty() {
            return Sentiment::default();
        }

        #[allow(clippy::cast_precision_loss)]
        let n = assessments.len() as f64;
        let mut polarity = assessments.iter().map(|(p, _)| p).sum::<f64>() / n;
        let subjectivity = assessments.iter().map(|(_, s)| s).sum::<f64>() / n;

        #[allow(clippy::cast_precision_loss)]
        let emphasis = exclamations.min(MAX_EXCLAMATIONS) as f64 * EXCLAMATION_BOOST;
        polarity *= 1.0 + emphasis;

        Sentiment {
            polarity: polarity.clamp(-1.0, 1.0),
            subjectivity: subjectivity.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(text: &str) -> Sentiment {
        LexiconScorer::new().score(text)
    }

    #[test]
    fn neutral_text_scores_zero() {
        assert_eq!(score("The report is on the table"), Sentiment::default());
        assert_eq!(score(""), Sentiment::default());
    }

    #[test]
    fn positive_and_negative_words() {
        let good = score("What a great day");
        assert!((good.polarity - 0.8).abs() < 1e-9);
        assert!((good.subjectivity - 0.75).abs() < 1e-9);

        let bad = score("this is a terrible idea");
        assert!((bad.polarity + 1.0).abs() < 1e-9);
    }

    #[test]
    fn negation_flips_and_dampens() {
        let s = score("this is not great");
        assert!((s.polarity + 0.4).abs() < 1e-9);

        let contraction = score("it isn't good");
        assert!(contraction.polarity < 0.0);
    }

    #[test]
    fn intensifier_scales_next_word() {
        let s = score("very good");
        assert!((s.polarity - 0.91).abs() < 1e-9);
        assert!((s.subjectivity - 0.78).abs() < 1e-9);
    }

    #[test]
    fn intensifier_does_not_carry_past_other_words() {
        let s = score("very much good");
        assert!((s.polarity - 0.7).abs() < 1e-9);
    }

    #[test]
    fn assessments_are_averaged() {
        let s = score("good but sad");
        assert!((s.polarity - 0.1).abs() < 1e-9);
        assert!((s.subjectivity - 0.8).abs() < 1e-9);
    }

    #[test]
    fn emoticons_count() {
        assert!(score("see you tomorrow :)").polarity > 0.0);
        assert!(score("missed the bus :(").polarity < 0.0);
    }

    #[test]
    fn scores_stay_in_range() {
        let s = score("extremely absolutely excellent!!!!!");
        assert!(s.polarity <= 1.0);
        assert!(s.subjectivity <= 1.0);

        let s = score("incredibly pathetic and stupid!!!");
        assert!(s.polarity >= -1.0);
        assert!(s.subjectivity >= 0.0);
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(score("GREAT"), score("great"));
    }
}
