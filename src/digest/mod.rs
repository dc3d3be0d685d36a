//! Extractive digest of a result set.
//!
//! The digest is one bullet per top-ranked result, holding the first sentence
//! of that result's summary. Results whose summary has no detectable sentence
//! contribute nothing; later results do not move up to take their place.

use unicode_segmentation::UnicodeSegmentation;

use crate::models::ResultSet;

/// Number of top results considered for the digest.
pub const DIGEST_RESULTS: usize = 3;

/// Prefix of every digest line.
pub const BULLET: &str = "• ";

const TERMINALS: &[char] = &['.', '!', '?', '…', '。', '！', '？'];
const CLOSERS: &[char] = &['"', '\'', ')', ']', '}', '”', '’', '»'];
const OPENERS: &[char] = &['"', '\'', '(', '[', '{', '“', '‘', '«'];

/// Lowercased tokens that end with a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "dr.", "mr.", "mrs.", "ms.", "prof.", "fig.", "figs.", "eq.", "eqs.", "sec.", "al.", "vs.",
    "i.e.", "e.g.", "cf.", "approx.",
];

/// Build the digest for `results`. Empty for an empty result set.
///
/// Line breaks inside a sentence are folded into single spaces so every
/// bullet stays on one line.
pub fn digest(results: &ResultSet) -> String {
    results
        .iter()
        .take(DIGEST_RESULTS)
        .filter_map(|result| first_sentence(&result.summary))
        .map(|sentence| format!("{}{}", BULLET, sentence.split_whitespace().collect::<Vec<_>>().join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The first complete sentence of `text`, trimmed.
///
/// Boundaries follow Unicode sentence segmentation (UAX #29), with two
/// corrections: leading segments without terminal punctuation (a title line,
/// a hard-wrapped clause) belong to the sentence that follows them, and a
/// segment ending in a known abbreviation or an initialism such as `U.S.`
/// continues into the next one. Returns `None` when no segment ends with
/// terminal punctuation.
pub fn first_sentence(text: &str) -> Option<&str> {
    let mut segments = text.split_sentence_bound_indices().peekable();

    while let Some((start, segment)) = segments.next() {
        let segment = segment.trim();
        if !is_terminated(segment) {
            continue;
        }
        if ends_with_abbreviation(segment) && segments.peek().is_some() {
            continue;
        }
        let end = start + segment.len() + leading_whitespace(text, start);
        return Some(text[..end].trim());
    }
    None
}

fn leading_whitespace(text: &str, start: usize) -> usize {
    let rest = &text[start..];
    rest.len() - rest.trim_start().len()
}

fn is_terminated(segment: &str) -> bool {
    segment
        .trim_end_matches(CLOSERS)
        .ends_with(TERMINALS)
}

fn ends_with_abbreviation(segment: &str) -> bool {
    let Some(token) = segment.trim_end_matches(CLOSERS).split_whitespace().last() else {
        return false;
    };
    let token = token.trim_start_matches(OPENERS);
    let lowered = token.to_lowercase();
    ABBREVIATIONS.contains(&lowered.as_str()) || is_initialism(token)
}

/// `U.S.`, `U.K.`, `E.U.`: two or more single capitals, each followed by a period.
fn is_initialism(token: &str) -> bool {
    let Some(body) = token.strip_suffix('.') else {
        return false;
    };
    let letters: Vec<&str> = body.split('.').collect();
    letters.len() >= 2
        && letters.iter().all(|part| {
            let mut chars = part.chars();
            matches!((chars.next(), chars.next()), (Some(c), None) if c.is_uppercase())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaperRecord, ScoredResult};

    fn results(summaries: &[&str]) -> ResultSet {
        let ranked = summaries
            .iter()
            .enumerate()
            .map(|(i, summary)| {
                let record = PaperRecord::new(format!("p{}", i), *summary);
                ScoredResult::from_record(&record, 1.0 - i as f32 * 0.1)
            })
            .collect();
        ResultSet::from_ranked(ranked)
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(digest(&ResultSet::empty()), "");
    }

    #[test]
    fn test_summary_without_sentence_end_yields_nothing() {
        assert_eq!(digest(&results(&["a summary with no ending punctuation"])), "");
        assert_eq!(first_sentence("   "), None);
    }

    #[test]
    fn test_first_sentence_of_each_result_in_rank_order() {
        let digest = digest(&results(&[
            "Transformers replace recurrence. They scale well.",
            "Graph networks pass messages!  Nodes aggregate.",
            "Why does dropout work? We analyze it.",
        ]));

        assert_eq!(
            digest,
            "• Transformers replace recurrence.\n• Graph networks pass messages!\n• Why does dropout work?"
        );
    }

    #[test]
    fn test_only_top_three_results() {
        let digest = digest(&results(&["One.", "Two.", "Three.", "Four."]));
        assert_eq!(digest.lines().count(), 3);
        assert!(!digest.contains("Four."));
    }

    #[test]
    fn test_skipped_result_is_not_backfilled() {
        let digest = digest(&results(&["One.", "no sentence here", "Three.", "Four."]));
        assert_eq!(digest, "• One.\n• Three.");
    }

    #[test]
    fn test_sentence_detection_details() {
        assert_eq!(
            first_sentence("We test a model, e.g. the baseline. It fails."),
            Some("We test a model, e.g. the baseline.")
        );
        assert_eq!(
            first_sentence("Accuracy rose by 3.5 points. Latency fell."),
            Some("Accuracy rose by 3.5 points.")
        );
        assert_eq!(
            first_sentence("They report \"robust gains.\" Others disagree."),
            Some("They report \"robust gains.\"")
        );
        assert_eq!(first_sentence("  Leading whitespace.  "), Some("Leading whitespace."));
    }

    #[test]
    fn test_unterminated_lead_joins_following_sentence() {
        assert_eq!(
            first_sentence("A model without a period\nbut a second line that ends."),
            Some("A model without a period\nbut a second line that ends.")
        );
        assert_eq!(
            first_sentence("Background\nWe propose X. More follows."),
            Some("Background\nWe propose X.")
        );
    }

    #[test]
    fn test_multiline_summary_digest_stays_on_one_line() {
        let digest = digest(&results(&["Deep models\nfor protein folding. Extra detail."]));
        assert_eq!(digest, "• Deep models for protein folding.");
    }

    #[test]
    fn test_abbreviations_do_not_end_sentences() {
        assert_eq!(
            first_sentence("Dr. Smith proposes a new optimizer. It converges faster."),
            Some("Dr. Smith proposes a new optimizer.")
        );
        assert_eq!(
            first_sentence("Results match (Fig. 3) and the bound holds. Proofs follow."),
            Some("Results match (Fig. 3) and the bound holds.")
        );
    }

    #[test]
    fn test_initialisms_do_not_end_sentences() {
        assert_eq!(
            first_sentence("We compare against U.S. Census data. Results hold."),
            Some("We compare against U.S. Census data.")
        );
        assert_eq!(
            first_sentence("Data come from the U.S."),
            Some("Data come from the U.S.")
        );
        assert!(is_initialism("U.K."));
        assert!(!is_initialism("X."));
        assert!(!is_initialism("Census."));
    }
}
