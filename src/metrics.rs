/**
This module computes the metrics of a ground-truth corpus and a predicted corpus: per-token
label accuracy and mention-level classification counts (true positive, false positive, false
negative), accumulated globally and per entity type. The accumulators are created by the
caller, passed by mutable reference and read after the call, so one accumulator can aggregate
any number of sequences.
*/
use crate::schemes::{decode, ConversionError, EncodingError, Mention, ParsingError};
use crate::schemes::{RepairPolicy, SchemeType};
use ahash::{HashMap as AHashMap, HashSet as AHashSet};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{self, Display};
use std::ops::{Deref, DerefMut};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
/// Error type to represent when two lists are not of the same length (when they should be).
pub struct InconsistentLengthError(pub usize, pub usize);

impl Display for InconsistentLengthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Inconsistent length between two lists. The reference is length {}, the prediction is length {}",
            self.0, self.1
        )
    }
}
impl Error for InconsistentLengthError {}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enum error encompassing the failures that can happen when scoring a corpus.
pub enum ScoringError {
    InconsistentLength(InconsistentLengthError),
    Conversion(ConversionError),
}

impl Display for ScoringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InconsistentLength(err) => Display::fmt(err, f),
            Self::Conversion(err) => Display::fmt(err, f),
        }
    }
}
impl Error for ScoringError {}

impl From<InconsistentLengthError> for ScoringError {
    fn from(value: InconsistentLengthError) -> Self {
        Self::InconsistentLength(value)
    }
}
impl From<ConversionError> for ScoringError {
    fn from(value: ConversionError) -> Self {
        Self::Conversion(value)
    }
}
impl From<EncodingError> for ScoringError {
    fn from(value: EncodingError) -> Self {
        Self::Conversion(ConversionError::Encoding(value))
    }
}
impl From<ParsingError> for ScoringError {
    fn from(value: ParsingError) -> Self {
        Self::Conversion(ConversionError::Parsing(value))
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Accumulator for per-token label accuracy. Created empty, updated in place by
/// `score_sequence_label_accuracy` and read by the caller.
pub struct AccuracyScore {
    pub hits: usize,
    pub total: usize,
}

impl AccuracyScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of positions where the predicted label equals the reference label. `0.0` when
    /// nothing has been scored yet.
    pub fn accuracy(&self) -> f64 {
        ratio(self.hits, self.total)
    }

    /// Adds the counts of `other` into `self`. Merging is commutative and associative, so
    /// per-shard accumulators can be combined in any order.
    pub fn update(&mut self, other: &AccuracyScore) {
        self.hits += other.hits;
        self.total += other.total;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Bare classification counts, either overall or for a single entity type. This is the value
/// type of `ClassificationScore::type_scores`: per-type entries carry counts only, never a
/// nested map of their own.
pub struct ClassCounts {
    pub true_pos: usize,
    pub false_pos: usize,
    pub false_neg: usize,
}

impl ClassCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reference mentions.
    pub fn total_ref(&self) -> usize {
        self.true_pos + self.false_neg
    }

    /// Number of predicted mentions.
    pub fn total_pos(&self) -> usize {
        self.true_pos + self.false_pos
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_pos, self.total_pos())
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_pos, self.total_ref())
    }

    /// Harmonic mean of precision and recall. `0.0` when both are zero.
    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }

    /// Adds the counts of `other` into `self`.
    pub fn update(&mut self, other: &ClassCounts) {
        self.true_pos += other.true_pos;
        self.false_pos += other.false_pos;
        self.false_neg += other.false_neg;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Accumulator for mention-level classification outcomes: overall counts plus a breakdown per
/// entity type. The overall fields are reachable directly (the struct derefs to its
/// `ClassCounts`). The per-type counts of every type sum back to the overall counts.
pub struct ClassificationScore {
    overall: ClassCounts,
    pub type_scores: AHashMap<String, ClassCounts>,
}

impl Deref for ClassificationScore {
    type Target = ClassCounts;

    fn deref(&self) -> &Self::Target {
        &self.overall
    }
}
impl DerefMut for ClassificationScore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.overall
    }
}

impl ClassificationScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable access to the counts of one entity type, inserting an empty entry if needed.
    pub fn type_counts_mut(&mut self, tag: &str) -> &mut ClassCounts {
        self.type_scores.entry(String::from(tag)).or_default()
    }

    /// Adds all counts of `other` into `self`, elementwise, merging `type_scores` by key.
    /// Merging is commutative and associative, so per-shard accumulators can be combined in
    /// any order.
    pub fn update(&mut self, other: &ClassificationScore) {
        self.overall.update(&other.overall);
        for (tag, counts) in other.type_scores.iter() {
            self.type_scores
                .entry(tag.clone())
                .or_default()
                .update(counts);
        }
    }
}

/// Compares two label sequences position by position and accumulates hit/total counts into
/// `score`. The sequences must be of the same length; a mismatch is a caller bug and no
/// partial scoring is done. Comparison is exact string equality.
pub fn score_sequence_label_accuracy(
    pred_labels: &[&str],
    ref_labels: &[&str],
    score: &mut AccuracyScore,
) -> Result<(), InconsistentLengthError> {
    if pred_labels.len() != ref_labels.len() {
        return Err(InconsistentLengthError(ref_labels.len(), pred_labels.len()));
    }
    for (pred, reference) in pred_labels.iter().zip(ref_labels) {
        score.total += 1;
        if pred == reference {
            score.hits += 1;
        }
    }
    Ok(())
}

/// Compares the predicted mentions of one sequence against the reference mentions and
/// accumulates the outcomes into `score`. Matching is exact equality on span and type: a
/// predicted mention with the right span but the wrong type is one false positive (under the
/// predicted type) plus one false negative (under the reference type). Overall and per-type
/// counts are updated in the same pass.
pub fn score_sequence_mentions(
    pred_mentions: &[Mention],
    ref_mentions: &[Mention],
    score: &mut ClassificationScore,
) {
    let ref_set: AHashSet<&Mention> = ref_mentions.iter().collect();
    let pred_set: AHashSet<&Mention> = pred_mentions.iter().collect();
    for pred in pred_mentions {
        if ref_set.contains(pred) {
            score.true_pos += 1;
            score.type_counts_mut(&pred.tag).true_pos += 1;
        } else {
            score.false_pos += 1;
            score.type_counts_mut(&pred.tag).false_pos += 1;
        }
    }
    for reference in ref_mentions {
        if !pred_set.contains(reference) {
            score.false_neg += 1;
            score.type_counts_mut(&reference.tag).false_neg += 1;
        }
    }
}

/// Scores a whole corpus of aligned predicted/reference label sequences. For each pair, the
/// accuracy scorer runs on the raw labels, then both sides are independently validated (or
/// repaired, when a policy is given), decoded into mentions and scored. References are held
/// to the same validity rules as predictions. The first error anywhere aborts the whole
/// corpus.
pub fn score_label_sequences<'a>(
    pred_label_sequences: &[Vec<&'a str>],
    ref_label_sequences: &[Vec<&'a str>],
    scheme: SchemeType,
    repair: Option<RepairPolicy>,
) -> Result<(ClassificationScore, AccuracyScore), ScoringError> {
    score_label_sequences_delimited(pred_label_sequences, ref_label_sequences, scheme, repair, '-')
}

pub(crate) fn score_label_sequences_delimited<'a>(
    pred_label_sequences: &[Vec<&'a str>],
    ref_label_sequences: &[Vec<&'a str>],
    scheme: SchemeType,
    repair: Option<RepairPolicy>,
    delimiter: char,
) -> Result<(ClassificationScore, AccuracyScore), ScoringError> {
    if pred_label_sequences.len() != ref_label_sequences.len() {
        return Err(InconsistentLengthError(
            ref_label_sequences.len(),
            pred_label_sequences.len(),
        )
        .into());
    }
    let mut classification = ClassificationScore::new();
    let mut accuracy = AccuracyScore::new();
    for (pred_labels, ref_labels) in pred_label_sequences.iter().zip(ref_label_sequences) {
        score_sequence_label_accuracy(pred_labels, ref_labels, &mut accuracy)?;
        let ref_mentions = decode(ref_labels, scheme, repair, delimiter)?;
        let pred_mentions = decode(pred_labels, scheme, repair, delimiter)?;
        score_sequence_mentions(&pred_mentions, &ref_mentions, &mut classification);
    }
    Ok((classification, accuracy))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schemes::Span;
    use quickcheck::{Arbitrary, Gen, QuickCheck};

    fn mention(start: usize, end: usize, tag: &str) -> Mention {
        Mention::new(Span::new(start, end), tag)
    }

    fn counts(true_pos: usize, false_pos: usize, false_neg: usize) -> ClassCounts {
        ClassCounts {
            true_pos,
            false_pos,
            false_neg,
        }
    }

    #[test]
    fn test_score_sequence_labels_correct() {
        let ref_labels = vec!["O", "B-ORG", "I-ORG", "O"];
        let pred_labels = ref_labels.clone();
        let mut score = AccuracyScore::new();
        score_sequence_label_accuracy(&pred_labels, &ref_labels, &mut score).unwrap();
        assert_eq!(score.total, 4);
        assert_eq!(score.hits, 4);
        assert_eq!(score.accuracy(), 1.0);
    }

    #[test]
    fn test_score_sequence_labels_incorrect() {
        let ref_labels = vec!["O", "B-ORG", "I-ORG", "O"];
        let mut pred_labels = ref_labels.clone();
        pred_labels[2] = "B-LOC";
        let mut score = AccuracyScore::new();
        score_sequence_label_accuracy(&pred_labels, &ref_labels, &mut score).unwrap();
        assert_eq!(score.total, 4);
        assert_eq!(score.hits, 3);
        assert_eq!(score.accuracy(), 3.0 / 4.0);
    }

    #[test]
    fn test_score_sequence_labels_length_mismatch() {
        let ref_labels = vec!["O", "B-ORG", "I-ORG", "O"];
        let pred_labels = &ref_labels[..3];
        let mut score = AccuracyScore::new();
        let err = score_sequence_label_accuracy(pred_labels, &ref_labels, &mut score).unwrap_err();
        assert_eq!(err, InconsistentLengthError(4, 3));
        // No partial scoring on failure.
        assert_eq!(score, AccuracyScore::new());
    }

    #[test]
    fn test_score_sequence_mentions_correct() {
        let ref_mentions = vec![mention(0, 2, "PER"), mention(4, 5, "ORG")];
        let pred_mentions = vec![mention(0, 2, "PER"), mention(4, 5, "ORG")];
        let mut score = ClassificationScore::new();
        score_sequence_mentions(&pred_mentions, &ref_mentions, &mut score);
        assert_eq!(score.true_pos, 2);
        assert_eq!(score.false_pos, 0);
        assert_eq!(score.false_neg, 0);
        let expected = AHashMap::from_iter([
            (String::from("PER"), counts(1, 0, 0)),
            (String::from("ORG"), counts(1, 0, 0)),
        ]);
        assert_eq!(score.type_scores, expected);
        assert_eq!(score.total_ref(), 2);
        assert_eq!(score.total_pos(), 2);
        assert_eq!(score.precision(), 1.0);
        assert_eq!(score.recall(), 1.0);
        assert_eq!(score.f1(), 1.0);
    }

    #[test]
    fn test_score_sequence_mentions_incorrect() {
        let ref_mentions = vec![
            mention(0, 2, "LOC"),
            mention(4, 5, "PER"),
            mention(7, 8, "MISC"),
            mention(9, 11, "MISC"),
        ];
        let pred_mentions = vec![
            mention(0, 2, "ORG"),
            mention(4, 5, "PER"),
            mention(9, 11, "MISC"),
        ];
        let mut score = ClassificationScore::new();
        score_sequence_mentions(&pred_mentions, &ref_mentions, &mut score);
        assert_eq!(score.true_pos, 2);
        assert_eq!(score.false_pos, 1);
        assert_eq!(score.false_neg, 2);
        let expected = AHashMap::from_iter([
            (String::from("PER"), counts(1, 0, 0)),
            (String::from("LOC"), counts(0, 0, 1)),
            (String::from("MISC"), counts(1, 0, 1)),
            (String::from("ORG"), counts(0, 1, 0)),
        ]);
        assert_eq!(score.type_scores, expected);
        assert_eq!(score.total_ref(), 4);
        assert_eq!(score.total_pos(), 3);
        assert_eq!(score.precision(), 2.0 / 3.0);
        assert_eq!(score.recall(), 2.0 / 4.0);
        let expected_f1 =
            2.0 * (score.precision() * score.recall()) / (score.precision() + score.recall());
        assert_eq!(score.f1(), expected_f1);
    }

    #[test]
    fn test_classification_score_empty() {
        let score = ClassificationScore::new();
        assert_eq!(score.precision(), 0.0);
        assert_eq!(score.recall(), 0.0);
        assert_eq!(score.f1(), 0.0);
    }

    #[test]
    fn test_accuracy_score_empty() {
        let score = AccuracyScore::new();
        assert_eq!(score.accuracy(), 0.0);
    }

    #[test]
    fn test_classification_score_update() {
        let mut score1 = ClassificationScore::new();
        score1.true_pos += 1;
        score1.type_counts_mut("PER").true_pos += 1;
        score1.false_pos += 1;
        score1.type_counts_mut("ORG").false_pos += 1;

        let mut score2 = ClassificationScore::new();
        score2.false_pos += 1;
        score2.type_counts_mut("ORG").false_pos += 1;
        score2.false_neg += 1;
        score2.type_counts_mut("MISC").false_neg += 1;
        score2.true_pos += 4;
        score2.type_counts_mut("ORG").true_pos += 4;

        score1.update(&score2);

        assert_eq!(score1.true_pos, 5);
        assert_eq!(score1.false_pos, 2);
        assert_eq!(score1.false_neg, 1);
        let expected = AHashMap::from_iter([
            (String::from("PER"), counts(1, 0, 0)),
            (String::from("ORG"), counts(4, 2, 0)),
            (String::from("MISC"), counts(0, 0, 1)),
        ]);
        assert_eq!(score1.type_scores, expected);
    }

    #[test]
    fn test_classification_score_update_commutative_and_associative() {
        let mut a = ClassificationScore::new();
        a.true_pos += 2;
        a.type_counts_mut("PER").true_pos += 2;
        let mut b = ClassificationScore::new();
        b.false_pos += 1;
        b.type_counts_mut("ORG").false_pos += 1;
        let mut c = ClassificationScore::new();
        c.false_neg += 3;
        c.type_counts_mut("PER").false_neg += 3;

        let mut left = a.clone();
        left.update(&b);
        left.update(&c);

        let mut right_tail = b.clone();
        right_tail.update(&c);
        let mut right = a.clone();
        right.update(&right_tail);

        assert_eq!(left, right);

        let mut ab = a.clone();
        ab.update(&b);
        let mut ba = b.clone();
        ba.update(&a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_corpus_outer_length_mismatch() {
        let ref_labels = vec![vec!["O"], vec!["B-PER"]];
        let pred_labels = vec![vec!["O"]];
        let err =
            score_label_sequences(&pred_labels, &ref_labels, SchemeType::BIO, None).unwrap_err();
        assert_eq!(
            err,
            ScoringError::InconsistentLength(InconsistentLengthError(2, 1))
        );
    }

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct ArbMention {
        start: usize,
        len: usize,
        tag: &'static str,
    }

    impl ArbMention {
        fn to_mention(&self) -> Mention<'static> {
            Mention::new(Span::new(self.start, self.start + self.len), self.tag)
        }
    }

    impl Arbitrary for ArbMention {
        fn arbitrary(g: &mut Gen) -> Self {
            let choices = ["PER", "ORG", "LOC", "MISC"];
            ArbMention {
                start: usize::arbitrary(g) % 16,
                len: 1 + usize::arbitrary(g) % 3,
                tag: *g.choose(&choices).unwrap(),
            }
        }
    }

    fn unique_mentions(raw: Vec<ArbMention>) -> Vec<Mention<'static>> {
        let set: AHashSet<ArbMention> = raw.into_iter().collect();
        set.iter().map(ArbMention::to_mention).collect()
    }

    #[test]
    fn propertie_test_swapping_sides_swaps_false_counts() {
        fn prop(pred: Vec<ArbMention>, refs: Vec<ArbMention>) -> bool {
            let pred = unique_mentions(pred);
            let refs = unique_mentions(refs);
            let mut forward = ClassificationScore::new();
            score_sequence_mentions(&pred, &refs, &mut forward);
            let mut backward = ClassificationScore::new();
            score_sequence_mentions(&refs, &pred, &mut backward);
            forward.true_pos == backward.true_pos
                && forward.false_pos == backward.false_neg
                && forward.false_neg == backward.false_pos
        }
        QuickCheck::new().quickcheck(prop as fn(Vec<ArbMention>, Vec<ArbMention>) -> bool);
    }

    #[test]
    fn propertie_test_counts_partition_both_sides() {
        fn prop(pred: Vec<ArbMention>, refs: Vec<ArbMention>) -> bool {
            let pred = unique_mentions(pred);
            let refs = unique_mentions(refs);
            let mut score = ClassificationScore::new();
            score_sequence_mentions(&pred, &refs, &mut score);
            score.total_ref() == refs.len() && score.total_pos() == pred.len()
        }
        QuickCheck::new().quickcheck(prop as fn(Vec<ArbMention>, Vec<ArbMention>) -> bool);
    }

    #[test]
    fn propertie_test_type_counts_sum_to_overall() {
        fn prop(pred: Vec<ArbMention>, refs: Vec<ArbMention>) -> bool {
            let pred = unique_mentions(pred);
            let refs = unique_mentions(refs);
            let mut score = ClassificationScore::new();
            score_sequence_mentions(&pred, &refs, &mut score);
            let mut summed = ClassCounts::new();
            for type_counts in score.type_scores.values() {
                summed.update(type_counts);
            }
            summed == score.overall
        }
        QuickCheck::new().quickcheck(prop as fn(Vec<ArbMention>, Vec<ArbMention>) -> bool);
    }

    #[test]
    fn propertie_test_accuracy_counts_mismatches() {
        fn prop(positions: Vec<bool>) -> bool {
            let ref_labels: Vec<&str> = positions.iter().map(|_| "A").collect();
            let pred_labels: Vec<&str> = positions
                .iter()
                .map(|matches| if *matches { "A" } else { "B" })
                .collect();
            let mut score = AccuracyScore::new();
            score_sequence_label_accuracy(&pred_labels, &ref_labels, &mut score).unwrap();
            let expected_hits = positions.iter().filter(|m| **m).count();
            score.total == positions.len() && score.hits == expected_hits
        }
        QuickCheck::new().quickcheck(prop as fn(Vec<bool>) -> bool);
    }
}
