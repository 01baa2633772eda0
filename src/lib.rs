/*!
This library evaluates sequence-labeling predictions (e.g. named-entity recognition) against
reference annotations. It computes two classes of metrics: per-token label accuracy, and
mention-level classification scores (precision, recall, F1) computed from the chunks decoded
out of a label encoding.

# SCHEMES
The following scheme is supported:
* BIO: `B` begins a typed chunk, `I` continues a chunk of the same type and `O` marks a token
    outside any chunk. An `I` label is only valid immediately after a `B` or `I` label of the
    same type.

## More information about schemes
* [Wikipedia](https://en.wikipedia.org/wiki/Inside%E2%80%93outside%E2%80%93beginning_(tagging))

# Terminology
* A label (such as `B-PER` or `O`) annotates a single token with a prefix and, except for
    outside labels, an entity type.
* A mention is a typed, contiguous span of tokens identified as an entity occurrence. Spans
    are half-open token-index ranges within one sequence.
* Repair is the deterministic rewriting of an invalid label sequence into a valid one under a
    fixed policy. The `conlleval` policy mirrors the error tolerance of the classic conlleval
    scoring script: an inside label that does not continue a chunk of its own type begins a
    new chunk instead.

# Scoring
Scores are held in mutable accumulator objects (`AccuracyScore`, `ClassificationScore`)
created by the caller and updated in place, so one accumulator can aggregate a whole corpus.
`ClassificationScore` keeps overall counts and a per-type breakdown whose counts always sum
back to the overall ones. Invalid label sequences are rejected with an `EncodingError` unless
a repair policy is requested; references are validated exactly like predictions. Errors are
fail-fast: the first one aborts the whole corpus computation.
*/

mod config;
mod metrics;
mod schemes;

// The public api starts here
pub use config::{ScoringConfig, ScoringConfigBuilder};

pub use metrics::{
    score_label_sequences, score_sequence_label_accuracy, score_sequence_mentions,
    AccuracyScore, ClassCounts, ClassificationScore, InconsistentLengthError, ScoringError,
};

pub use schemes::{
    decode, repair, validate, ConversionError, EncodingError, Mention, ParsingError,
    RepairPolicy, SchemeType, Span,
};

/// Main entrypoint of the library. This function scores a corpus of predicted label sequences
/// against the aligned reference sequences and returns the classification and accuracy
/// accumulators. Instead of taking the raw parameters, this function takes a `ScoringConfig`
/// struct and uses sensible defaults.
///
/// * `pred_label_sequences`: Predicted labels, one inner `Vec` per sentence
/// * `ref_label_sequences`: Reference labels, aligned with the predictions by position
/// * `config`: Scheme, repair policy and delimiter used to decode the labels
///
/// # Example
/// ```rust
/// use seqscore::{score_label_sequences_conf, RepairPolicy, SchemeType, ScoringConfigBuilder};
///
/// let ref_labels = vec![vec!["O", "B-ORG", "I-ORG", "O"], vec!["B-PER", "I-PER"]];
/// let pred_labels = vec![vec!["O", "I-ORG", "I-ORG", "O"], vec!["O", "I-PER"]];
/// let config = ScoringConfigBuilder::default()
///     .scheme(SchemeType::BIO)
///     .repair(Some(RepairPolicy::Conlleval))
///     .build();
///
/// let (classification, accuracy) =
///     score_label_sequences_conf(&pred_labels, &ref_labels, config).unwrap();
///
/// assert_eq!(accuracy.hits, 4);
/// assert_eq!(accuracy.total, 6);
/// assert_eq!(classification.true_pos, 1);
/// assert_eq!(classification.false_pos, 1);
/// assert_eq!(classification.false_neg, 1);
/// ```
pub fn score_label_sequences_conf<'a>(
    pred_label_sequences: &[Vec<&'a str>],
    ref_label_sequences: &[Vec<&'a str>],
    config: ScoringConfig,
) -> Result<(ClassificationScore, AccuracyScore), ScoringError> {
    let (scheme, repair, delimiter) = config.into();
    metrics::score_label_sequences_delimited(
        pred_label_sequences,
        ref_label_sequences,
        scheme,
        repair,
        delimiter,
    )
}
