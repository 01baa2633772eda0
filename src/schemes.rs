/**
This module gives the tooling necessary to turn a sequence of labels into a list of mentions
under a chunk-encoding scheme. It owns the validity rules of the encoding: which prefixes a
scheme allows and which label transitions are legal. Invalid sequences can either be rejected
with an `EncodingError` or rewritten into valid ones with a `RepairPolicy`.
*/
use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

/// A half-open range `[start, end)` of token indices inside a single sequence. A span always
/// covers at least one token.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end);
        Span { start, end }
    }

    /// Number of tokens covered by the span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A mention is a typed, contiguous chunk of tokens, such as a `PER` mention covering tokens
/// 4 to 6. It contains a `Span` and a tag, which is the associated entity type (such as
/// `LOC`, `PER`, `ORG`, etc.)
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Mention<'a> {
    pub span: Span,
    pub tag: Cow<'a, str>,
}

impl<'a> Mention<'a> {
    pub fn new<T: Into<Cow<'a, str>>>(span: Span, tag: T) -> Self {
        Mention {
            span,
            tag: tag.into(),
        }
    }
}

impl<'a> Display for Mention<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.tag, self.span.start, self.span.end)
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Sequence)]
/// Prefix of a single label. It indicates where the token sits relative to a chunk: `B` begins
/// a chunk, `I` continues it and `O` is outside any chunk.
pub(crate) enum Prefix {
    B,
    I,
    O,
}

impl Prefix {
    fn as_char(&self) -> char {
        match self {
            Prefix::B => 'B',
            Prefix::I => 'I',
            Prefix::O => 'O',
        }
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Could not parse a label, a scheme name or a repair policy name.
pub enum ParsingError {
    /// The label's prefix character is not one of the prefixes allowed by the active scheme.
    PrefixError(String, SchemeType),
    /// Received an empty string where a label was expected.
    EmptyToken,
    /// The scheme name is not part of the supported scheme registry.
    UnknownScheme(String),
    /// The repair policy name is not part of the supported policies.
    UnknownPolicy(String),
}

impl Display for ParsingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrefixError(token, scheme) => {
                write!(
                    f,
                    "Could not parse the label '{}': its prefix is not allowed by the {} scheme",
                    token, scheme
                )
            }
            Self::EmptyToken => write!(f, "Received an empty string as a label"),
            Self::UnknownScheme(name) => {
                let supported: Vec<String> = all::<SchemeType>().map(|s| s.to_string()).collect();
                write!(
                    f,
                    "Unknown scheme name: '{}'. Supported schemes: {}",
                    name,
                    supported.join(", ")
                )
            }
            Self::UnknownPolicy(name) => {
                let supported: Vec<String> =
                    all::<RepairPolicy>().map(|p| p.to_string()).collect();
                write!(
                    f,
                    "Unknown repair policy name: '{}'. Supported policies: {}",
                    name,
                    supported.join(", ")
                )
            }
        }
    }
}

impl Error for ParsingError {}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A label sequence contains a transition that is invalid under the active scheme. Carries the
/// position of the offending label and, when the error is not at the start of the sequence,
/// the label that preceded it.
pub struct EncodingError {
    pub index: usize,
    pub token: String,
    pub previous: Option<String>,
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.previous {
            Some(previous) => write!(
                f,
                "Invalid transition at index {}: '{}' cannot follow '{}'",
                self.index, self.token, previous
            ),
            None => write!(
                f,
                "Invalid transition at index {}: '{}' cannot start a sequence",
                self.index, self.token
            ),
        }
    }
}

impl Error for EncodingError {}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Enum of errors wrapping the errors that can occur when converting a label sequence into
/// mentions.
pub enum ConversionError {
    /// A label could not be parsed at all.
    Parsing(ParsingError),
    /// The labels parsed but form an invalid sequence under the scheme.
    Encoding(EncodingError),
}

impl From<ParsingError> for ConversionError {
    fn from(value: ParsingError) -> Self {
        Self::Parsing(value)
    }
}

impl From<EncodingError> for ConversionError {
    fn from(value: EncodingError) -> Self {
        Self::Encoding(value)
    }
}

impl Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parsing(err) => Display::fmt(err, f),
            Self::Encoding(err) => Display::fmt(err, f),
        }
    }
}

impl Error for ConversionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence, Serialize, Deserialize)]
/// Enumeration of the supported chunk-encoding schemes. A scheme decides which prefixes are
/// allowed and which label transitions are valid.
pub enum SchemeType {
    BIO,
}

impl Display for SchemeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for SchemeType {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BIO" => Ok(Self::BIO),
            _ => Err(ParsingError::UnknownScheme(String::from(s))),
        }
    }
}

impl SchemeType {
    const BIO_ALLOWED_PREFIXES: [Prefix; 3] = [Prefix::B, Prefix::I, Prefix::O];

    fn allowed_prefixes(&self) -> &'static [Prefix] {
        match self {
            Self::BIO => &Self::BIO_ALLOWED_PREFIXES,
        }
    }

    fn parse_prefix(&self, c: char) -> Option<Prefix> {
        let prefix = match c {
            'B' => Prefix::B,
            'I' => Prefix::I,
            'O' => Prefix::O,
            _ => return None,
        };
        if self.allowed_prefixes().contains(&prefix) {
            Some(prefix)
        } else {
            None
        }
    }

    /// Whether `current` is a legal continuation of `prev` under this scheme. `prev` is `None`
    /// at the start of a sequence.
    fn licenses(&self, prev: Option<&InnerToken>, current: &InnerToken) -> bool {
        match self {
            Self::BIO => match current.prefix {
                // An inside label must continue a chunk of the same type.
                Prefix::I => matches!(
                    prev,
                    Some(p) if matches!(p.prefix, Prefix::B | Prefix::I) && p.tag == current.tag
                ),
                Prefix::B | Prefix::O => true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Sequence, Serialize, Deserialize)]
/// Deterministic policies for rewriting an invalid label sequence into a valid one.
pub enum RepairPolicy {
    /// The error-tolerance behavior of the conlleval scoring script: an inside label that does
    /// not continue a chunk of its own type is treated as beginning a new chunk.
    Conlleval,
}

impl Display for RepairPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conlleval => write!(f, "conlleval"),
        }
    }
}

impl FromStr for RepairPolicy {
    type Err = ParsingError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conlleval" => Ok(Self::Conlleval),
            _ => Err(ParsingError::UnknownPolicy(String::from(s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// A single parsed label: the raw label, its prefix and its entity type.
struct InnerToken<'a> {
    /// The full label, such as `"B-PER"` or `"O"`.
    token: &'a str,
    /// The prefix, such as `B`, `I` or `O`. Repair rewrites this field only.
    prefix: Prefix,
    /// The entity type, such as `"PER"`. Empty for outside labels.
    tag: &'a str,
}

impl<'a> InnerToken<'a> {
    fn try_new(token: &'a str, scheme: SchemeType, delimiter: char) -> Result<Self, ParsingError> {
        let first = token.chars().next().ok_or(ParsingError::EmptyToken)?;
        let prefix = scheme
            .parse_prefix(first)
            .ok_or_else(|| ParsingError::PrefixError(String::from(token), scheme))?;
        let rest = &token[first.len_utf8()..];
        let tag = rest.strip_prefix(delimiter).unwrap_or(rest);
        Ok(InnerToken { token, prefix, tag })
    }

    /// Rebuilds the label string. Borrows the original label unless repair rewrote the prefix.
    fn into_label(self, delimiter: char) -> Cow<'a, str> {
        if self.token.starts_with(self.prefix.as_char()) {
            Cow::Borrowed(self.token)
        } else {
            let mut label = String::with_capacity(self.token.len());
            label.push(self.prefix.as_char());
            label.push(delimiter);
            label.push_str(self.tag);
            Cow::Owned(label)
        }
    }
}

fn parse_sequence<'a>(
    labels: &[&'a str],
    scheme: SchemeType,
    delimiter: char,
) -> Result<Vec<InnerToken<'a>>, ParsingError> {
    labels
        .iter()
        .map(|label| InnerToken::try_new(label, scheme, delimiter))
        .collect()
}

/// Scans consecutive label pairs (with an implicit sequence-start boundary before the first
/// label) and fails at the first transition the scheme does not license.
fn validate_tokens(tokens: &[InnerToken], scheme: SchemeType) -> Result<(), EncodingError> {
    let mut prev: Option<&InnerToken> = None;
    for (index, current) in tokens.iter().enumerate() {
        if !scheme.licenses(prev, current) {
            return Err(EncodingError {
                index,
                token: String::from(current.token),
                previous: prev.map(|p| String::from(p.token)),
            });
        }
        prev = Some(current);
    }
    Ok(())
}

/// Rewrites invalid transitions in a single left-to-right pass, without backtracking. The
/// already-repaired prefix of the previous label decides whether the current one is licensed.
fn repair_tokens(tokens: &mut [InnerToken], scheme: SchemeType, policy: RepairPolicy) {
    match policy {
        RepairPolicy::Conlleval => {
            for i in 0..tokens.len() {
                let (before, rest) = tokens.split_at_mut(i);
                let current = &mut rest[0];
                if current.prefix == Prefix::I && !scheme.licenses(before.last(), current) {
                    current.prefix = Prefix::B;
                }
            }
        }
    }
}

/// Walks a valid label sequence left to right and closes a mention at the first label that
/// does not continue the open chunk.
fn decode_tokens<'a>(tokens: &[InnerToken<'a>]) -> Vec<Mention<'a>> {
    let mut mentions = Vec::new();
    let mut open: Option<(usize, &'a str)> = None;
    for (i, token) in tokens.iter().enumerate() {
        match token.prefix {
            Prefix::B => {
                if let Some((start, tag)) = open.take() {
                    mentions.push(Mention::new(Span::new(start, i), tag));
                }
                open = Some((i, token.tag));
            }
            // On valid input an inside label always continues the open chunk.
            Prefix::I => {}
            Prefix::O => {
                if let Some((start, tag)) = open.take() {
                    mentions.push(Mention::new(Span::new(start, i), tag));
                }
            }
        }
    }
    if let Some((start, tag)) = open {
        mentions.push(Mention::new(Span::new(start, tokens.len()), tag));
    }
    mentions
}

/// Checks that `labels` forms a valid sequence under `scheme`. Fails with the first malformed
/// label or invalid transition.
pub fn validate(
    labels: &[&str],
    scheme: SchemeType,
    delimiter: char,
) -> Result<(), ConversionError> {
    let tokens = parse_sequence(labels, scheme, delimiter)?;
    validate_tokens(&tokens, scheme)?;
    Ok(())
}

/// Deterministically rewrites `labels` into a sequence that is valid under `scheme`. Labels
/// left untouched by the policy are borrowed, rewritten ones are owned.
pub fn repair<'a>(
    labels: &[&'a str],
    scheme: SchemeType,
    policy: RepairPolicy,
    delimiter: char,
) -> Result<Vec<Cow<'a, str>>, ParsingError> {
    let mut tokens = parse_sequence(labels, scheme, delimiter)?;
    repair_tokens(&mut tokens, scheme, policy);
    Ok(tokens
        .into_iter()
        .map(|token| token.into_label(delimiter))
        .collect())
}

/// Converts a label sequence into its mentions, in left-to-right order. Without a repair
/// policy the sequence must be valid, otherwise an `EncodingError` is returned. With a policy
/// the sequence is repaired first and the repaired sequence is decoded.
pub fn decode<'a>(
    labels: &[&'a str],
    scheme: SchemeType,
    repair: Option<RepairPolicy>,
    delimiter: char,
) -> Result<Vec<Mention<'a>>, ConversionError> {
    let mut tokens = parse_sequence(labels, scheme, delimiter)?;
    if let Some(policy) = repair {
        repair_tokens(&mut tokens, scheme, policy);
    }
    // A correct policy cannot produce an invalid sequence; this is a terminal check.
    validate_tokens(&tokens, scheme)?;
    Ok(decode_tokens(&tokens))
}
