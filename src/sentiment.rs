//! Sentiment scoring of articles toward the subject company.
//!
//! [`SentimentScorer::score`] asks the completion provider for a 0-10
//! positivity index (PI) and parses the first digit of the answer. A
//! successful call whose text has no digit scores 0. A failed call never
//! propagates: the configured [`FallbackPolicy`] decides what happens instead.
//!
//! Only the *first* digit is read, so an answer of `"10"` scores 1. This is
//! long-standing behavior of the report and is kept as is. Full-width digits
//! (`７`), which Korean answers sometimes use, read like ASCII ones.

use std::fmt;
use std::str::FromStr;

use rand::{Rng, rng};
use tracing::{debug, instrument, warn};

use crate::api::CompletionProvider;
use crate::models::Score;
use crate::utils::{language_name, truncate_for_log};

/// What to do when the completion call itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Substitute a uniformly random score in `[0, 10]`.
    #[default]
    Random,
    /// Substitute a fixed score.
    Constant(Score),
    /// Drop the article from the report.
    Omit,
}

impl FallbackPolicy {
    fn apply(self) -> Option<Score> {
        match self {
            FallbackPolicy::Random => Score::new(rng().random_range(0..=Score::MAX.value())),
            FallbackPolicy::Constant(score) => Some(score),
            FallbackPolicy::Omit => None,
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::Random => write!(f, "random"),
            FallbackPolicy::Constant(score) => write!(f, "constant({score})"),
            FallbackPolicy::Omit => write!(f, "omit"),
        }
    }
}

/// Fallback kind as accepted on the command line and in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Random,
    Constant,
    Omit,
}

impl FromStr for FallbackKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(FallbackKind::Random),
            "constant" => Ok(FallbackKind::Constant),
            "omit" => Ok(FallbackKind::Omit),
            other => Err(format!(
                "unknown fallback '{other}' (expected random, constant or omit)"
            )),
        }
    }
}

impl FallbackKind {
    /// Combine with the score used by [`FallbackKind::Constant`].
    pub fn with_score(self, score: Score) -> FallbackPolicy {
        match self {
            FallbackKind::Random => FallbackPolicy::Random,
            FallbackKind::Constant => FallbackPolicy::Constant(score),
            FallbackKind::Omit => FallbackPolicy::Omit,
        }
    }
}

/// How a score came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoring {
    /// Parsed from a successful completion.
    Parsed(Score),
    /// The provider failed; the fallback supplied this score.
    Degraded(Score),
    /// The provider failed and the fallback dropped the article.
    Omitted,
}

impl Scoring {
    pub fn score(self) -> Option<Score> {
        match self {
            Scoring::Parsed(score) | Scoring::Degraded(score) => Some(score),
            Scoring::Omitted => None,
        }
    }

    pub fn is_degraded(self) -> bool {
        !matches!(self, Scoring::Parsed(_))
    }
}

/// Scores articles about one company through a completion provider.
#[derive(Debug)]
pub struct SentimentScorer<P> {
    provider: P,
    company: String,
    language: String,
    fallback: FallbackPolicy,
}

impl<P> SentimentScorer<P>
where
    P: CompletionProvider,
{
    /// `language` is the search language code; it only flavors the prompt.
    pub fn new(provider: P, company: &str, language: &str, fallback: FallbackPolicy) -> Self {
        Self {
            provider,
            company: company.to_string(),
            language: language.to_string(),
            fallback,
        }
    }

    #[cfg(test)]
    pub(crate) fn provider(&self) -> &P {
        &self.provider
    }

    /// Score one article. Never fails; see [`FallbackPolicy`].
    #[instrument(level = "debug", skip_all, fields(title = %truncate_for_log(title, 60)))]
    pub async fn score(&self, title: &str, summary: &str) -> Scoring {
        let prompt = build_prompt(&self.company, language_name(&self.language), title, summary);
        match self.provider.complete(&prompt).await {
            Ok(text) => {
                let score = parse_score(&text);
                debug!(response = %truncate_for_log(&text, 80), %score, "Parsed sentiment score");
                Scoring::Parsed(score)
            }
            Err(e) => match self.fallback.apply() {
                Some(score) => {
                    warn!(error = %e, fallback = %self.fallback, %score, "Scoring failed; using fallback score");
                    Scoring::Degraded(score)
                }
                None => {
                    warn!(error = %e, "Scoring failed; omitting article");
                    Scoring::Omitted
                }
            },
        }
    }
}

/// Prompt asking for a single 0-10 digit on how favorably the article
/// portrays `company`. Title and summary are embedded verbatim.
pub fn build_prompt(company: &str, language: &str, title: &str, summary: &str) -> String {
    format!(
        "Given the following title and summary of an article in {language}: \
         Title: {title} Summary: {summary} \
         could you gage on a scale of 0-10 how positively it mentions {company} company, \
         with 0 being terrible publicity for {company} such as accusing it of mal-practice, \
         and 10 being good coverage of {company} such as applauding {company}'s initiatives, \
         regardless of whether {company} is mentioned in the summary or not. \
         I am asking you for a sentiment analysis of this article about {company} and \
         assigning it to a score out of 10. Respond only with a single digit integer. \
         Do not respond with anything else besides a number from 0 to 10. \
         If not then just return a random number from 0-10."
    )
}

/// Every digit of `text`, in order. ASCII and full-width (`０`-`９`) digits
/// count; digits of other scripts are ignored.
pub fn digits(text: &str) -> String {
    text.chars().filter(|c| decimal_value(*c).is_some()).collect()
}

/// First digit of [`digits`], or 0 when there is none.
pub fn parse_score(text: &str) -> Score {
    digits(text)
        .chars()
        .next()
        .and_then(decimal_value)
        .and_then(|d| Score::new(d as u8))
        .unwrap_or(Score::MIN)
}

fn decimal_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        '０'..='９' => Some(u32::from(c) - u32::from('０')),
        _ => None,
    }
}
