//! Data models for fetched articles, their scores, and the report being assembled.
//!
//! - [`Article`]: one record from the news-search provider, immutable once fetched
//! - [`Score`]: the 0-10 positivity index (PI) of an article toward the company
//! - [`ColorBand`]: the three-tier classification used to color scores and the average
//! - [`ReportModel`]: the ordered, numbered rows plus the running aggregate for one run

use std::cmp::Ordering;
use std::fmt;

use crate::utils::date_prefix;

/// A news article as returned by the search provider.
///
/// Missing fields from the provider are represented as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    /// Headline of the article.
    pub title: String,
    /// Byline; frequently empty.
    pub author: String,
    /// Publishing agency, e.g. `yna.co.kr`.
    pub source: String,
    /// Provider timestamp, e.g. `2023-03-02 07:41:00`.
    pub published_date: String,
    /// Short summary. Articles without one are never scored.
    pub summary: String,
    /// Canonical URL of the article.
    pub link: String,
}

impl Article {
    /// Whether the article carries a summary worth scoring.
    pub fn has_summary(&self) -> bool {
        !self.summary.is_empty()
    }

    /// The date portion of [`Article::published_date`], at most 10 characters.
    pub fn display_date(&self) -> &str {
        date_prefix(&self.published_date)
    }
}

/// Positivity index in `[0, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(0);
    pub const MAX: Score = Score(10);

    /// Returns `None` when `value` is outside `[0, 10]`.
    pub fn new(value: u8) -> Option<Self> {
        (value <= Self::MAX.0).then_some(Self(value))
    }

    /// The raw score in `[0, 10]`.
    pub fn value(self) -> u8 {
        self.0
    }

    /// The display tier of this score.
    ///
    /// # Returns
    ///
    /// [`ColorBand::High`] for 8-10, [`ColorBand::Medium`] for 6-7,
    /// [`ColorBand::Low`] otherwise.
    pub fn band(self) -> ColorBand {
        ColorBand::classify(f64::from(self.0))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visual tier of a score or of the report average.
///
/// Lower bounds are inclusive: 8 is `High`, 6 is `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorBand {
    High,
    Medium,
    Low,
}

impl ColorBand {
    /// Classify any value on the PI scale, including a fractional average.
    pub fn classify(value: f64) -> Self {
        if value >= 8.0 {
            ColorBand::High
        } else if value >= 6.0 {
            ColorBand::Medium
        } else {
            ColorBand::Low
        }
    }

    /// CSS color used for the cell or table background.
    pub fn color(self) -> &'static str {
        match self {
            ColorBand::High => "#32CD32",
            ColorBand::Medium => "#FFA500",
            ColorBand::Low => "#FF4500",
        }
    }
}

/// Mean score rounded to one decimal place.
///
/// Stored in tenths so the displayed text and the value used for the
/// [`ColorBand`] can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Average {
    tenths: u32,
}

impl Average {
    /// Mean of `count` scores summing to `sum`, rounded to one decimal.
    ///
    /// Rounding follows the decimal rounding of the quotient as an `f64`:
    /// the nearest tenth wins, and a quotient lying exactly halfway between
    /// two tenths goes to the even one (`7.25` shows as `7.2`, `0.75` as `0.8`).
    /// A mean like `0.15`, which has no exact `f64`, rounds the way its nearest
    /// `f64` lies (`0.1`).
    ///
    /// # Returns
    ///
    /// `None` when `count` is 0.
    pub fn from_totals(sum: u32, count: u32) -> Option<Self> {
        if count == 0 {
            return None;
        }
        let (sum, count) = (u64::from(sum), u64::from(count));
        let floor = sum * 10 / count;
        let midpoint = 2 * floor + 1;
        let up = match (sum * 20).cmp(&(midpoint * count)) {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => match quotient_vs_midpoint(sum, count, midpoint) {
                Ordering::Less => false,
                Ordering::Greater => true,
                Ordering::Equal => floor % 2 == 1,
            },
        };
        let tenths = u32::try_from(floor + u64::from(up)).ok()?;
        Some(Self { tenths })
    }

    pub fn value(self) -> f64 {
        f64::from(self.tenths) / 10.0
    }

    pub fn band(self) -> ColorBand {
        ColorBand::classify(self.value())
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tenths / 10, self.tenths % 10)
    }
}

/// Compare `sum / count` as an `f64` against `midpoint / 20`, exactly.
fn quotient_vs_midpoint(sum: u64, count: u64, midpoint: u64) -> Ordering {
    let quotient = sum as f64 / count as f64;
    let bits = quotient.to_bits();
    let mantissa = u128::from((bits & ((1 << 52) - 1)) | (1 << 52));
    let exponent = ((bits >> 52) & 0x7ff) as i32 - 1075;
    let (lhs, rhs) = if exponent >= 0 {
        ((20 * mantissa) << exponent, u128::from(midpoint))
    } else {
        (20 * mantissa, u128::from(midpoint) << exponent.unsigned_abs())
    };
    lhs.cmp(&rhs)
}

/// An article that passed the summary filter and received a score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredArticle {
    /// 1-based display number, assigned when the row was appended.
    pub number: usize,
    pub article: Article,
    pub score: Score,
}

/// Rows of one report, in fetch order, with the running aggregate.
///
/// Owned by a single pipeline run; nothing here outlives it.
#[derive(Debug, Default, Clone)]
pub struct ReportModel {
    rows: Vec<ScoredArticle>,
    sum: u32,
}

impl ReportModel {
    /// An empty model with no rows and no average.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a scored article and return its display number.
    pub fn append(&mut self, article: Article, score: Score) -> usize {
        let number = self.rows.len() + 1;
        self.sum += u32::from(score.value());
        self.rows.push(ScoredArticle {
            number,
            article,
            score,
        });
        number
    }

    /// Rounded mean of all appended scores, `None` while empty.
    pub fn average(&self) -> Option<Average> {
        Average::from_totals(self.sum, self.rows.len() as u32)
    }

    /// Rows in fetch order; `rows()[i].number == i + 1`.
    pub fn rows(&self) -> &[ScoredArticle] {
        &self.rows
    }

    /// Number of rows appended so far.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

}
