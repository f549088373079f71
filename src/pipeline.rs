//! Report assembly: fetch, filter, score, aggregate, render.
//!
//! ```text
//! INIT -> FETCHING -> SCORING -> RENDERING -> DONE
//!            |                       |
//!            +-------> FAILED <------+
//! ```
//!
//! A fetch error or a render error is fatal. Scoring never fails the run: a
//! provider failure degrades to the scorer's fallback. A fetch that returns no
//! articles ends the run as [`RunOutcome::NothingToReport`] without rendering.

use std::fmt;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument};

use crate::api::CompletionProvider;
use crate::error::PipelineError;
use crate::models::{Article, Average, ReportModel};
use crate::outputs::html::ReportRenderer;
use crate::sentiment::{Scoring, SentimentScorer};
use crate::sources::{ArticleSource, SearchRequest};

/// Pipeline states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Fetching,
    Scoring,
    Rendering,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::Fetching => "FETCHING",
            Stage::Scoring => "SCORING",
            Stage::Rendering => "RENDERING",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Counters describing one scoring pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Articles returned by the search provider.
    pub fetched: usize,
    /// Articles dropped for lacking a summary.
    pub skipped: usize,
    /// Articles whose score came from the fallback policy.
    pub degraded: usize,
    /// Articles dropped because the fallback policy omits them.
    pub omitted: usize,
}

/// Result of a successful run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The search returned no articles; nothing was rendered.
    NothingToReport,
    /// A report was rendered.
    Rendered(RenderedReport),
}

#[derive(Debug)]
pub struct RenderedReport {
    pub html: Vec<u8>,
    pub rows: usize,
    pub average: Option<Average>,
    pub stats: RunStats,
}

/// Composes an article source, a scorer, and a renderer for one company.
pub struct Pipeline<S, P> {
    source: S,
    scorer: SentimentScorer<P>,
    renderer: ReportRenderer,
    concurrency: usize,
}

impl<S, P> Pipeline<S, P>
where
    S: ArticleSource,
    P: CompletionProvider,
{
    pub fn new(source: S, scorer: SentimentScorer<P>, renderer: ReportRenderer) -> Self {
        Self {
            source,
            scorer,
            renderer,
            concurrency: 1,
        }
    }

    /// Allow up to `n` scoring calls in flight. Row order is unaffected.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Run the whole pipeline once.
    #[instrument(level = "info", skip_all, fields(query = %request.query))]
    pub async fn run(&self, request: &SearchRequest) -> Result<RunOutcome, PipelineError> {
        let t0 = Instant::now();
        let mut stage = Stage::Init;
        transition(&mut stage, Stage::Fetching);

        let articles = match self.source.fetch(request).await {
            Ok(articles) => articles,
            Err(e) => {
                transition(&mut stage, Stage::Failed);
                error!(error = %e, "Fetch failed; aborting run");
                return Err(e.into());
            }
        };

        if articles.is_empty() {
            transition(&mut stage, Stage::Done);
            info!("No articles found; nothing to report");
            return Ok(RunOutcome::NothingToReport);
        }

        transition(&mut stage, Stage::Scoring);
        let (model, stats) = self.assemble(articles).await;

        transition(&mut stage, Stage::Rendering);
        let html = match self.renderer.render(&model) {
            Ok(html) => html,
            Err(e) => {
                transition(&mut stage, Stage::Failed);
                error!(error = %e, "Render failed; aborting run");
                return Err(e.into());
            }
        };

        transition(&mut stage, Stage::Done);
        let average = model.average();
        info!(
            rows = model.len(),
            fetched = stats.fetched,
            skipped = stats.skipped,
            degraded = stats.degraded,
            omitted = stats.omitted,
            average = %average.map(|a| a.to_string()).unwrap_or_else(|| "-".to_string()),
            elapsed_ms = t0.elapsed().as_millis(),
            "Report assembled"
        );

        Ok(RunOutcome::Rendered(RenderedReport {
            html,
            rows: model.len(),
            average,
            stats,
        }))
    }

    /// Filter, score, and append every article in fetch order.
    async fn assemble(&self, articles: Vec<Article>) -> (ReportModel, RunStats) {
        let mut stats = RunStats {
            fetched: articles.len(),
            ..RunStats::default()
        };

        let (kept, dropped): (Vec<Article>, Vec<Article>) =
            articles.into_iter().partition(Article::has_summary);
        stats.skipped = dropped.len();
        for article in &dropped {
            debug!(title = %article.title, link = %article.link, "Skipping article without summary");
        }

        let scorings: Vec<(Article, Scoring)> = stream::iter(kept)
            .map(|article| async move {
                let scoring = self.scorer.score(&article.title, &article.summary).await;
                (article, scoring)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut model = ReportModel::new();
        for (article, scoring) in scorings {
            if scoring.is_degraded() {
                stats.degraded += 1;
            }
            match scoring.score() {
                Some(score) => {
                    let number = model.append(article, score);
                    debug!(number, %score, "Appended row");
                }
                None => stats.omitted += 1,
            }
        }
        (model, stats)
    }
}

fn transition(stage: &mut Stage, next: Stage) {
    info!(from = %stage, to = %next, "Pipeline stage");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ScoreError};
    use crate::outputs::document::Document;
    use crate::outputs::html::{AGGREGATE_ID, DEFAULT_TEMPLATE};
    use crate::sentiment::FallbackPolicy;
    use std::cell::Cell;
    use std::collections::HashMap;

    struct FakeSource(Result<Vec<Article>, u16>);

    impl ArticleSource for FakeSource {
        async fn fetch(&self, _request: &SearchRequest) -> Result<Vec<Article>, FetchError> {
            match &self.0 {
                Ok(articles) => Ok(articles.clone()),
                Err(code) => Err(FetchError::Status {
                    status: reqwest::StatusCode::from_u16(*code).unwrap(),
                    body: "boom".to_string(),
                }),
            }
        }
    }

    /// Answers by title; unknown titles fail the call.
    struct ByTitle {
        answers: HashMap<&'static str, &'static str>,
        calls: Cell<usize>,
    }

    impl ByTitle {
        fn new(answers: &[(&'static str, &'static str)]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl CompletionProvider for ByTitle {
        async fn complete(&self, prompt: &str) -> Result<String, ScoreError> {
            self.calls.set(self.calls.get() + 1);
            self.answers
                .iter()
                .find(|(title, _)| prompt.contains(&format!("Title: {title} ")))
                .map(|(_, answer)| answer.to_string())
                .ok_or(ScoreError::NoChoices)
        }
    }

    fn article(title: &str, summary: &str) -> Article {
        Article {
            title: title.to_string(),
            summary: summary.to_string(),
            link: format!("https://news.test/{title}"),
            ..Article::default()
        }
    }

    fn pipeline(
        articles: Result<Vec<Article>, u16>,
        provider: ByTitle,
        fallback: FallbackPolicy,
    ) -> Pipeline<FakeSource, ByTitle> {
        Pipeline::new(
            FakeSource(articles),
            SentimentScorer::new(provider, "S-OIL", "ko", fallback),
            ReportRenderer::new(DEFAULT_TEMPLATE).unwrap(),
        )
    }

    fn request() -> SearchRequest {
        SearchRequest::for_company("S-OIL", "ko")
    }

    fn rendered(outcome: RunOutcome) -> (RenderedReport, Document) {
        match outcome {
            RunOutcome::Rendered(report) => {
                let doc = Document::parse(std::str::from_utf8(&report.html).unwrap());
                (report, doc)
            }
            RunOutcome::NothingToReport => panic!("expected a rendered report"),
        }
    }

    fn row_numbers(doc: &Document) -> Vec<String> {
        doc.elements_by_tag("p")
            .into_iter()
            .map(|p| doc.text(p))
            .collect()
    }

    fn row_titles(doc: &Document) -> Vec<String> {
        doc.elements_by_tag("table")
            .into_iter()
            .filter(|t| doc.attr(*t, "id").is_none())
            .map(|t| doc.text(doc.descendants_by_tag(t, "td")[0]))
            .collect()
    }

    #[tokio::test]
    async fn test_two_articles_scores_nine_and_five() {
        let p = pipeline(
            Ok(vec![article("a", "sa"), article("b", "sb")]),
            ByTitle::new(&[("a", "9"), ("b", "5")]),
            FallbackPolicy::Omit,
        );
        let (report, doc) = rendered(p.run(&request()).await.unwrap());
        assert_eq!(report.rows, 2);
        assert_eq!(report.average.unwrap().to_string(), "7.0");
        assert_eq!(row_numbers(&doc), vec!["1.", "2."]);
        let aggregate = doc.find_by_id(AGGREGATE_ID).unwrap();
        assert_eq!(doc.text(aggregate).trim(), "Average PI: 7.0");
        assert!(doc.attr(aggregate, "style").unwrap().contains("#FFA500"));
    }

    #[tokio::test]
    async fn test_empty_summary_leaves_no_gap() {
        let p = pipeline(
            Ok(vec![article("a", "sa"), article("b", ""), article("c", "sc")]),
            ByTitle::new(&[("a", "8"), ("b", "1"), ("c", "6")]),
            FallbackPolicy::Omit,
        );
        let (report, doc) = rendered(p.run(&request()).await.unwrap());
        assert_eq!(report.stats.skipped, 1);
        assert_eq!(p.scorer_calls(), 2);
        assert_eq!(row_numbers(&doc), vec!["1.", "2."]);
        assert_eq!(row_titles(&doc), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_fetch_error_is_fatal() {
        let p = pipeline(Err(503), ByTitle::new(&[]), FallbackPolicy::Random);
        let err = p.run(&request()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(_)));
        assert_eq!(p.scorer_calls(), 0);
    }

    #[tokio::test]
    async fn test_no_articles_is_nothing_to_report() {
        let p = pipeline(Ok(vec![]), ByTitle::new(&[]), FallbackPolicy::Random);
        assert!(matches!(
            p.run(&request()).await.unwrap(),
            RunOutcome::NothingToReport
        ));
    }

    #[tokio::test]
    async fn test_scorer_failure_degrades_not_fails() {
        let p = pipeline(
            Ok(vec![article("a", "sa"), article("unknown", "su")]),
            ByTitle::new(&[("a", "Score: 10")]),
            FallbackPolicy::Constant(crate::models::Score::new(4).unwrap()),
        );
        let (report, doc) = rendered(p.run(&request()).await.unwrap());
        assert_eq!(report.rows, 2);
        assert_eq!(report.stats.degraded, 1);
        // "10" reads as 1; fallback gives 4.
        assert_eq!(report.average.unwrap().to_string(), "2.5");
        assert_eq!(row_titles(&doc), vec!["a", "unknown"]);
    }

    #[tokio::test]
    async fn test_omit_fallback_drops_row_without_gap() {
        let p = pipeline(
            Ok(vec![article("x", "sx"), article("a", "sa"), article("b", "sb")]),
            ByTitle::new(&[("a", "7"), ("b", "7")]),
            FallbackPolicy::Omit,
        );
        let (report, doc) = rendered(p.run(&request()).await.unwrap());
        assert_eq!(report.stats.omitted, 1);
        assert_eq!(row_numbers(&doc), vec!["1.", "2."]);
        assert_eq!(row_titles(&doc), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_all_omitted_renders_without_average() {
        let p = pipeline(
            Ok(vec![article("x", "sx")]),
            ByTitle::new(&[]),
            FallbackPolicy::Omit,
        );
        let (report, doc) = rendered(p.run(&request()).await.unwrap());
        assert_eq!(report.rows, 0);
        assert!(report.average.is_none());
        assert!(row_numbers(&doc).is_empty());
        let aggregate = doc.find_by_id(AGGREGATE_ID).unwrap();
        assert_eq!(doc.text(aggregate).trim(), "Average PI: -");
    }

    #[tokio::test]
    async fn test_concurrent_scoring_keeps_fetch_order() {
        let titles = ["t0", "t1", "t2", "t3", "t4", "t5"];
        let articles = titles.iter().map(|t| article(t, "s")).collect();
        let answers: Vec<(&'static str, &'static str)> = titles.iter().map(|t| (*t, "6")).collect();
        let p = pipeline(Ok(articles), ByTitle::new(&answers), FallbackPolicy::Omit)
            .with_concurrency(4);
        let (_, doc) = rendered(p.run(&request()).await.unwrap());
        assert_eq!(row_titles(&doc), titles.to_vec());
        assert_eq!(row_numbers(&doc), vec!["1.", "2.", "3.", "4.", "5.", "6."]);
    }

    impl Pipeline<FakeSource, ByTitle> {
        fn scorer_calls(&self) -> usize {
            self.scorer.provider().calls.get()
        }
    }
}
