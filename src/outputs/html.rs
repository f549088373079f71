//! HTML report rendering.
//!
//! A template must contain:
//!
//! - a row prototype, the element with `id="table"`, holding at least seven
//!   `<td>` cells in this order: title, score, author, agency, date, summary, link;
//! - an aggregate display, the element with `id="average"` (or else the first
//!   `<table>` that is not the prototype), whose first `<td>` carries the label.
//!   The mark may also sit on the label cell itself; the band color always goes
//!   on the enclosing `<table>`.
//!
//! For each scored article the prototype is deep-copied, filled in, and appended to
//! `<body>` after a `<p>N.</p><br>` number marker. The prototype itself never
//! appears in the output.
//!
//! ```text
//! <p>1.</p><br>
//! <table> title | PI | author | agency | date | summary | link </table>
//! <p>2.</p><br>
//! ...
//! ```

use ego_tree::NodeId;
use tracing::{debug, instrument};

use super::document::Document;
use crate::error::RenderError;
use crate::models::{Average, ReportModel, ScoredArticle};

pub const ROW_PROTOTYPE_ID: &str = "table";
pub const AGGREGATE_ID: &str = "average";
pub const AVERAGE_LABEL: &str = "Average PI";
pub const ROW_CELLS: usize = 7;

const NUMBER_STYLE: &str = "margin-left: auto; margin-right: auto; margin-top: 10px; \
                            margin-bottom: 10px; font-family: Arial, sans-serif; \
                            font-size: 14px; width: 50%";

/// The template bundled with the binary.
pub const DEFAULT_TEMPLATE: &str = include_str!("../../templates/report.html");

/// Cell positions inside the row prototype.
mod cell {
    pub const TITLE: usize = 0;
    pub const SCORE: usize = 1;
    pub const AUTHOR: usize = 2;
    pub const AGENCY: usize = 3;
    pub const DATE: usize = 4;
    pub const SUMMARY: usize = 5;
    pub const LINK: usize = 6;
}

/// A parsed, validated report template.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    document: Document,
}

/// Where the pieces of a template live once the prototype is detached.
struct Layout {
    prototype: NodeId,
    aggregate: NodeId,
    body: NodeId,
}

impl ReportRenderer {
    /// Parse `template` and check it has every marker a report needs.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] naming the first missing marker: the row
    /// prototype, its seven cells, the aggregate display, or `<body>`.
    pub fn new(template: &str) -> Result<Self, RenderError> {
        let document = Document::parse(template);
        split_template(&mut document.clone())?;
        Ok(Self { document })
    }

    /// Render `model` into a complete HTML document.
    ///
    /// Identical inputs always produce identical bytes.
    #[instrument(level = "info", skip_all, fields(rows = model.len()))]
    pub fn render(&self, model: &ReportModel) -> Result<Vec<u8>, RenderError> {
        let mut document = self.document.clone();
        let layout = split_template(&mut document)?;

        if let Some(average) = model.average() {
            fill_aggregate(&mut document, layout.aggregate, average);
            debug!(%average, band = ?average.band(), "Filled aggregate display");
        }

        for row in model.rows() {
            let marker = document.append_element(layout.body, "p", &[("style", NUMBER_STYLE)]);
            document.append_text(marker, &format!("{}.", row.number));
            document.append_element(layout.body, "br", &[]);
            let stamped = stamp_row(&mut document, layout.prototype, row)?;
            document.append_child(layout.body, stamped);
        }

        document
            .to_bytes()
            .map_err(|e| RenderError::Serialize(e.to_string()))
    }
}

/// Detach the row prototype from `document` and validate the rest of the template.
fn split_template(document: &mut Document) -> Result<Layout, RenderError> {
    let prototype = document
        .find_by_id(ROW_PROTOTYPE_ID)
        .ok_or_else(|| RenderError::MissingPrototype(ROW_PROTOTYPE_ID.to_string()))?;
    document.detach(prototype);
    document.remove_attr(prototype, "id");

    let found = document.descendants_by_tag(prototype, "td").len();
    if found < ROW_CELLS {
        return Err(RenderError::MissingCells {
            found,
            expected: ROW_CELLS,
        });
    }
    let aggregate = find_aggregate(document)
        .ok_or_else(|| RenderError::MissingAggregate(AGGREGATE_ID.to_string()))?;
    let body = document.body().ok_or(RenderError::MissingBody)?;
    Ok(Layout {
        prototype,
        aggregate,
        body,
    })
}

/// Must be called after the prototype has been detached.
fn find_aggregate(document: &Document) -> Option<NodeId> {
    document
        .find_by_id(AGGREGATE_ID)
        .or_else(|| document.first_by_tag("table"))
}

/// The label goes into the first `<strong>` of the marked element (or of its
/// first cell when the mark is on a table). The band color goes on the
/// enclosing `<table>`, whichever element carries the mark.
fn fill_aggregate(document: &mut Document, aggregate: NodeId, average: Average) {
    let label = format!("{AVERAGE_LABEL}: {average}");
    let cell = if document.is_tag(aggregate, "table") {
        document.first_below(aggregate, "td").unwrap_or(aggregate)
    } else {
        aggregate
    };
    let target = strong_or_self(document, cell);
    document.set_text(target, &label);

    let container = document.closest(aggregate, "table").unwrap_or(aggregate);
    document.set_style(container, "background-color", average.band().color());
}

fn stamp_row(
    document: &mut Document,
    prototype: NodeId,
    row: &ScoredArticle,
) -> Result<NodeId, RenderError> {
    let table = document
        .deep_copy(prototype)
        .ok_or_else(|| RenderError::MissingPrototype(ROW_PROTOTYPE_ID.to_string()))?;
    let cells = document.descendants_by_tag(table, "td");
    if cells.len() < ROW_CELLS {
        return Err(RenderError::MissingCells {
            found: cells.len(),
            expected: ROW_CELLS,
        });
    }
    let article = &row.article;

    document.append_text(cells[cell::TITLE], &article.title);
    let score = strong_or_self(document, cells[cell::SCORE]);
    document.append_text(score, &row.score.to_string());
    document.set_style(cells[cell::SCORE], "background-color", row.score.band().color());
    document.append_text(cells[cell::AUTHOR], &article.author);
    document.append_text(cells[cell::AGENCY], &article.source);
    document.append_text(cells[cell::DATE], article.display_date());
    document.append_text(cells[cell::SUMMARY], &article.summary);
    let link = document.append_element(cells[cell::LINK], "a", &[("href", article.link.as_str())]);
    document.append_text(link, &article.link);
    Ok(table)
}

/// The first `<strong>` inside `node`, or `node` itself.
fn strong_or_self(document: &Document, node: NodeId) -> NodeId {
    document.first_below(node, "strong").unwrap_or(node)
}
