// src/clean/query.rs
//! Declarative pieces of the cleaning statements, rendered to DuckDB SQL.

use std::path::{Path, PathBuf};

use crate::duck::quote_literal;

/// Compression codec for every Parquet file these pipelines write.
pub const OUTPUT_CODEC: &str = "SNAPPY";

/// Columns carried through unchanged, in output order.
pub const PASS_THROUGH: &[&str] = &[
    "marketplace",
    "customer_id",
    "review_id",
    "product_id",
    "product_parent",
    "product_title",
    "product_category",
    "star_rating",
    "helpful_votes",
    "total_votes",
    "vine",
    "verified_purchase",
];

const REVIEW_DATE: &str = "(DATE '1970-01-01' + CAST(review_date AS INTEGER))";

/// Where the `source_file` column comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTag {
    /// A `source_file` column already present in the scanned relation.
    Column,
    /// A fixed file name.
    Literal(String),
}

/// The cleaned column layout: converted date, pass-through fields, both free
/// text fields as BLOB, and provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub with_year: bool,
    pub source: SourceTag,
}

impl Projection {
    pub fn select_list(&self) -> String {
        let mut cols = vec![format!("{} AS review_date", REVIEW_DATE)];
        if self.with_year {
            cols.push(format!(
                "EXTRACT(YEAR FROM {})::INTEGER AS review_year",
                REVIEW_DATE
            ));
        }
        cols.extend(PASS_THROUGH.iter().map(|c| c.to_string()));
        // blobs never fail the writer on bad encodings
        cols.push("CAST(review_headline AS BLOB) AS review_headline_blob".to_string());
        cols.push("CAST(review_body AS BLOB) AS review_body_blob".to_string());
        cols.push(match &self.source {
            SourceTag::Column => "source_file".to_string(),
            SourceTag::Literal(name) => format!("'{}' AS source_file", quote_literal(name)),
        });
        cols.join(",\n    ")
    }
}

/// Free-text fields that can be checked for blankness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    Category,
    Body,
}

impl TextColumn {
    pub fn raw(self) -> &'static str {
        match self {
            TextColumn::Category => "product_category",
            TextColumn::Body => "review_body",
        }
    }

    /// Name of the text-coerced copy; NULL when the value is not valid text.
    pub fn coerced(self) -> &'static str {
        match self {
            TextColumn::Category => "product_category_txt",
            TextColumn::Body => "review_body_txt",
        }
    }
}

/// Row validity rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// helpful votes never exceed total votes when both are set
    VoteConsistency,
    /// rating unset or within 1..=5
    RatingRange,
    /// coerced text set and not made up only of whitespace
    NonBlank(TextColumn),
}

impl RowFilter {
    pub fn sql(self) -> String {
        match self {
            RowFilter::VoteConsistency => {
                "(helpful_votes IS NULL OR total_votes IS NULL OR helpful_votes <= total_votes)"
                    .to_string()
            }
            RowFilter::RatingRange => "(star_rating IS NULL OR star_rating BETWEEN 1 AND 5)".to_string(),
            // any whitespace, not just spaces, counts as blank
            RowFilter::NonBlank(col) => format!(
                r"({c} IS NOT NULL AND NOT regexp_full_match({c}, '\s*'))",
                c = col.coerced()
            ),
        }
    }
}

/// How blank category/body text is treated by the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlankPolicy {
    /// Both blank checks always apply.
    #[default]
    Strict,
    /// Each check applies only when its flag is set.
    Flagged { category: bool, body: bool },
}

impl BlankPolicy {
    pub fn filters(self) -> Vec<RowFilter> {
        let (category, body) = match self {
            BlankPolicy::Strict => (true, true),
            BlankPolicy::Flagged { category, body } => (category, body),
        };
        let mut out = Vec::new();
        if category {
            out.push(RowFilter::NonBlank(TextColumn::Category));
        }
        if body {
            out.push(RowFilter::NonBlank(TextColumn::Body));
        }
        out
    }
}

/// Every rule the merge applies under `policy`, vote and rating checks first.
pub fn merge_filters(policy: BlankPolicy) -> Vec<RowFilter> {
    let mut filters = vec![RowFilter::VoteConsistency, RowFilter::RatingRange];
    filters.extend(policy.filters());
    filters
}

fn path_literal(p: &Path) -> String {
    format!("'{}'", quote_literal(&p.to_string_lossy()))
}

fn base_name(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| p.to_string_lossy().into_owned())
}

/// Wrap a query in a Parquet `COPY … TO`.
pub fn copy_sql(query: &str, out: &Path) -> String {
    format!(
        "COPY (\n{}\n) TO {} (FORMAT PARQUET, CODEC '{}')",
        query,
        path_literal(out),
        OUTPUT_CODEC
    )
}

/// One statement that scans all `files`, filters, projects and writes `out`.
pub fn merge_sql(files: &[PathBuf], policy: BlankPolicy, out: &Path) -> String {
    let file_list = files
        .iter()
        .map(|f| path_literal(f))
        .collect::<Vec<_>>()
        .join(", ");

    let coerced = [TextColumn::Category, TextColumn::Body]
        .iter()
        .map(|c| format!("try_cast({} AS VARCHAR) AS {}", c.raw(), c.coerced()))
        .collect::<Vec<_>>()
        .join(",\n      ");

    let projection = Projection {
        with_year: true,
        source: SourceTag::Column,
    };
    let predicate = merge_filters(policy)
        .into_iter()
        .map(RowFilter::sql)
        .collect::<Vec<_>>()
        .join("\n  AND ");

    let query = format!(
        "WITH base AS (\n  SELECT\n      *,\n      {coerced},\n      parse_filename(filename) AS source_file\n  \
         FROM read_parquet([{files}], filename = true)\n)\n\
         SELECT\n    {projection}\nFROM base\nWHERE {predicate}",
        coerced = coerced,
        files = file_list,
        projection = projection.select_list(),
        predicate = predicate,
    );
    copy_sql(&query, out)
}

/// One select per file taking its first `n` rows by review-id hash, unioned in
/// file order.
pub fn sample_sql(files: &[PathBuf], n: u64, out: &Path) -> String {
    let selects = files
        .iter()
        .map(|f| {
            let projection = Projection {
                with_year: false,
                source: SourceTag::Literal(base_name(f)),
            };
            format!(
                "(\n  SELECT\n    {}\n  FROM read_parquet({})\n  ORDER BY hash(review_id), review_id\n  LIMIT {}\n)",
                projection.select_list(),
                path_literal(f),
                n
            )
        })
        .collect::<Vec<_>>();
    copy_sql(&selects.join("\nUNION ALL\n"), out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_and_flagged_policies_differ() {
        assert_eq!(
            merge_filters(BlankPolicy::Strict),
            vec![
                RowFilter::VoteConsistency,
                RowFilter::RatingRange,
                RowFilter::NonBlank(TextColumn::Category),
                RowFilter::NonBlank(TextColumn::Body),
            ]
        );
        assert_eq!(
            merge_filters(BlankPolicy::Flagged {
                category: false,
                body: true
            }),
            vec![
                RowFilter::VoteConsistency,
                RowFilter::RatingRange,
                RowFilter::NonBlank(TextColumn::Body),
            ]
        );
        assert!(BlankPolicy::Flagged {
            category: false,
            body: false
        }
        .filters()
        .is_empty());
    }

    #[test]
    fn projection_casts_text_to_blob() {
        let list = Projection {
            with_year: true,
            source: SourceTag::Literal("it's.parquet".into()),
        }
        .select_list();
        assert!(list.contains("CAST(review_body AS BLOB) AS review_body_blob"));
        assert!(list.contains("AS review_year"));
        assert!(list.ends_with("'it''s.parquet' AS source_file"));
    }

    #[test]
    fn merge_sql_uses_one_scan_and_codec() {
        let files = vec![PathBuf::from("/d/a.parquet"), PathBuf::from("/d/b.parquet")];
        let sql = merge_sql(&files, BlankPolicy::Strict, Path::new("/o/out.parquet"));
        assert!(sql.starts_with("COPY ("));
        assert_eq!(sql.matches("read_parquet(").count(), 1);
        assert!(sql.contains("read_parquet(['/d/a.parquet', '/d/b.parquet'], filename = true)"));
        assert!(sql.contains(r"NOT regexp_full_match(review_body_txt, '\s*')"));
        assert!(sql.ends_with("TO '/o/out.parquet' (FORMAT PARQUET, CODEC 'SNAPPY')"));
    }

    #[test]
    fn sample_sql_has_one_limited_select_per_file() {
        let files = vec![PathBuf::from("/d/a.parquet"), PathBuf::from("/d/b.parquet")];
        let sql = sample_sql(&files, 25, Path::new("out.parquet"));
        assert_eq!(sql.matches("LIMIT 25").count(), 2);
        assert_eq!(sql.matches("UNION ALL").count(), 1);
        assert!(sql.contains("'a.parquet' AS source_file"));
        assert!(!sql.contains("WHERE"));
        assert!(!sql.contains("review_year"));
    }
}
