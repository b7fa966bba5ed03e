//! The four concrete query definitions and their typed runners.
//!
//! Each query mirrors one of the original chart transform pipelines:
//!
//! 1. genre totals (grouped sum of global sales)
//! 2. timeline by platform, filtered by a genre parameter
//! 3. regional sales by platform (fold + grouped sum, optionally top-N)
//! 4. Japan share scatter set (derived ratio, per-game granularity)
//!
//! A `QueryDefinition` is an immutable stage list; parameters are supplied
//! when the definition is built, per invocation. The typed runners convert
//! records into pipeline rows, execute the stages, and project the output
//! into the result-contract structs in `domain`.

use std::collections::BTreeSet;

use crate::domain::{
    Genre, GenreTotalRow, JapanSharePoint, Record, Region, RegionSalesRow, TimelinePoint,
};
use crate::pipeline::{
    AggregateOp, CalcExpr, CompareOp, Direction, Predicate, Row, Stage, StageError, Value,
};

/// Field names flowing through the pipelines.
///
/// Source fields keep the dataset's column names; derived fields match the
/// names the original chart specs used.
pub mod fields {
    pub const NAME: &str = "Name";
    pub const PLATFORM: &str = "Platform";
    pub const YEAR: &str = "Year";
    pub const GENRE: &str = "Genre";
    pub const PUBLISHER: &str = "Publisher";
    pub const NA_SALES: &str = "NA_Sales";
    pub const EU_SALES: &str = "EU_Sales";
    pub const JP_SALES: &str = "JP_Sales";
    pub const OTHER_SALES: &str = "Other_Sales";
    pub const GLOBAL_SALES: &str = "Global_Sales";

    pub const YEAR_NUM: &str = "YearNum";
    pub const REGION: &str = "Region";
    pub const SALES: &str = "Sales";
    pub const TOTAL_GLOBAL_SALES: &str = "Total_Global_Sales";
    pub const TOTAL_SALES: &str = "Total_Sales";
    pub const PLATFORM_TOTAL: &str = "Platform_Total";
    pub const PLATFORM_RANK: &str = "Platform_Rank";
    pub const JP_SHARE: &str = "JP_Share";
}

use fields::*;

/// An ordered, immutable sequence of stages with a name for diagnostics.
#[derive(Debug, Clone)]
pub struct QueryDefinition {
    name: &'static str,
    stages: Vec<Stage>,
}

impl QueryDefinition {
    pub fn new(name: &'static str, stages: Vec<Stage>) -> QueryDefinition {
        QueryDefinition { name, stages }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Validate every stage against the schema, returning the output schema.
    pub fn validate(&self, input_schema: &BTreeSet<String>) -> Result<BTreeSet<String>, StageError> {
        let mut schema = input_schema.clone();
        for stage in &self.stages {
            stage.validate(&mut schema)?;
        }
        Ok(schema)
    }

    /// Validate, then run the stage list over the input rows.
    ///
    /// The input is never mutated; each stage allocates fresh output rows, so
    /// definitions can run concurrently over a shared record set.
    pub fn run(&self, input: &[Row], input_schema: &BTreeSet<String>) -> Result<Vec<Row>, StageError> {
        self.validate(input_schema)?;
        let mut rows = input.to_vec();
        for stage in &self.stages {
            rows = stage.apply(&rows);
        }
        Ok(rows)
    }
}

/// The schema of rows produced by `record_to_row`.
pub fn record_schema() -> BTreeSet<String> {
    [
        NAME, PLATFORM, YEAR, GENRE, PUBLISHER, NA_SALES, EU_SALES, JP_SALES, OTHER_SALES,
        GLOBAL_SALES,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Convert a typed record into a pipeline row.
pub fn record_to_row(record: &Record) -> Row {
    let mut row = Row::new();
    row.set(NAME, Value::str(record.name.clone()));
    row.set(PLATFORM, Value::str(record.platform.clone()));
    row.set(
        YEAR,
        match record.year {
            Some(y) => Value::Num(y as f64),
            None => Value::Null,
        },
    );
    row.set(GENRE, Value::str(record.genre.clone()));
    row.set(PUBLISHER, Value::str(record.publisher.clone()));
    row.set(NA_SALES, Value::Num(record.na_sales));
    row.set(EU_SALES, Value::Num(record.eu_sales));
    row.set(JP_SALES, Value::Num(record.jp_sales));
    row.set(OTHER_SALES, Value::Num(record.other_sales));
    row.set(GLOBAL_SALES, Value::Num(record.global_sales));
    row
}

fn to_rows(records: &[Record]) -> Vec<Row> {
    records.iter().map(record_to_row).collect()
}

/// Query 1: total global sales per genre.
pub fn genre_totals() -> QueryDefinition {
    QueryDefinition::new(
        "genre_totals",
        vec![Stage::Aggregate {
            op: AggregateOp::Sum,
            field: GLOBAL_SALES.to_string(),
            output: TOTAL_GLOBAL_SALES.to_string(),
            group_by: vec![GENRE.to_string()],
        }],
    )
}

/// Query 2: yearly global sales per platform for one genre.
pub fn timeline(genre: Genre) -> QueryDefinition {
    QueryDefinition::new(
        "timeline",
        vec![
            Stage::Filter(Predicate::NotNull {
                field: YEAR.to_string(),
            }),
            Stage::Calculate {
                expr: CalcExpr::ToNumber {
                    field: YEAR.to_string(),
                },
                output: YEAR_NUM.to_string(),
            },
            Stage::Filter(Predicate::TextEq {
                field: GENRE.to_string(),
                value: genre.label().to_string(),
            }),
            Stage::Aggregate {
                op: AggregateOp::Sum,
                field: GLOBAL_SALES.to_string(),
                output: TOTAL_GLOBAL_SALES.to_string(),
                group_by: vec![YEAR_NUM.to_string(), PLATFORM.to_string()],
            },
        ],
    )
}

/// Query 3: regional sales per platform.
///
/// The platform grand total is always broadcast onto each (platform, region)
/// row. When `top` is set, platforms are ranked by that total within each
/// region partition (so a platform's rank is its distinct-platform rank) and
/// only the top-N survive; `None` is the unranked variant.
pub fn regional_sales(top: Option<usize>) -> QueryDefinition {
    let mut stages = vec![
        Stage::Fold {
            fields: Region::ALL.iter().map(|r| r.column().to_string()).collect(),
            key_output: REGION.to_string(),
            value_output: SALES.to_string(),
        },
        Stage::Aggregate {
            op: AggregateOp::Sum,
            field: SALES.to_string(),
            output: TOTAL_SALES.to_string(),
            group_by: vec![PLATFORM.to_string(), REGION.to_string()],
        },
        Stage::JoinAggregate {
            op: AggregateOp::Sum,
            field: TOTAL_SALES.to_string(),
            output: PLATFORM_TOTAL.to_string(),
            group_by: vec![PLATFORM.to_string()],
        },
    ];
    if let Some(n) = top {
        stages.push(Stage::Rank {
            order_by: PLATFORM_TOTAL.to_string(),
            direction: Direction::Descending,
            output: PLATFORM_RANK.to_string(),
            partition_by: vec![REGION.to_string()],
        });
        stages.push(Stage::TopN {
            rank_field: PLATFORM_RANK.to_string(),
            n,
        });
    }
    QueryDefinition::new("regional_sales", stages)
}

/// Query 4: Japan share of global sales, per game.
pub fn japan_share(min_global: f64) -> QueryDefinition {
    QueryDefinition::new(
        "japan_share",
        vec![
            Stage::Calculate {
                expr: CalcExpr::Ratio {
                    numerator: JP_SALES.to_string(),
                    denominator: GLOBAL_SALES.to_string(),
                },
                output: JP_SHARE.to_string(),
            },
            Stage::Filter(Predicate::IsValidNumber {
                field: JP_SHARE.to_string(),
            }),
            Stage::Filter(Predicate::Compare {
                field: GLOBAL_SALES.to_string(),
                op: CompareOp::Ge,
                value: min_global,
            }),
        ],
    )
}

/// Run Query 1 and project into the result contract.
///
/// Display ordering: descending total, ties broken by canonical genre-label
/// ordering.
pub fn run_genre_totals(records: &[Record]) -> Result<Vec<GenreTotalRow>, StageError> {
    let rows = genre_totals().run(&to_rows(records), &record_schema())?;
    let mut out: Vec<GenreTotalRow> = rows
        .iter()
        .map(|row| GenreTotalRow {
            genre: row.text(GENRE).unwrap_or_default().to_string(),
            total_global_sales: row.num(TOTAL_GLOBAL_SALES).unwrap_or(0.0),
        })
        .collect();
    out.sort_by(|a, b| {
        b.total_global_sales
            .total_cmp(&a.total_global_sales)
            .then_with(|| Genre::canonical_index(&a.genre).cmp(&Genre::canonical_index(&b.genre)))
            .then_with(|| a.genre.cmp(&b.genre))
    });
    Ok(out)
}

/// Run Query 2 and project into the result contract.
///
/// The genre label is validated against the fixed enumeration; an
/// unrecognized label yields an empty result, not an error.
pub fn run_timeline(records: &[Record], genre_label: &str) -> Result<Vec<TimelinePoint>, StageError> {
    let Some(genre) = Genre::from_label(genre_label) else {
        return Ok(Vec::new());
    };
    let rows = timeline(genre).run(&to_rows(records), &record_schema())?;
    let mut out: Vec<TimelinePoint> = rows
        .iter()
        .filter_map(|row| {
            let year = row.num(YEAR_NUM)? as i32;
            Some(TimelinePoint {
                year,
                platform: row.text(PLATFORM)?.to_string(),
                total_global_sales: row.num(TOTAL_GLOBAL_SALES).unwrap_or(0.0),
            })
        })
        .collect();
    out.sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.platform.cmp(&b.platform)));
    Ok(out)
}

/// Run Query 3 and project into the result contract.
///
/// Display ordering: descending platform total, then canonical region order.
pub fn run_regional_sales(
    records: &[Record],
    top: Option<usize>,
) -> Result<Vec<RegionSalesRow>, StageError> {
    let rows = regional_sales(top).run(&to_rows(records), &record_schema())?;
    let mut out: Vec<RegionSalesRow> = rows
        .iter()
        .filter_map(|row| {
            let region = Region::from_column(row.text(REGION)?)?;
            Some(RegionSalesRow {
                platform: row.text(PLATFORM)?.to_string(),
                region,
                total_sales: row.num(TOTAL_SALES).unwrap_or(0.0),
                platform_total: row.num(PLATFORM_TOTAL).unwrap_or(0.0),
            })
        })
        .collect();
    out.sort_by(|a, b| {
        b.platform_total
            .total_cmp(&a.platform_total)
            .then_with(|| a.platform.cmp(&b.platform))
            .then_with(|| region_index(a.region).cmp(&region_index(b.region)))
    });
    Ok(out)
}

fn region_index(region: Region) -> usize {
    Region::ALL.iter().position(|r| *r == region).unwrap_or(usize::MAX)
}

/// Run Query 4 and project into the result contract.
///
/// Per-game granularity: input record order is preserved.
pub fn run_japan_share(
    records: &[Record],
    min_global: f64,
) -> Result<Vec<JapanSharePoint>, StageError> {
    let rows = japan_share(min_global).run(&to_rows(records), &record_schema())?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(JapanSharePoint {
                name: row.text(NAME)?.to_string(),
                platform: row.text(PLATFORM)?.to_string(),
                genre: row.text(GENRE)?.to_string(),
                publisher: row.text(PUBLISHER)?.to_string(),
                global_sales: row.num(GLOBAL_SALES)?,
                jp_sales: row.num(JP_SALES).unwrap_or(0.0),
                jp_share: row.num(JP_SHARE)?,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, platform: &str, year: Option<i32>, genre: &str, sales: [f64; 5]) -> Record {
        Record {
            name: name.to_string(),
            platform: platform.to_string(),
            year,
            genre: genre.to_string(),
            publisher: "Pub".to_string(),
            na_sales: sales[0],
            eu_sales: sales[1],
            jp_sales: sales[2],
            other_sales: sales[3],
            global_sales: sales[4],
        }
    }

    #[test]
    fn genre_totals_sums_per_genre() {
        let records = vec![
            record("A", "Wii", Some(2006), "Action", [0.0, 0.0, 0.0, 0.0, 5.0]),
            record("B", "PS2", Some(2004), "Action", [0.0, 0.0, 0.0, 0.0, 3.0]),
            record("C", "X360", Some(2008), "Sports", [0.0, 0.0, 0.0, 0.0, 2.0]),
        ];
        let out = run_genre_totals(&records).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].genre, "Action");
        assert_eq!(out[0].total_global_sales, 8.0);
        assert_eq!(out[1].genre, "Sports");
        assert_eq!(out[1].total_global_sales, 2.0);
    }

    #[test]
    fn genre_totals_breaks_ties_by_canonical_order() {
        let records = vec![
            record("A", "Wii", None, "Strategy", [0.0, 0.0, 0.0, 0.0, 2.0]),
            record("B", "Wii", None, "Shooter", [0.0, 0.0, 0.0, 0.0, 2.0]),
        ];
        let out = run_genre_totals(&records).unwrap();
        // Equal totals: Shooter precedes Strategy in the canonical enumeration.
        assert_eq!(out[0].genre, "Shooter");
        assert_eq!(out[1].genre, "Strategy");
    }

    #[test]
    fn timeline_excludes_null_years_and_filters_by_genre() {
        let records = vec![
            record("A", "PS", Some(1998), "Action", [0.0, 0.0, 0.0, 0.0, 4.0]),
            record("B", "PS", None, "Action", [0.0, 0.0, 0.0, 0.0, 9.0]),
            record("C", "PS", Some(1998), "Sports", [0.0, 0.0, 0.0, 0.0, 2.0]),
            record("D", "N64", Some(1998), "Action", [0.0, 0.0, 0.0, 0.0, 1.0]),
        ];
        let out = run_timeline(&records, "Action").unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].year, 1998);
        assert_eq!(out[0].platform, "N64");
        assert_eq!(out[0].total_global_sales, 1.0);
        assert_eq!(out[1].platform, "PS");
        assert_eq!(out[1].total_global_sales, 4.0);
    }

    #[test]
    fn timeline_unknown_genre_is_empty_not_an_error() {
        let records = vec![record("A", "PS", Some(1998), "Action", [0.0, 0.0, 0.0, 0.0, 4.0])];
        let out = run_timeline(&records, "Nonexistent").unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn regional_sales_folds_and_sums_per_region() {
        let records = vec![
            record("A", "Wii", None, "Sports", [3.0, 2.0, 1.0, 0.5, 6.5]),
            record("B", "Wii", None, "Racing", [1.0, 1.0, 0.0, 0.5, 2.5]),
        ];
        let out = run_regional_sales(&records, None).unwrap();
        assert_eq!(out.len(), 4);
        let na = out.iter().find(|r| r.region == Region::Na).unwrap();
        assert_eq!(na.total_sales, 4.0);
        // fold -> aggregate round trip: the platform total equals the row-wise
        // sum of the wide regional columns.
        for r in &out {
            assert_eq!(r.platform_total, 9.0);
        }
    }

    #[test]
    fn regional_sales_top_n_keeps_n_platforms() {
        let mut records = Vec::new();
        for (platform, scale) in [("Wii", 5.0), ("PS2", 4.0), ("DS", 3.0), ("PC", 2.0)] {
            records.push(record(
                "G",
                platform,
                None,
                "Misc",
                [scale, scale, scale, scale, scale * 4.0],
            ));
        }
        let out = run_regional_sales(&records, Some(2)).unwrap();
        let platforms: BTreeSet<&str> = out.iter().map(|r| r.platform.as_str()).collect();
        assert_eq!(platforms, ["PS2", "Wii"].into_iter().collect());
        // Each surviving platform still carries all four regional rows.
        assert_eq!(out.len(), 8);
    }

    #[test]
    fn japan_share_derives_ratio_and_drops_zero_global() {
        let records = vec![
            record("A", "SNES", Some(1995), "Role-Playing", [1.0, 1.0, 2.0, 0.0, 10.0]),
            record("B", "SNES", Some(1995), "Role-Playing", [0.0, 0.0, 1.0, 0.0, 0.0]),
            record("C", "SNES", Some(1995), "Role-Playing", [0.1, 0.1, 0.1, 0.0, 0.3]),
        ];
        let out = run_japan_share(&records, 0.5).unwrap();
        // B has zero global sales (null share); C falls under the threshold.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "A");
        assert_eq!(out[0].jp_share, 0.2);
    }

    #[test]
    fn queries_validate_against_the_record_schema() {
        let schema = record_schema();
        for def in [
            genre_totals(),
            timeline(Genre::Action),
            regional_sales(Some(15)),
            regional_sales(None),
            japan_share(0.5),
        ] {
            def.validate(&schema).unwrap_or_else(|e| panic!("{}: {e}", def.name()));
        }
    }

    #[test]
    fn definitions_are_reusable_and_do_not_mutate_input() {
        let records = vec![record("A", "Wii", Some(2006), "Action", [1.0, 1.0, 1.0, 1.0, 4.0])];
        let rows = to_rows(&records);
        let before = rows.clone();
        let def = genre_totals();
        let first = def.run(&rows, &record_schema()).unwrap();
        let second = def.run(&rows, &record_schema()).unwrap();
        assert_eq!(first, second);
        assert_eq!(rows, before);
    }
}
