//! Stage definitions, validation, and execution.
//!
//! Error policy: stages never fail on malformed individual rows; bad values
//! read as null and fall out of predicates and reductions. A stage fails fast
//! only when its own configuration is invalid (unknown field name, empty
//! field list), which is caught by validating the stage list against the
//! input schema before execution.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::pipeline::row::{KeyAtom, Row, Value};

/// Reduction operator for `Aggregate` / `JoinAggregate`.
///
/// The queries only need `Sum`; because the op is an enum, an unknown op is
/// unrepresentable rather than a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Sum,
}

/// Ordering direction for `Rank`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Numeric comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn eval(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

/// Row predicate for `Filter`.
///
/// Null or missing fields fail numeric comparisons; predicates never error
/// on a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Numeric comparison against a constant.
    Compare {
        field: String,
        op: CompareOp,
        value: f64,
    },
    /// Exact string equality on a text field.
    TextEq { field: String, value: String },
    /// The field holds a finite number.
    IsValidNumber { field: String },
    /// The field is present and non-null.
    NotNull { field: String },
}

impl Predicate {
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            Predicate::Compare { field, op, value } => match row.num(field) {
                Some(lhs) => op.eval(lhs, *value),
                None => false,
            },
            Predicate::TextEq { field, value } => row.text(field) == Some(value.as_str()),
            Predicate::IsValidNumber { field } => row.num(field).is_some(),
            Predicate::NotNull { field } => !row.get(field).is_null(),
        }
    }

    fn field(&self) -> &str {
        match self {
            Predicate::Compare { field, .. }
            | Predicate::TextEq { field, .. }
            | Predicate::IsValidNumber { field }
            | Predicate::NotNull { field } => field,
        }
    }
}

/// Per-row expression for `Calculate`.
#[derive(Debug, Clone, PartialEq)]
pub enum CalcExpr {
    /// Parse a field into a number; null when missing or unparseable.
    ToNumber { field: String },
    /// `numerator / denominator` when the denominator is a number `> 0`,
    /// otherwise null. Division by zero and non-numeric input never error.
    Ratio {
        numerator: String,
        denominator: String,
    },
}

impl CalcExpr {
    pub fn eval(&self, row: &Row) -> Value {
        match self {
            CalcExpr::ToNumber { field } => match row.get(field) {
                Value::Num(v) if v.is_finite() => Value::Num(*v),
                Value::Str(s) => match s.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => Value::Num(v),
                    _ => Value::Null,
                },
                _ => Value::Null,
            },
            CalcExpr::Ratio {
                numerator,
                denominator,
            } => {
                let den = match row.num(denominator) {
                    Some(d) if d > 0.0 => d,
                    _ => return Value::Null,
                };
                match row.num(numerator) {
                    Some(n) => Value::Num(n / den),
                    None => Value::Null,
                }
            }
        }
    }

    fn inputs(&self) -> Vec<&str> {
        match self {
            CalcExpr::ToNumber { field } => vec![field],
            CalcExpr::Ratio {
                numerator,
                denominator,
            } => vec![numerator, denominator],
        }
    }
}

/// A single pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep rows matching the predicate.
    Filter(Predicate),
    /// Compute a new field per row.
    Calculate { expr: CalcExpr, output: String },
    /// Wide-to-long reshape: one output row per source field, carrying all
    /// other fields plus a `(key, value)` pair. Row count multiplies by the
    /// number of folded fields; the folded source columns are dropped.
    Fold {
        fields: Vec<String>,
        key_output: String,
        value_output: String,
    },
    /// Grouped reduction: one output row per distinct group-key tuple, in
    /// first-seen key order.
    Aggregate {
        op: AggregateOp,
        field: String,
        output: String,
        group_by: Vec<String>,
    },
    /// Like `Aggregate`, but the group value is broadcast back onto every
    /// row sharing the key; rows are neither collapsed nor reordered.
    JoinAggregate {
        op: AggregateOp,
        field: String,
        output: String,
        group_by: Vec<String>,
    },
    /// 1-based competition rank by `order_by` (ties share a rank, the next
    /// distinct value skips accordingly), optionally within partitions.
    /// Null order values rank last. Row order is preserved.
    Rank {
        order_by: String,
        direction: Direction,
        output: String,
        partition_by: Vec<String>,
    },
    /// Keep rows whose `rank_field` is `<= n`.
    TopN { rank_field: String, n: usize },
}

/// Invalid stage configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// A stage references a field that is not in the schema at that point
    /// in the pipeline.
    UnknownField { stage: &'static str, field: String },
    /// A stage has an empty field list or a zero count.
    EmptyStage { stage: &'static str },
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageError::UnknownField { stage, field } => {
                write!(f, "{stage} stage references unknown field `{field}`")
            }
            StageError::EmptyStage { stage } => {
                write!(f, "{stage} stage has an empty configuration")
            }
        }
    }
}

impl std::error::Error for StageError {}

fn require_field(stage: &'static str, schema: &BTreeSet<String>, field: &str) -> Result<(), StageError> {
    if schema.contains(field) {
        Ok(())
    } else {
        Err(StageError::UnknownField {
            stage,
            field: field.to_string(),
        })
    }
}

impl Stage {
    /// Check this stage's configuration against the schema flowing through
    /// the pipeline, and advance the schema to this stage's output shape.
    pub fn validate(&self, schema: &mut BTreeSet<String>) -> Result<(), StageError> {
        match self {
            Stage::Filter(pred) => require_field("filter", schema, pred.field()),
            Stage::Calculate { expr, output } => {
                for input in expr.inputs() {
                    require_field("calculate", schema, input)?;
                }
                schema.insert(output.clone());
                Ok(())
            }
            Stage::Fold {
                fields,
                key_output,
                value_output,
            } => {
                if fields.is_empty() {
                    return Err(StageError::EmptyStage { stage: "fold" });
                }
                for field in fields {
                    require_field("fold", schema, field)?;
                }
                for field in fields {
                    schema.remove(field);
                }
                schema.insert(key_output.clone());
                schema.insert(value_output.clone());
                Ok(())
            }
            Stage::Aggregate {
                field,
                output,
                group_by,
                ..
            } => {
                require_field("aggregate", schema, field)?;
                for key in group_by {
                    require_field("aggregate", schema, key)?;
                }
                // The output shape is the group keys plus the aggregate field.
                let keys: Vec<String> = group_by.clone();
                schema.clear();
                schema.extend(keys);
                schema.insert(output.clone());
                Ok(())
            }
            Stage::JoinAggregate {
                field,
                output,
                group_by,
                ..
            } => {
                require_field("joinaggregate", schema, field)?;
                for key in group_by {
                    require_field("joinaggregate", schema, key)?;
                }
                schema.insert(output.clone());
                Ok(())
            }
            Stage::Rank {
                order_by,
                output,
                partition_by,
                ..
            } => {
                require_field("rank", schema, order_by)?;
                for key in partition_by {
                    require_field("rank", schema, key)?;
                }
                schema.insert(output.clone());
                Ok(())
            }
            Stage::TopN { rank_field, n } => {
                if *n == 0 {
                    return Err(StageError::EmptyStage { stage: "top_n" });
                }
                require_field("top_n", schema, rank_field)
            }
        }
    }

    /// Apply this stage to a row sequence, producing a new sequence.
    ///
    /// Assumes the stage has been validated against the input schema.
    pub fn apply(&self, rows: &[Row]) -> Vec<Row> {
        match self {
            Stage::Filter(pred) => rows.iter().filter(|r| pred.eval(r)).cloned().collect(),
            Stage::Calculate { expr, output } => rows
                .iter()
                .map(|row| {
                    let mut out = row.clone();
                    out.set(output.clone(), expr.eval(row));
                    out
                })
                .collect(),
            Stage::Fold {
                fields,
                key_output,
                value_output,
            } => {
                let mut out = Vec::with_capacity(rows.len() * fields.len());
                for row in rows {
                    let mut base = row.clone();
                    let values: Vec<Value> = fields
                        .iter()
                        .map(|f| base.remove(f).unwrap_or(Value::Null))
                        .collect();
                    for (field, value) in fields.iter().zip(values) {
                        let mut folded = base.clone();
                        folded.set(key_output.clone(), Value::str(field.clone()));
                        folded.set(value_output.clone(), value);
                        out.push(folded);
                    }
                }
                out
            }
            Stage::Aggregate {
                op,
                field,
                output,
                group_by,
            } => {
                struct Acc {
                    key_values: Vec<Value>,
                    sum: f64,
                }

                let mut index: HashMap<Vec<KeyAtom>, usize> = HashMap::new();
                let mut accs: Vec<Acc> = Vec::new();

                for row in rows {
                    let key = row.group_key(group_by);
                    let slot = match index.get(&key) {
                        Some(&i) => i,
                        None => {
                            let i = accs.len();
                            index.insert(key, i);
                            accs.push(Acc {
                                key_values: group_by.iter().map(|g| row.get(g).clone()).collect(),
                                sum: 0.0,
                            });
                            i
                        }
                    };
                    match op {
                        AggregateOp::Sum => {
                            if let Some(v) = row.num(field) {
                                accs[slot].sum += v;
                            }
                        }
                    }
                }

                accs.into_iter()
                    .map(|acc| {
                        let mut row = Row::new();
                        for (key, value) in group_by.iter().zip(acc.key_values) {
                            row.set(key.clone(), value);
                        }
                        row.set(output.clone(), Value::Num(acc.sum));
                        row
                    })
                    .collect()
            }
            Stage::JoinAggregate {
                op,
                field,
                output,
                group_by,
            } => {
                let mut totals: HashMap<Vec<KeyAtom>, f64> = HashMap::new();
                for row in rows {
                    let entry = totals.entry(row.group_key(group_by)).or_insert(0.0);
                    match op {
                        AggregateOp::Sum => {
                            if let Some(v) = row.num(field) {
                                *entry += v;
                            }
                        }
                    }
                }

                rows.iter()
                    .map(|row| {
                        let mut out = row.clone();
                        let total = totals.get(&row.group_key(group_by)).copied().unwrap_or(0.0);
                        out.set(output.clone(), Value::Num(total));
                        out
                    })
                    .collect()
            }
            Stage::Rank {
                order_by,
                direction,
                output,
                partition_by,
            } => {
                let mut partitions: HashMap<Vec<KeyAtom>, Vec<usize>> = HashMap::new();
                for (i, row) in rows.iter().enumerate() {
                    partitions.entry(row.group_key(partition_by)).or_default().push(i);
                }

                let mut ranks = vec![0usize; rows.len()];
                for members in partitions.values() {
                    let mut ordered: Vec<(usize, Option<f64>)> = members
                        .iter()
                        .map(|&i| (i, rows[i].num(order_by)))
                        .collect();
                    ordered.sort_by(|a, b| {
                        cmp_order_values(a.1, b.1, *direction).then_with(|| a.0.cmp(&b.0))
                    });

                    let mut prev: Option<Option<f64>> = None;
                    let mut prev_rank = 0usize;
                    for (pos, (i, v)) in ordered.iter().enumerate() {
                        let rank = if prev == Some(*v) { prev_rank } else { pos + 1 };
                        ranks[*i] = rank;
                        prev = Some(*v);
                        prev_rank = rank;
                    }
                }

                rows.iter()
                    .enumerate()
                    .map(|(i, row)| {
                        let mut out = row.clone();
                        out.set(output.clone(), Value::Num(ranks[i] as f64));
                        out
                    })
                    .collect()
            }
            Stage::TopN { rank_field, n } => rows
                .iter()
                .filter(|row| row.num(rank_field).is_some_and(|r| r <= *n as f64))
                .cloned()
                .collect(),
        }
    }
}

/// Ordering for rank: direction applies to numeric values; nulls sort last
/// in either direction.
fn cmp_order_values(a: Option<f64>, b: Option<f64>, direction: Direction) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.total_cmp(&b);
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut r = Row::new();
        for (k, v) in pairs {
            r.set(*k, v.clone());
        }
        r
    }

    fn num_rows(field: &str, values: &[f64]) -> Vec<Row> {
        values
            .iter()
            .map(|&v| row(&[(field, Value::Num(v))]))
            .collect()
    }

    #[test]
    fn filter_treats_null_as_failing_numeric_comparisons() {
        let rows = vec![
            row(&[("x", Value::Num(1.0))]),
            row(&[("x", Value::Null)]),
            row(&[]),
        ];
        let stage = Stage::Filter(Predicate::Compare {
            field: "x".to_string(),
            op: CompareOp::Ge,
            value: 0.0,
        });
        let out = stage.apply(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].num("x"), Some(1.0));
    }

    #[test]
    fn calculate_ratio_yields_null_on_zero_denominator() {
        let rows = vec![
            row(&[("jp", Value::Num(2.0)), ("global", Value::Num(10.0))]),
            row(&[("jp", Value::Num(1.0)), ("global", Value::Num(0.0))]),
        ];
        let stage = Stage::Calculate {
            expr: CalcExpr::Ratio {
                numerator: "jp".to_string(),
                denominator: "global".to_string(),
            },
            output: "share".to_string(),
        };
        let out = stage.apply(&rows);
        assert_eq!(out[0].num("share"), Some(0.2));
        assert!(out[1].get("share").is_null());
    }

    #[test]
    fn calculate_to_number_parses_text_years() {
        let rows = vec![
            row(&[("year", Value::str("1998"))]),
            row(&[("year", Value::str("N/A"))]),
            row(&[("year", Value::Num(2001.0))]),
        ];
        let stage = Stage::Calculate {
            expr: CalcExpr::ToNumber {
                field: "year".to_string(),
            },
            output: "year_num".to_string(),
        };
        let out = stage.apply(&rows);
        assert_eq!(out[0].num("year_num"), Some(1998.0));
        assert!(out[1].get("year_num").is_null());
        assert_eq!(out[2].num("year_num"), Some(2001.0));
    }

    #[test]
    fn fold_multiplies_rows_and_drops_source_columns() {
        let rows = vec![row(&[
            ("platform", Value::str("Wii")),
            ("na", Value::Num(3.0)),
            ("eu", Value::Num(2.0)),
        ])];
        let stage = Stage::Fold {
            fields: vec!["na".to_string(), "eu".to_string()],
            key_output: "region".to_string(),
            value_output: "sales".to_string(),
        };
        let out = stage.apply(&rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text("region"), Some("na"));
        assert_eq!(out[0].num("sales"), Some(3.0));
        assert_eq!(out[1].text("region"), Some("eu"));
        assert_eq!(out[1].num("sales"), Some(2.0));
        for r in &out {
            assert_eq!(r.text("platform"), Some("Wii"));
            assert!(r.get("na").is_null());
            assert!(r.get("eu").is_null());
        }
    }

    #[test]
    fn aggregate_sums_in_first_seen_key_order() {
        let rows = vec![
            row(&[("g", Value::str("Action")), ("v", Value::Num(5.0))]),
            row(&[("g", Value::str("Sports")), ("v", Value::Num(2.0))]),
            row(&[("g", Value::str("Action")), ("v", Value::Num(3.0))]),
        ];
        let stage = Stage::Aggregate {
            op: AggregateOp::Sum,
            field: "v".to_string(),
            output: "total".to_string(),
            group_by: vec!["g".to_string()],
        };
        let out = stage.apply(&rows);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text("g"), Some("Action"));
        assert_eq!(out[0].num("total"), Some(8.0));
        assert_eq!(out[1].text("g"), Some("Sports"));
        assert_eq!(out[1].num("total"), Some(2.0));
    }

    #[test]
    fn aggregate_conserves_totals() {
        let rows = vec![
            row(&[("g", Value::str("a")), ("v", Value::Num(1.5))]),
            row(&[("g", Value::str("b")), ("v", Value::Num(2.5))]),
            row(&[("g", Value::str("a")), ("v", Value::Num(4.0))]),
            row(&[("g", Value::str("b")), ("v", Value::Null)]),
        ];
        let input_total: f64 = rows.iter().filter_map(|r| r.num("v")).sum();
        let stage = Stage::Aggregate {
            op: AggregateOp::Sum,
            field: "v".to_string(),
            output: "total".to_string(),
            group_by: vec!["g".to_string()],
        };
        let output_total: f64 = stage.apply(&rows).iter().filter_map(|r| r.num("total")).sum();
        assert_eq!(input_total, output_total);
    }

    #[test]
    fn join_aggregate_broadcasts_without_collapsing() {
        let rows = vec![
            row(&[("p", Value::str("Wii")), ("v", Value::Num(1.0))]),
            row(&[("p", Value::str("PS2")), ("v", Value::Num(2.0))]),
            row(&[("p", Value::str("Wii")), ("v", Value::Num(3.0))]),
        ];
        let stage = Stage::JoinAggregate {
            op: AggregateOp::Sum,
            field: "v".to_string(),
            output: "total".to_string(),
            group_by: vec!["p".to_string()],
        };
        let out = stage.apply(&rows);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].num("total"), Some(4.0));
        assert_eq!(out[1].num("total"), Some(2.0));
        assert_eq!(out[2].num("total"), Some(4.0));
        // Original fields and order are untouched.
        assert_eq!(out[0].num("v"), Some(1.0));
        assert_eq!(out[2].num("v"), Some(3.0));
    }

    #[test]
    fn rank_uses_competition_semantics() {
        let rows = num_rows("v", &[10.0, 10.0, 8.0]);
        let stage = Stage::Rank {
            order_by: "v".to_string(),
            direction: Direction::Descending,
            output: "rank".to_string(),
            partition_by: vec![],
        };
        let out = stage.apply(&rows);
        let ranks: Vec<f64> = out.iter().map(|r| r.num("rank").unwrap()).collect();
        assert_eq!(ranks, vec![1.0, 1.0, 3.0]);
    }

    #[test]
    fn rank_ascending_and_null_last() {
        let rows = vec![
            row(&[("v", Value::Num(5.0))]),
            row(&[("v", Value::Null)]),
            row(&[("v", Value::Num(1.0))]),
        ];
        let stage = Stage::Rank {
            order_by: "v".to_string(),
            direction: Direction::Ascending,
            output: "rank".to_string(),
            partition_by: vec![],
        };
        let out = stage.apply(&rows);
        assert_eq!(out[0].num("rank"), Some(2.0));
        assert_eq!(out[1].num("rank"), Some(3.0));
        assert_eq!(out[2].num("rank"), Some(1.0));
    }

    #[test]
    fn rank_partitions_independently() {
        let rows = vec![
            row(&[("part", Value::str("a")), ("v", Value::Num(1.0))]),
            row(&[("part", Value::str("b")), ("v", Value::Num(9.0))]),
            row(&[("part", Value::str("a")), ("v", Value::Num(2.0))]),
            row(&[("part", Value::str("b")), ("v", Value::Num(3.0))]),
        ];
        let stage = Stage::Rank {
            order_by: "v".to_string(),
            direction: Direction::Descending,
            output: "rank".to_string(),
            partition_by: vec!["part".to_string()],
        };
        let out = stage.apply(&rows);
        let ranks: Vec<f64> = out.iter().map(|r| r.num("rank").unwrap()).collect();
        assert_eq!(ranks, vec![2.0, 1.0, 1.0, 2.0]);
    }

    #[test]
    fn top_n_keeps_boundary_ties() {
        let rows = num_rows("v", &[10.0, 10.0, 8.0, 7.0]);
        let rank = Stage::Rank {
            order_by: "v".to_string(),
            direction: Direction::Descending,
            output: "rank".to_string(),
            partition_by: vec![],
        };
        let top = Stage::TopN {
            rank_field: "rank".to_string(),
            n: 2,
        };
        // Ranks are [1, 1, 3, 4]: both 10s share the boundary rank.
        let out = top.apply(&rank.apply(&rows));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.num("v") == Some(10.0)));
    }

    #[test]
    fn validate_rejects_unknown_fields() {
        let mut schema: BTreeSet<String> = ["x".to_string()].into_iter().collect();
        let stage = Stage::Filter(Predicate::NotNull {
            field: "missing".to_string(),
        });
        assert_eq!(
            stage.validate(&mut schema),
            Err(StageError::UnknownField {
                stage: "filter",
                field: "missing".to_string(),
            })
        );
    }

    #[test]
    fn validate_narrows_schema_after_aggregate() {
        let mut schema: BTreeSet<String> =
            ["g".to_string(), "v".to_string(), "extra".to_string()].into_iter().collect();
        let agg = Stage::Aggregate {
            op: AggregateOp::Sum,
            field: "v".to_string(),
            output: "total".to_string(),
            group_by: vec!["g".to_string()],
        };
        agg.validate(&mut schema).unwrap();

        // `extra` no longer exists downstream of the aggregate.
        let filter = Stage::Filter(Predicate::NotNull {
            field: "extra".to_string(),
        });
        assert!(filter.validate(&mut schema).is_err());
    }

    #[test]
    fn validate_rejects_empty_fold_and_zero_top_n() {
        let mut schema: BTreeSet<String> = ["x".to_string()].into_iter().collect();
        let fold = Stage::Fold {
            fields: vec![],
            key_output: "k".to_string(),
            value_output: "v".to_string(),
        };
        assert_eq!(
            fold.validate(&mut schema),
            Err(StageError::EmptyStage { stage: "fold" })
        );

        let top = Stage::TopN {
            rank_field: "x".to_string(),
            n: 0,
        };
        assert_eq!(
            top.validate(&mut schema),
            Err(StageError::EmptyStage { stage: "top_n" })
        );
    }
}
