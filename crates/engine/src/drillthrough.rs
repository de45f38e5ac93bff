// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Drill-through SQL generation
//!
//! `generateDrillThroughSql` (spec.md §6) never touches the cache or the
//! loader — it renders row-level SQL for a cell's underlying fact rows (or
//! just their count) and hands the text back to the caller to execute
//! itself. No AggStar matching happens here: drill-through always reads
//! the fact table, since an AggStar's whole point is to not carry
//! row-level detail.

use rolap_predicate::{Column, ColumnPredicate, CompoundPredicate};
use rolap_schema::Star;
use rolap_sql_ir::query::{GroupBy, SelectItem, SelectStatement, TableRef};
use rolap_sql_ir::{DataType, Dialect, Expr};

use crate::error::EngineError;

/// The rendered SQL plus the datatype of each selected column, in
/// projection order (spec.md §6: "...and the per-column type list").
pub struct DrillThroughSql {
    pub sql: String,
    pub column_types: Vec<DataType>,
}

/// Render drill-through SQL for a cell's underlying fact rows.
///
/// `coordinates` pins the cell's own (column, value) pairs; `slicer`
/// supplies any additional compound (tuple/or-of-tuples) constraints from
/// the query's slicer axis; `fields` names which star columns to project
/// (ignored when `count_only` is set, which instead emits a single
/// `COUNT(*)`-shaped projection).
pub fn generate_drill_through_sql(star: &Star, coordinates: &[(usize, rolap_predicate::PredicateValue)], slicer: &[CompoundPredicate], fields: &[usize], count_only: bool) -> Result<DrillThroughSql, EngineError> {
    let mut from = vec![TableRef::new(star.fact_table.clone())];

    let mut where_fragments = Vec::new();
    for &(bit, ref value) in coordinates {
        let star_column = star.column(bit)?;
        let column = Column::new(bit, star_column.sql_expr(), star_column.datatype.clone());
        let predicate = ColumnPredicate::value(column, value.clone());
        push_table(&mut from, &star_column.table);
        where_fragments.push(predicate.to_sql(&fact_quoting())?);
    }
    for predicate in slicer {
        where_fragments.push(predicate.to_sql(&fact_quoting())?);
    }

    let mut projection = Vec::new();
    let mut column_types = Vec::new();
    if count_only {
        projection.push(SelectItem::AliasedExpr {
            expr: Expr::Raw(fact_quoting().generate_count_expression("*")),
            alias: "row_count".to_string(),
        });
        column_types.push(DataType::BigInt);
    } else {
        for &bit in fields {
            let star_column = star.column(bit)?;
            push_table(&mut from, &star_column.table);
            projection.push(SelectItem::AliasedExpr {
                expr: Expr::column(star_column.sql_expr()),
                alias: format!("c{bit}"),
            });
            column_types.push(star_column.datatype.clone());
        }
    }

    let mut select = SelectStatement::default().with_from(dedup_tables(from)).with_projection(projection);
    if !where_fragments.is_empty() {
        select = select.with_where(Expr::Raw(where_fragments.join(" AND ")));
    }
    select = select.with_group_by(GroupBy::None);

    Ok(DrillThroughSql {
        sql: render(&select),
        column_types,
    })
}

/// Drill-through has no dialect-specific rewrite paths (no distinct
/// rewrite, no grouping sets) — it only needs quoting, so a plain
/// PostgreSQL-shaped dialect is sufficient regardless of which dialect the
/// caller's aggregate queries target. Exposed so `rolap-engine`'s facade
/// can thread the caller's actual dialect through instead, once a second
/// consumer needs dialect-sensitive drill-through rendering.
fn fact_quoting() -> rolap_sql_ir::dialect::QuoteStyle {
    Dialect::postgres_like("drillthrough").quoting
}

fn push_table(from: &mut Vec<TableRef>, table: &str) {
    if !from.iter().any(|t| t.name == table) {
        from.push(TableRef::new(table.to_string()));
    }
}

fn dedup_tables(from: Vec<TableRef>) -> Vec<TableRef> {
    let mut seen = std::collections::HashSet::new();
    from.into_iter().filter(|t| seen.insert(t.name.clone())).collect()
}

fn render(select: &SelectStatement) -> String {
    let mut sql = String::from("SELECT ");
    let items: Vec<String> = select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::UnnamedExpr(e) => render_expr(e),
            SelectItem::AliasedExpr { expr, alias } => format!("{} AS {alias}", render_expr(expr)),
        })
        .collect();
    sql.push_str(&items.join(", "));
    sql.push_str(&format!("\nFROM {}", select.from.iter().map(|t| t.reference().to_string()).collect::<Vec<_>>().join(", ")));
    if let Some(where_clause) = &select.where_clause {
        sql.push_str(&format!("\nWHERE {}", render_expr(where_clause)));
    }
    sql
}

fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Column(c) => c.qualified(),
        Expr::Raw(text) => text.clone(),
        other => format!("{other:?}"),
    }
}
