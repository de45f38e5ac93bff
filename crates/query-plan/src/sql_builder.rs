// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # SQL builder
//!
//! Turns a [`QuerySpec`] into SQL text against a [`Dialect`]'s capability
//! flags. The non-distinct path assembles a single `SelectStatement` (see
//! [`build_non_distinct`]); when the dialect can't express a requested
//! `COUNT(DISTINCT ...)` in the current shape, [`build_distinct_rewrite`]
//! emits the inner-subquery/outer-aggregation form instead.

use rolap_predicate::{CompoundChild, CompoundPredicate, PredicateError};
use rolap_sql_ir::dialect::Dialect;
use rolap_sql_ir::query::{GroupBy, SelectItem, SelectStatement, TableRef};
use rolap_sql_ir::{ColumnRef, Expr};

use crate::query_spec::QuerySpec;

/// Assemble the non-distinct `SELECT ... GROUP BY [GROUPING SETS]` query
/// for `spec`.
pub fn build_non_distinct(spec: &QuerySpec, dialect: &Dialect) -> Result<SelectStatement, PredicateError> {
    let mut from = vec![TableRef::new(spec.fact_table.clone())];
    push_table(&mut from, &spec.fact_table);

    let mut where_fragments = Vec::new();
    for col_spec in &spec.columns {
        push_table(&mut from, &col_spec.column.sql.table.clone().unwrap_or_else(|| spec.fact_table.clone()));
        if !matches!(
            col_spec.predicate.kind,
            rolap_predicate::ColumnPredicateKind::LiteralTrue
        ) {
            where_fragments.push(col_spec.predicate.to_sql(&dialect.quoting)?);
        }
    }
    for extra in &spec.extra_predicates {
        where_fragments.push(extra.to_sql(&dialect.quoting)?);
        collect_compound_tables(extra, &mut from);
    }

    let mut projection = Vec::new();
    for (i, col_spec) in spec.columns.iter().enumerate() {
        if col_spec.projected {
            projection.push(SelectItem::AliasedExpr {
                expr: Expr::column(col_spec.column.sql.clone()),
                alias: format!("c{i}"),
            });
        }
    }
    for (i, measure) in spec.measures.iter().enumerate() {
        projection.push(SelectItem::AliasedExpr {
            expr: aggregate_expr(measure, dialect),
            alias: format!("m{i}"),
        });
    }

    let projected_exprs: Vec<Expr> = spec
        .columns
        .iter()
        .filter(|c| c.projected)
        .map(|c| Expr::column(c.column.sql.clone()))
        .collect();

    let group_by = match &spec.grouping_sets {
        None => {
            if projected_exprs.is_empty() {
                GroupBy::None
            } else {
                GroupBy::Columns(projected_exprs)
            }
        }
        Some(sets) => {
            if dialect.capabilities.supports_grouping_sets {
                let rendered_sets = sets
                    .iter()
                    .map(|indices| {
                        indices
                            .iter()
                            .map(|&i| Expr::column(spec.columns[i].column.sql.clone()))
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>();
                for (i, _) in spec.columns.iter().enumerate() {
                    let in_every_set = sets.iter().all(|set| set.contains(&i));
                    if !in_every_set {
                        projection.push(SelectItem::AliasedExpr {
                            expr: Expr::Function {
                                name: "GROUPING".to_string(),
                                args: vec![Expr::column(spec.columns[i].column.sql.clone())],
                                distinct: false,
                            },
                            alias: format!("g{i}"),
                        });
                    }
                }
                GroupBy::GroupingSets(rendered_sets)
            } else {
                return Err(PredicateError::ConstraintNotSupported(
                    "dialect does not support GROUPING SETS".to_string(),
                ));
            }
        }
    };

    let where_clause = combine_where(where_fragments);

    let mut select = SelectStatement::default().with_from(dedup_tables(from)).with_projection(projection);
    if let Some(expr) = where_clause {
        select = select.with_where(expr);
    }
    select = select.with_group_by(group_by);
    Ok(select)
}

/// Emit the distinct rewrite: an inner query that de-duplicates rows
/// (`SELECT DISTINCT` or, when the dialect forbids that, an inner
/// `GROUP BY`), wrapped by an outer query that re-aggregates each measure
/// with its non-distinct-equivalent aggregator. Returns rendered SQL text
/// directly rather than a [`SelectStatement`], since the outer query's
/// FROM clause is a derived table this crate's query IR doesn't model.
pub fn build_distinct_rewrite(spec: &QuerySpec, dialect: &Dialect) -> Result<String, PredicateError> {
    let mut from = vec![TableRef::new(spec.fact_table.clone())];
    push_table(&mut from, &spec.fact_table);

    let mut where_fragments = Vec::new();
    for col_spec in &spec.columns {
        push_table(&mut from, &col_spec.column.sql.table.clone().unwrap_or_else(|| spec.fact_table.clone()));
        if !matches!(
            col_spec.predicate.kind,
            rolap_predicate::ColumnPredicateKind::LiteralTrue
        ) {
            where_fragments.push(col_spec.predicate.to_sql(&dialect.quoting)?);
        }
    }
    for extra in &spec.extra_predicates {
        where_fragments.push(extra.to_sql(&dialect.quoting)?);
        collect_compound_tables(extra, &mut from);
    }

    let mut inner_projection = Vec::new();
    for (i, col_spec) in spec.columns.iter().filter(|c| c.projected).enumerate() {
        inner_projection.push(format!("{} AS c{i}", col_spec.column.sql.qualified()));
    }
    for (i, measure) in spec.measures.iter().enumerate() {
        inner_projection.push(format!("{} AS m{i}", measure.expr.qualified()));
    }

    let projected_count = spec.columns.iter().filter(|c| c.projected).count();
    let where_clause = combine_where(where_fragments);
    let where_sql = where_clause.map(|_| where_fragments_joined(spec, dialect)).transpose()?.flatten();

    let inner_distinct = dialect.capabilities.allows_inner_distinct;
    let mut inner = format!(
        "SELECT {}{}\nFROM {}",
        if inner_distinct { "DISTINCT " } else { "" },
        inner_projection.join(", "),
        render_from(&dedup_tables(from)),
    );
    if let Some(w) = &where_sql {
        inner.push_str(&format!("\nWHERE {w}"));
    }
    if !inner_distinct {
        let group_cols: Vec<String> = (0..projected_count)
            .map(|i| spec.columns[i].column.sql.qualified())
            .chain(spec.measures.iter().map(|m| m.expr.qualified()))
            .collect();
        if !group_cols.is_empty() {
            inner.push_str(&format!("\nGROUP BY {}", group_cols.join(", ")));
        }
    }

    let dummy = if dialect.quoting.dummyname_uppercase {
        "DUMMYNAME"
    } else {
        "dummyname"
    };

    let mut outer_projection: Vec<String> = (0..projected_count).map(|i| format!("{dummy}.c{i} AS c{i}")).collect();
    outer_projection.extend(spec.measures.iter().enumerate().map(|(i, measure)| {
        let outer_kind = measure.aggregator.non_distinct_equivalent().unwrap_or(measure.aggregator.kind);
        format!("{}({dummy}.m{i}) AS m{i}", outer_kind.sql_name())
    }));

    let group_by_cols: Vec<String> = (0..projected_count).map(|i| format!("{dummy}.c{i}")).collect();

    let mut outer = format!(
        "SELECT {}\nFROM ({inner}) AS {dummy}",
        outer_projection.join(", ")
    );
    if !group_by_cols.is_empty() {
        outer.push_str(&format!("\nGROUP BY {}", group_by_cols.join(", ")));
    }
    Ok(outer)
}

fn where_fragments_joined(spec: &QuerySpec, dialect: &Dialect) -> Result<Option<String>, PredicateError> {
    let mut fragments = Vec::new();
    for col_spec in &spec.columns {
        if !matches!(
            col_spec.predicate.kind,
            rolap_predicate::ColumnPredicateKind::LiteralTrue
        ) {
            fragments.push(col_spec.predicate.to_sql(&dialect.quoting)?);
        }
    }
    for extra in &spec.extra_predicates {
        fragments.push(extra.to_sql(&dialect.quoting)?);
    }
    Ok(combine_where_text(fragments))
}

fn combine_where_text(fragments: Vec<String>) -> Option<String> {
    if fragments.is_empty() {
        None
    } else {
        Some(fragments.join(" AND "))
    }
}

fn combine_where(fragments: Vec<String>) -> Option<Expr> {
    combine_where_text(fragments).map(Expr::Raw)
}

fn aggregate_expr(measure: &crate::query_spec::MeasureSpec, _dialect: &Dialect) -> Expr {
    Expr::Function {
        name: measure.aggregator.kind.sql_name().to_string(),
        args: vec![Expr::column(measure.expr.clone())],
        distinct: measure.aggregator.kind.is_distinct(),
    }
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

fn collect_compound_tables(predicate: &CompoundPredicate, from: &mut Vec<TableRef>) {
    for child in &predicate.children {
        match child {
            CompoundChild::Column(c) => {
                if let Some(table) = &c.column.sql.table {
                    push_table(from, table);
                }
            }
            CompoundChild::Compound(c) => collect_compound_tables(c, from),
        }
    }
}

fn render_from(from: &[TableRef]) -> String {
    from.iter()
        .map(|t| match &t.alias {
            Some(alias) => format!("{} {alias}", t.name),
            None => t.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Render a built [`SelectStatement`] to SQL text.
pub fn render_select(select: &SelectStatement, _dialect: &Dialect) -> String {
    let mut sql = String::from("SELECT ");
    if select.distinct {
        sql.push_str("DISTINCT ");
    }
    let items: Vec<String> = select
        .projection
        .iter()
        .map(|item| match item {
            SelectItem::UnnamedExpr(e) => render_expr(e),
            SelectItem::AliasedExpr { expr, alias } => format!("{} AS {alias}", render_expr(expr)),
        })
        .collect();
    sql.push_str(&items.join(", "));
    sql.push_str(&format!("\nFROM {}", render_from(&select.from)));
    if let Some(where_clause) = &select.where_clause {
        sql.push_str(&format!("\nWHERE {}", render_expr(where_clause)));
    }
    match &select.group_by {
        GroupBy::None => {}
        GroupBy::Columns(cols) => {
            sql.push_str(&format!(
                "\nGROUP BY {}",
                cols.iter().map(render_expr).collect::<Vec<_>>().join(", ")
            ));
        }
        GroupBy::GroupingSets(sets) => {
            let rendered_sets: Vec<String> = sets
                .iter()
                .map(|set| format!("({})", set.iter().map(render_expr).collect::<Vec<_>>().join(", ")))
                .collect();
            sql.push_str(&format!("\nGROUP BY GROUPING SETS ({})", rendered_sets.join(", ")));
        }
    }
    sql
}

fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Column(c) => c.qualified(),
        Expr::Literal(l) => render_literal(l),
        Expr::BinaryOp { left, op, right } => {
            format!("{} {} {}", render_expr(left), render_binary_op(*op), render_expr(right))
        }
        Expr::UnaryOp { op, expr } => format!("{} {}", render_unary_op(*op), render_expr(expr)),
        Expr::Function { name, args, distinct } => {
            let prefix = if *distinct { "DISTINCT " } else { "" };
            format!("{name}({prefix}{})", args.iter().map(render_expr).collect::<Vec<_>>().join(", "))
        }
        Expr::Paren(inner) => format!("({})", render_expr(inner)),
        Expr::Raw(text) => text.clone(),
    }
}

fn render_literal(literal: &rolap_sql_ir::Literal) -> String {
    use rolap_sql_ir::Literal::*;
    match literal {
        Null => "NULL".to_string(),
        Boolean(b) => b.to_string().to_uppercase(),
        Integer(i) => i.to_string(),
        Float(f) => f.to_string(),
        String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

fn render_binary_op(op: rolap_sql_ir::BinaryOp) -> &'static str {
    use rolap_sql_ir::BinaryOp::*;
    match op {
        Eq => "=",
        NotEq => "<>",
        Lt => "<",
        LtEq => "<=",
        Gt => ">",
        GtEq => ">=",
        And => "AND",
        Or => "OR",
    }
}

fn render_unary_op(op: rolap_sql_ir::UnaryOp) -> &'static str {
    use rolap_sql_ir::UnaryOp::*;
    match op {
        Neg => "-",
        Not => "NOT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolap_aggregator::{Aggregator, AggregatorKind, RollupStrategy};
    use rolap_predicate::{Column, ColumnPredicate, PredicateValue};
    use rolap_sql_ir::{DataType, Dialect};

    use crate::query_spec::{ColumnSpec, MeasureSpec};

    fn dialect() -> Dialect {
        Dialect::postgres_like("test")
    }

    fn spec() -> QuerySpec {
        let region = Column::new(0, ColumnRef::new("region_id").with_table("sales_fact"), DataType::Integer);
        let amount = ColumnRef::new("amount").with_table("sales_fact");
        QuerySpec::new("sales_fact")
            .with_columns(vec![ColumnSpec {
                predicate: ColumnPredicate::list(region.clone(), vec![PredicateValue::Integer(1), PredicateValue::Integer(2)]),
                column: region,
                projected: true,
            }])
            .with_measures(vec![MeasureSpec {
                alias: "total".into(),
                expr: amount,
                aggregator: Aggregator::new("SUM", AggregatorKind::Sum, DataType::Decimal, RollupStrategy::Direct),
            }])
    }

    #[test]
    fn non_distinct_builds_group_by_on_projected_columns() {
        let select = build_non_distinct(&spec(), &dialect()).unwrap();
        assert!(matches!(select.group_by, GroupBy::Columns(_)));
        assert_eq!(select.projection.len(), 2);
    }

    #[test]
    fn render_select_produces_where_and_group_by() {
        let select = build_non_distinct(&spec(), &dialect()).unwrap();
        let sql = render_select(&select, &dialect());
        assert!(sql.contains("WHERE"));
        assert!(sql.contains("GROUP BY"));
        assert!(sql.contains("SUM("));
    }

    fn count_distinct_spec() -> QuerySpec {
        let region = Column::new(0, ColumnRef::new("region_id").with_table("sales_fact"), DataType::Integer);
        let customer = ColumnRef::new("customer_id").with_table("sales_fact");
        QuerySpec::new("sales_fact")
            .with_columns(vec![ColumnSpec {
                predicate: ColumnPredicate::literal_true(region.clone()),
                column: region,
                projected: true,
            }])
            .with_measures(vec![MeasureSpec {
                alias: "distinct_customers".into(),
                expr: customer,
                aggregator: Aggregator::new("COUNT_DISTINCT", AggregatorKind::CountDistinct, DataType::BigInt, RollupStrategy::WithinRollableLevels),
            }])
    }

    #[test]
    fn distinct_rewrite_emits_inner_distinct_subquery_and_outer_count() {
        let dialect = Dialect::legacy_no_distinct("legacy");
        let sql = build_distinct_rewrite(&count_distinct_spec(), &dialect).unwrap();

        assert!(sql.contains("SELECT DISTINCT"), "inner query must de-duplicate rows: {sql}");
        assert!(sql.contains("FROM (SELECT DISTINCT"), "outer query must wrap the inner distinct subquery: {sql}");
        assert!(sql.to_uppercase().contains("COUNT(DUMMYNAME.M0)"), "outer query must re-aggregate with COUNT over the inner alias: {sql}");
        assert!(sql.contains("GROUP BY DUMMYNAME.c0"), "outer query must regroup on the outer alias's column: {sql}");
    }
}
