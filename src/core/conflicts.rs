//! Conflict detection and reconciliation.
//!
//! Unresolved [`conflict`] rows are the signal that a zone needs reconciling.
//! The quantity matrix itself is computed at read time by [`build_comparison`],
//! a pure function over completed runs and their lines: nothing is flagged
//! when lines are written.

use crate::{
    core::{context::AppContext, operator::OperatorIdentity, runs},
    entities::{
        Conflict, CountLine, CountingRun, conflict, count_line, counting_run,
        product as product_entity,
    },
    errors::{Error, Result},
    ports::{AuditCategory, audit},
};
use chrono::{DateTime, Utc};
use sea_orm::{JoinType, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait, prelude::*};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument, warn};

/// One run (column) of the comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunColumn {
    /// Run id
    pub run_id: i64,
    /// Pass type of the run
    pub count_type: i32,
    /// Completion time
    pub completed_at: DateTime<Utc>,
    /// Operator display value
    pub operator: Option<String>,
}

/// One product (row) of the comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    /// Product id
    pub product_id: i64,
    /// Product SKU
    pub sku: String,
    /// Product raw code
    pub ean: Option<String>,
    /// Product name
    pub name: String,
    /// Quantity per run, in column order; zero where the run did not scan it
    pub quantities: Vec<f64>,
    /// Whether the runs disagree
    pub has_discrepancy: bool,
}

/// Quantity matrix for a zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictComparison {
    /// Zone compared
    pub location_id: i64,
    /// Earliest completion among runs carrying an unresolved conflict
    pub window_start: Option<DateTime<Utc>>,
    /// Columns, ordered by completion time then pass type
    pub runs: Vec<RunColumn>,
    /// Rows, ordered by raw code (or SKU) then product id
    pub rows: Vec<ComparisonRow>,
}

impl ConflictComparison {
    /// Comparison with no runs and no rows.
    #[must_use]
    pub const fn empty(location_id: i64) -> Self {
        Self {
            location_id,
            window_start: None,
            runs: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// True when nothing needs reconciling.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// A completed run and the products it counted.
#[derive(Debug, Clone)]
pub struct RunLines {
    /// The run; must be completed
    pub run: counting_run::Model,
    /// Operator display value
    pub operator: Option<String>,
    /// Counted products and quantities
    pub lines: Vec<(product_entity::Model, f64)>,
}

/// An unresolved conflict with the line it is anchored to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenConflict {
    /// The conflict
    pub conflict: conflict::Model,
    /// Run of the anchored line
    pub run_id: i64,
    /// Pass type of that run
    pub count_type: i32,
    /// Product of the line
    pub product_id: i64,
    /// Quantity recorded on the line
    pub quantity: f64,
}

/// Display key for a product row: the raw code when present, else the SKU.
fn row_key(product: &product_entity::Model) -> String {
    product
        .ean
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map_or_else(|| product.sku_key.clone(), ToString::to_string)
}

/// Builds the quantity matrix for `runs`.
///
/// Pure and deterministic: the same input yields the same ordering. Runs
/// without a completion time are ignored.
#[must_use]
pub fn build_comparison(
    location_id: i64,
    window_start: Option<DateTime<Utc>>,
    runs: Vec<RunLines>,
) -> ConflictComparison {
    let mut runs: Vec<(DateTime<Utc>, RunLines)> = runs
        .into_iter()
        .filter_map(|r| r.run.completed_at.map(|at| (at, r)))
        .collect();
    runs.sort_by(|(a_at, a), (b_at, b)| {
        a_at.cmp(b_at)
            .then(a.run.count_type.cmp(&b.run.count_type))
            .then(a.run.id.cmp(&b.run.id))
    });

    let width = runs.len();
    let mut rows: BTreeMap<(String, i64), ComparisonRow> = BTreeMap::new();
    for (column, (_, run)) in runs.iter().enumerate() {
        for (product, quantity) in &run.lines {
            let row = rows
                .entry((row_key(product), product.id))
                .or_insert_with(|| ComparisonRow {
                    product_id: product.id,
                    sku: product.sku.clone(),
                    ean: product.ean.clone(),
                    name: product.name.clone(),
                    quantities: vec![0.0; width],
                    has_discrepancy: false,
                });
            row.quantities[column] += quantity;
        }
    }

    let rows = rows
        .into_values()
        .map(|mut row| {
            row.has_discrepancy = row
                .quantities
                .windows(2)
                .any(|pair| pair[0].partial_cmp(&pair[1]) != Some(Ordering::Equal));
            row
        })
        .collect();

    let runs = runs
        .into_iter()
        .map(|(completed_at, r)| RunColumn {
            run_id: r.run.id,
            count_type: r.run.count_type,
            completed_at,
            operator: r.operator,
        })
        .collect();

    ConflictComparison {
        location_id,
        window_start,
        runs,
        rows,
    }
}

/// Quantity comparison for a zone, or an empty one when no unresolved
/// conflict exists there.
///
/// The window opens at the earliest completion among runs whose lines carry
/// an unresolved conflict; every run of the zone completed since is included.
#[instrument(skip(ctx))]
pub async fn detect_conflicts(ctx: &AppContext, location_id: i64) -> Result<ConflictComparison> {
    let db = &ctx.database;
    runs::get_location(db, location_id).await?;

    let anchor = CountingRun::find()
        .join(JoinType::InnerJoin, counting_run::Relation::CountLines.def())
        .join(JoinType::InnerJoin, count_line::Relation::Conflicts.def())
        .filter(counting_run::Column::LocationId.eq(location_id))
        .filter(counting_run::Column::CompletedAt.is_not_null())
        .filter(conflict::Column::IsResolved.eq(false))
        .order_by_asc(counting_run::Column::CompletedAt)
        .one(db)
        .await?;
    let Some(window_start) = anchor.and_then(|run| run.completed_at) else {
        debug!(location_id, "No unresolved conflict");
        return Ok(ConflictComparison::empty(location_id));
    };

    let window_runs = CountingRun::find()
        .filter(counting_run::Column::LocationId.eq(location_id))
        .filter(counting_run::Column::CompletedAt.gte(window_start))
        .all(db)
        .await?;
    let run_ids: Vec<i64> = window_runs.iter().map(|run| run.id).collect();

    let mut lines_by_run: HashMap<i64, Vec<(product_entity::Model, f64)>> = HashMap::new();
    for (line, product) in CountLine::find()
        .filter(count_line::Column::RunId.is_in(run_ids))
        .find_also_related(product_entity::Entity)
        .all(db)
        .await?
    {
        if let Some(product) = product {
            lines_by_run
                .entry(line.run_id)
                .or_default()
                .push((product, line.quantity));
        }
    }

    let mut columns = Vec::with_capacity(window_runs.len());
    for run in window_runs {
        let operator = match OperatorIdentity::from_run(&run) {
            Some(identity) => Some(identity.display_name(db).await?),
            None => None,
        };
        columns.push(RunLines {
            lines: lines_by_run.remove(&run.id).unwrap_or_default(),
            operator,
            run,
        });
    }

    let comparison = build_comparison(location_id, Some(window_start), columns);
    info!(
        location_id,
        runs = comparison.runs.len(),
        rows = comparison.rows.len(),
        "Conflict comparison built"
    );
    Ok(comparison)
}

/// Marks a line of a completed run as conflicting.
///
/// Returns the line's existing unresolved conflict if there is one.
///
/// # Errors
/// - `NotFound`: line missing
/// - Validation: the line's run is still open
#[instrument(skip(ctx))]
pub async fn raise_conflict(
    ctx: &AppContext,
    line_id: i64,
    note: Option<&str>,
    actor: &str,
) -> Result<conflict::Model> {
    let txn = ctx.database.begin().await?;

    let (line, run) = CountLine::find_by_id(line_id)
        .find_also_related(CountingRun)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("line", line_id))?;
    if run.as_ref().is_none_or(|r| r.completed_at.is_none()) {
        return Err(Error::validation(
            "line",
            format!("line {line_id} belongs to a run that is not completed"),
        ));
    }

    let note = note.map(str::trim).filter(|n| !n.is_empty());
    let (conflict, created) = raise_on_line(&txn, ctx, line.id, note).await?;
    txn.commit().await?;

    if created {
        info!(conflict_id = conflict.id, line_id, "Conflict raised");
        audit::record(
            ctx.audit.as_ref(),
            format!("conflict {} raised on line {line_id}", conflict.id),
            actor,
            AuditCategory::ConflictResolution,
        )
        .await;
    }
    Ok(conflict)
}

async fn raise_on_line<C>(
    db: &C,
    ctx: &AppContext,
    line_id: i64,
    note: Option<&str>,
) -> Result<(conflict::Model, bool)>
where
    C: ConnectionTrait,
{
    if let Some(existing) = Conflict::find()
        .filter(conflict::Column::CountLineId.eq(line_id))
        .filter(conflict::Column::IsResolved.eq(false))
        .one(db)
        .await?
    {
        return Ok((existing, false));
    }

    let created = conflict::ActiveModel {
        count_line_id: Set(line_id),
        is_resolved: Set(false),
        resolved_quantity: Set(None),
        resolved_at: Set(None),
        note: Set(note.map(ToString::to_string)),
        created_at: Set(ctx.clock.now()),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok((created, true))
}

/// Compares the latest completed first and second passes of a zone and raises
/// a conflict on every line whose product quantity differs between them,
/// including products only one pass counted.
///
/// Returns the conflicts created; nothing is raised unless both passes exist.
#[instrument(skip(ctx))]
pub async fn raise_conflicts_for_location(
    ctx: &AppContext,
    location_id: i64,
    actor: &str,
) -> Result<Vec<conflict::Model>> {
    let txn = ctx.database.begin().await?;
    runs::get_location(&txn, location_id).await?;

    let first = latest_completed(&txn, location_id, 1).await?;
    let second = latest_completed(&txn, location_id, 2).await?;
    let (Some(first), Some(second)) = (first, second) else {
        txn.commit().await?;
        debug!(location_id, "Both passes are needed to compare");
        return Ok(Vec::new());
    };

    let first_lines = lines_of(&txn, first.id).await?;
    let second_lines = lines_of(&txn, second.id).await?;
    let quantity_in = |lines: &[count_line::Model], product_id: i64| {
        lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map_or(0.0, |line| line.quantity)
    };

    let mut created = Vec::new();
    for (lines, other) in [(&first_lines, &second_lines), (&second_lines, &first_lines)] {
        for line in lines.iter() {
            let other_quantity = quantity_in(other, line.product_id);
            if line.quantity.partial_cmp(&other_quantity) == Some(Ordering::Equal) {
                continue;
            }
            let (conflict, is_new) = raise_on_line(&txn, ctx, line.id, None).await?;
            if is_new {
                created.push(conflict);
            }
        }
    }
    txn.commit().await?;

    if created.is_empty() {
        info!(location_id, "Passes agree, no conflict raised");
    } else {
        warn!(location_id, conflicts = created.len(), "Pass discrepancies found");
        audit::record(
            ctx.audit.as_ref(),
            format!(
                "{} conflicts raised on location {location_id} (runs {} and {})",
                created.len(),
                first.id,
                second.id
            ),
            actor,
            AuditCategory::ConflictResolution,
        )
        .await;
    }
    Ok(created)
}

async fn latest_completed<C>(
    db: &C,
    location_id: i64,
    count_type: i32,
) -> Result<Option<counting_run::Model>>
where
    C: ConnectionTrait,
{
    CountingRun::find()
        .filter(counting_run::Column::LocationId.eq(location_id))
        .filter(counting_run::Column::CountType.eq(count_type))
        .filter(counting_run::Column::CompletedAt.is_not_null())
        .order_by_desc(counting_run::Column::CompletedAt)
        .order_by_desc(counting_run::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

async fn lines_of<C>(db: &C, run_id: i64) -> Result<Vec<count_line::Model>>
where
    C: ConnectionTrait,
{
    CountLine::find()
        .filter(count_line::Column::RunId.eq(run_id))
        .order_by_asc(count_line::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Settles a conflict with the quantity the administrator decided on.
///
/// The count lines are left as recorded; the final quantity lives on the
/// conflict.
///
/// # Errors
/// - Validation: quantity negative or not finite, conflict already resolved
/// - `NotFound`: conflict missing
#[instrument(skip(ctx))]
pub async fn resolve_conflict(
    ctx: &AppContext,
    conflict_id: i64,
    final_quantity: f64,
    actor: &str,
) -> Result<conflict::Model> {
    if !final_quantity.is_finite() || final_quantity < 0.0 {
        return Err(Error::validation(
            "final_quantity",
            format!("quantity must be zero or more, got {final_quantity}"),
        ));
    }

    let txn = ctx.database.begin().await?;
    let existing = Conflict::find_by_id(conflict_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("conflict", conflict_id))?;
    if existing.is_resolved {
        return Err(Error::validation(
            "conflict_id",
            format!("conflict {conflict_id} is already resolved"),
        ));
    }

    let mut active: conflict::ActiveModel = existing.into();
    active.is_resolved = Set(true);
    active.resolved_quantity = Set(Some(final_quantity));
    active.resolved_at = Set(Some(ctx.clock.now()));
    let resolved = active.update(&txn).await?;
    txn.commit().await?;

    info!(conflict_id, final_quantity, "Conflict resolved");
    audit::record(
        ctx.audit.as_ref(),
        format!("conflict {conflict_id} resolved with quantity {final_quantity}"),
        actor,
        AuditCategory::ConflictResolution,
    )
    .await;
    Ok(resolved)
}

/// Unresolved conflicts of a zone, oldest first.
pub async fn list_unresolved_conflicts(
    ctx: &AppContext,
    location_id: i64,
) -> Result<Vec<OpenConflict>> {
    let db = &ctx.database;
    runs::get_location(db, location_id).await?;

    let zone_runs: HashMap<i64, i32> = CountingRun::find()
        .filter(counting_run::Column::LocationId.eq(location_id))
        .all(db)
        .await?
        .into_iter()
        .map(|run| (run.id, run.count_type))
        .collect();

    let lines: HashMap<i64, count_line::Model> = CountLine::find()
        .filter(count_line::Column::RunId.is_in(zone_runs.keys().copied()))
        .all(db)
        .await?
        .into_iter()
        .map(|line| (line.id, line))
        .collect();

    let conflicts = Conflict::find()
        .filter(conflict::Column::CountLineId.is_in(lines.keys().copied()))
        .filter(conflict::Column::IsResolved.eq(false))
        .order_by_asc(conflict::Column::CreatedAt)
        .order_by_asc(conflict::Column::Id)
        .all(db)
        .await?;

    Ok(conflicts
        .into_iter()
        .filter_map(|conflict| {
            let line = lines.get(&conflict.count_line_id)?;
            Some(OpenConflict {
                run_id: line.run_id,
                count_type: zone_runs.get(&line.run_id).copied().unwrap_or_default(),
                product_id: line.product_id,
                quantity: line.quantity,
                conflict,
            })
        })
        .collect())
}
