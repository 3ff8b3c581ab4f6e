//! Counting run lifecycle.
//!
//! A run moves `NotStarted -> InProgress -> Completed`. An in-progress run with
//! no lines can be released (deleted), and an administrator can force-complete
//! every open run of a zone and pass. Every mutation is one store transaction;
//! concurrent starts are not locked out in-process but caught by the partial
//! unique index on open runs and reported as a conflict.

use crate::{
    core::{context::AppContext, operator::OperatorIdentity, product, resolver},
    entities::{
        Conflict, CountLine, CountingRun, InventorySession, Location, conflict, count_line,
        counting_run, inventory_session, location, product as product_entity,
    },
    errors::{ConflictReason, Error, NoActiveRunReason, Result},
    ports::{AuditCategory, audit},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    DatabaseTransaction, QueryOrder, QuerySelect, Select, Set, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use tracing::{info, instrument, warn};

/// Pass types accepted by the public operations.
pub const PASS_TYPES: RangeInclusive<i32> = 1..=3;

/// One scanned code and its counted quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanItem {
    /// Code as scanned or typed
    pub code: String,
    /// Counted quantity, strictly positive
    pub quantity: f64,
}

impl ScanItem {
    /// Convenience constructor.
    pub fn new(code: impl Into<String>, quantity: f64) -> Self {
        Self {
            code: code.into(),
            quantity,
        }
    }
}

/// Which run a completion targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    /// A known run, open or already completed (resubmission)
    Run(i64),
    /// The operator's open run in a zone; started on the fly if none is open
    Zone {
        /// Zone being counted
        location_id: i64,
        /// Operator submitting the count
        operator: OperatorIdentity,
    },
}

/// Result of a completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedRun {
    /// Completed run
    pub run_id: i64,
    /// Number of stored lines
    pub item_count: usize,
    /// Sum of stored quantities
    pub total_quantity: f64,
}

/// One line of a run, with its product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunLine {
    /// Line id
    pub line_id: i64,
    /// Product id
    pub product_id: i64,
    /// Product SKU
    pub sku: String,
    /// Product raw code
    pub ean: Option<String>,
    /// Product name
    pub name: String,
    /// Counted quantity
    pub quantity: f64,
}

/// A run with its lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunDetail {
    /// The run
    pub run: counting_run::Model,
    /// Operator display value
    pub operator: Option<String>,
    /// Lines ordered by SKU
    pub lines: Vec<RunLine>,
    /// Sum of line quantities
    pub total_quantity: f64,
}

/// Rejects pass types outside [`PASS_TYPES`].
pub fn validate_count_type(count_type: i32) -> Result<()> {
    if PASS_TYPES.contains(&count_type) {
        Ok(())
    } else {
        Err(Error::validation(
            "count_type",
            format!("pass type must be 1, 2 or 3, got {count_type}"),
        ))
    }
}

/// Starts a run, or returns the operator's open run for the same zone and pass.
///
/// A new run gets a new session unless `session_hint` names an open session of
/// the same shop.
///
/// # Errors
/// - Validation: bad pass type, disabled zone, unusable operator, closed hint
/// - `NotFound`: zone or hinted session missing
/// - Conflict (`OpenRunExists`): a concurrent start won the race
#[instrument(skip(ctx))]
pub async fn start_run(
    ctx: &AppContext,
    location_id: i64,
    count_type: i32,
    operator: &OperatorIdentity,
    session_hint: Option<i64>,
) -> Result<counting_run::Model> {
    validate_count_type(count_type)?;

    let txn = ctx.database.begin().await?;
    let (run, created) =
        open_run_in(&txn, ctx, location_id, count_type, operator, session_hint).await?;
    txn.commit().await?;

    if created {
        info!(run_id = run.id, location_id, count_type, "Run started");
        audit::record(
            ctx.audit.as_ref(),
            format!("run {} started on location {location_id}, pass {count_type}", run.id),
            &operator.to_string(),
            AuditCategory::RunLifecycle,
        )
        .await;
    } else {
        info!(run_id = run.id, location_id, count_type, "Resuming open run");
    }
    Ok(run)
}

/// Finds or creates the open run inside `txn`. The flag tells whether it was
/// created.
async fn open_run_in(
    txn: &DatabaseTransaction,
    ctx: &AppContext,
    location_id: i64,
    count_type: i32,
    operator: &OperatorIdentity,
    session_hint: Option<i64>,
) -> Result<(counting_run::Model, bool)> {
    let zone = get_location(txn, location_id).await?;
    if zone.disabled {
        return Err(Error::validation(
            "location",
            format!("zone {} is disabled", zone.code),
        ));
    }
    operator
        .ensure_resolvable(txn, &ctx.capabilities, zone.shop_id)
        .await?;

    if let Some(existing) = open_runs(location_id, count_type)
        .filter(operator.run_condition())
        .one(txn)
        .await?
    {
        return Ok((existing, false));
    }

    let now = ctx.clock.now();
    let session_id = match session_hint {
        Some(session_id) => {
            let session = InventorySession::find_by_id(session_id)
                .one(txn)
                .await?
                .ok_or_else(|| Error::not_found("session", session_id))?;
            if session.shop_id != zone.shop_id {
                return Err(Error::validation(
                    "session",
                    format!("session {session_id} belongs to another shop"),
                ));
            }
            if session.completed_at.is_some() {
                return Err(Error::validation(
                    "session",
                    format!("session {session_id} is already completed"),
                ));
            }
            session.id
        }
        None => {
            inventory_session::ActiveModel {
                shop_id: Set(zone.shop_id),
                name: Set(format!("{} / pass {count_type}", zone.code)),
                started_at: Set(now),
                completed_at: Set(None),
                ..Default::default()
            }
            .insert(txn)
            .await?
            .id
        }
    };

    let run = insert_open_run(txn, session_id, location_id, count_type, operator, now).await?;
    Ok((run, true))
}

/// Inserts an open run; a violation of the open-run index becomes a conflict.
pub(crate) async fn insert_open_run<C>(
    db: &C,
    session_id: i64,
    location_id: i64,
    count_type: i32,
    operator: &OperatorIdentity,
    now: DateTime<Utc>,
) -> Result<counting_run::Model>
where
    C: ConnectionTrait,
{
    let (operator_name, shop_user_id) = operator.columns();
    counting_run::ActiveModel {
        session_id: Set(session_id),
        location_id: Set(location_id),
        count_type: Set(count_type),
        started_at: Set(now),
        completed_at: Set(None),
        operator_name: Set(operator_name),
        shop_user_id: Set(shop_user_id),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|e| {
        Error::from_unique_violation(
            e,
            ConflictReason::OpenRunExists,
            &format!("{operator} already has an open run for this zone and pass"),
        )
    })
}

/// Records the counted items of a run and completes it.
///
/// Duplicate codes are summed. Unknown codes become placeholder products.
/// Existing lines of the run are replaced, so resubmitting a corrected count
/// leaves exactly the new submission. Everything happens in one transaction.
///
/// # Errors
/// - Validation: bad pass type, no items, implausible code, non-positive quantity,
///   pass type differing from the run's
/// - `NotFound`: run or zone missing
/// - Conflict (`AmbiguousCode`): a code matched several products
#[instrument(skip(ctx, items), fields(items = items.len()))]
pub async fn complete_run(
    ctx: &AppContext,
    target: &RunTarget,
    count_type: i32,
    items: &[ScanItem],
) -> Result<CompletedRun> {
    validate_count_type(count_type)?;
    let aggregated = aggregate_items(items, ctx.limits.max_code_length)?;

    let txn = ctx.database.begin().await?;

    let run = match target {
        RunTarget::Run(run_id) => {
            let run = CountingRun::find_by_id(*run_id)
                .one(&txn)
                .await?
                .ok_or_else(|| Error::not_found("run", run_id))?;
            if run.count_type != count_type {
                return Err(Error::validation(
                    "count_type",
                    format!("run {run_id} is pass {}, not {count_type}", run.count_type),
                ));
            }
            run
        }
        RunTarget::Zone {
            location_id,
            operator,
        } => open_run_in(&txn, ctx, *location_id, count_type, operator, None).await?.0,
    };
    let zone = get_location(&txn, run.location_id).await?;
    let actor = OperatorIdentity::from_run(&run).map_or_else(String::new, |op| op.to_string());

    // Resolve every code; the same product may be reached by two codes
    let mut quantities: Vec<(i64, f64)> = Vec::with_capacity(aggregated.len());
    let mut positions: HashMap<i64, usize> = HashMap::new();
    for (code, quantity) in aggregated {
        let product_id = resolve_or_create(&txn, ctx, zone.shop_id, &code, &actor).await?;
        match positions.get(&product_id) {
            Some(&index) => quantities[index].1 += quantity,
            None => {
                positions.insert(product_id, quantities.len());
                quantities.push((product_id, quantity));
            }
        }
    }

    replace_lines(&txn, run.id, &quantities).await?;

    let now = ctx.clock.now();
    let was_completed = run.completed_at.is_some();
    let session_id = run.session_id;
    let mut active: counting_run::ActiveModel = run.into();
    active.completed_at = Set(Some(now));
    let run = active.update(&txn).await?;

    close_idle_sessions(&txn, vec![session_id], now).await?;

    txn.commit().await?;

    let total_quantity: f64 = quantities.iter().map(|(_, q)| q).sum();
    info!(
        run_id = run.id,
        lines = quantities.len(),
        total_quantity,
        resubmission = was_completed,
        "Run completed"
    );
    audit::record(
        ctx.audit.as_ref(),
        format!(
            "run {} completed with {} lines, total {total_quantity}",
            run.id,
            quantities.len()
        ),
        &actor,
        AuditCategory::RunLifecycle,
    )
    .await;

    Ok(CompletedRun {
        run_id: run.id,
        item_count: quantities.len(),
        total_quantity,
    })
}

/// Validates items and sums quantities per trimmed code, keeping first-seen order.
fn aggregate_items(items: &[ScanItem], max_code_length: usize) -> Result<Vec<(String, f64)>> {
    if items.is_empty() {
        return Err(Error::validation("items", "at least one item is required"));
    }

    let mut aggregated: Vec<(String, f64)> = Vec::with_capacity(items.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        let code = product::validate_code(
            &format!("items[{index}].code"),
            &item.code,
            max_code_length,
        )?;
        if !item.quantity.is_finite() || item.quantity <= 0.0 {
            return Err(Error::validation(
                format!("items[{index}].quantity"),
                format!("quantity must be strictly positive, got {}", item.quantity),
            ));
        }

        match positions.get(code) {
            Some(&position) => aggregated[position].1 += item.quantity,
            None => {
                positions.insert(code.to_string(), aggregated.len());
                aggregated.push((code.to_string(), item.quantity));
            }
        }
    }
    Ok(aggregated)
}

async fn resolve_or_create(
    txn: &DatabaseTransaction,
    ctx: &AppContext,
    shop_id: i64,
    code: &str,
    actor: &str,
) -> Result<i64> {
    match resolver::resolve_code(txn, ctx.audit.as_ref(), shop_id, code, actor).await? {
        resolver::Resolution::Found { product, .. } => Ok(product.id),
        resolver::Resolution::NotFound { .. } => {
            let created = product::create_product(
                txn,
                product::NewProduct::placeholder(shop_id, code),
                ctx.clock.now(),
            )
            .await?;
            info!(product_id = created.id, code, "Created placeholder product");
            Ok(created.id)
        }
        resolver::Resolution::Ambiguous(m) => {
            let skus: Vec<&str> = m.candidates.iter().map(|c| c.sku.as_str()).collect();
            Err(Error::conflict(
                ConflictReason::AmbiguousCode,
                format!("code {} matches several products: {}", m.input, skus.join(", ")),
            ))
        }
    }
}

/// Deletes the run's lines (and conflicts anchored to them) and inserts the new ones.
async fn replace_lines(txn: &DatabaseTransaction, run_id: i64, quantities: &[(i64, f64)]) -> Result<()> {
    let old_line_ids: Vec<i64> = CountLine::find()
        .filter(count_line::Column::RunId.eq(run_id))
        .all(txn)
        .await?
        .into_iter()
        .map(|line| line.id)
        .collect();

    if !old_line_ids.is_empty() {
        let dropped = Conflict::delete_many()
            .filter(conflict::Column::CountLineId.is_in(old_line_ids))
            .exec(txn)
            .await?;
        if dropped.rows_affected > 0 {
            warn!(
                run_id,
                conflicts = dropped.rows_affected,
                "Resubmission dropped conflicts raised on the previous lines"
            );
        }
        CountLine::delete_many()
            .filter(count_line::Column::RunId.eq(run_id))
            .exec(txn)
            .await?;
    }

    let lines = quantities
        .iter()
        .map(|&(product_id, quantity)| count_line::ActiveModel {
            run_id: Set(run_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            ..Default::default()
        });
    CountLine::insert_many(lines).exec(txn).await?;
    Ok(())
}

/// Deletes a run that has no lines yet, and its session if nothing else uses it.
///
/// # Errors
/// - `NotFound`: run missing
/// - Conflict (`NotRunOwner`): `operator` did not start the run
/// - Conflict (`RunHasLines`): the run already recorded counts
#[instrument(skip(ctx))]
pub async fn release_run(ctx: &AppContext, run_id: i64, operator: &OperatorIdentity) -> Result<()> {
    let txn = ctx.database.begin().await?;

    let run = CountingRun::find_by_id(run_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("run", run_id))?;
    if !operator.signed(&run) {
        warn!(run_id, %operator, "Release refused: not the run owner");
        return Err(Error::conflict(
            ConflictReason::NotRunOwner,
            format!("run {run_id} was not started by {operator}"),
        ));
    }

    let line_count = CountLine::find()
        .filter(count_line::Column::RunId.eq(run_id))
        .count(&txn)
        .await?;
    if line_count > 0 {
        warn!(run_id, line_count, "Release refused: run has lines");
        return Err(Error::conflict(
            ConflictReason::RunHasLines,
            format!("run {run_id} already has {line_count} lines; complete it instead"),
        ));
    }

    let session_id = run.session_id;
    run.delete(&txn).await?;

    let remaining = CountingRun::find()
        .filter(counting_run::Column::SessionId.eq(session_id))
        .count(&txn)
        .await?;
    if remaining == 0 {
        InventorySession::delete_by_id(session_id).exec(&txn).await?;
    }

    txn.commit().await?;

    info!(run_id, "Run released");
    audit::record(
        ctx.audit.as_ref(),
        format!("run {run_id} released"),
        &operator.to_string(),
        AuditCategory::RunLifecycle,
    )
    .await;
    Ok(())
}

/// Force-completes every open run of a zone and pass, whatever its content.
///
/// Returns how many runs were closed; zero when nothing was open.
#[instrument(skip(ctx))]
pub async fn restart_for_location(
    ctx: &AppContext,
    location_id: i64,
    count_type: i32,
    actor: &str,
) -> Result<u64> {
    validate_count_type(count_type)?;

    let txn = ctx.database.begin().await?;
    get_location(&txn, location_id).await?;

    let open = open_runs(location_id, count_type).all(&txn).await?;
    if open.is_empty() {
        txn.commit().await?;
        return Ok(0);
    }

    let now = ctx.clock.now();
    let run_ids: Vec<i64> = open.iter().map(|run| run.id).collect();
    let session_ids: Vec<i64> = open.iter().map(|run| run.session_id).collect();

    let closed = CountingRun::update_many()
        .col_expr(counting_run::Column::CompletedAt, Expr::value(now))
        .filter(counting_run::Column::Id.is_in(run_ids.clone()))
        .exec(&txn)
        .await?
        .rows_affected;
    close_idle_sessions(&txn, session_ids, now).await?;

    txn.commit().await?;

    warn!(location_id, count_type, closed, "Open runs force-completed");
    audit::record(
        ctx.audit.as_ref(),
        format!("force-completed runs {run_ids:?} on location {location_id}, pass {count_type}"),
        actor,
        AuditCategory::RunLifecycle,
    )
    .await;
    Ok(closed)
}

/// Completes those of `session_ids` that no longer hold an open run.
async fn close_idle_sessions(
    txn: &DatabaseTransaction,
    session_ids: Vec<i64>,
    now: DateTime<Utc>,
) -> Result<()> {
    let busy: Vec<i64> = CountingRun::find()
        .select_only()
        .column(counting_run::Column::SessionId)
        .distinct()
        .filter(counting_run::Column::SessionId.is_in(session_ids.clone()))
        .filter(counting_run::Column::CompletedAt.is_null())
        .into_tuple()
        .all(txn)
        .await?;

    InventorySession::update_many()
        .col_expr(inventory_session::Column::CompletedAt, Expr::value(now))
        .filter(inventory_session::Column::Id.is_in(session_ids))
        .filter(inventory_session::Column::Id.is_not_in(busy))
        .filter(inventory_session::Column::CompletedAt.is_null())
        .exec(txn)
        .await?;
    Ok(())
}

/// Looks up the operator's open run so a client can resume it.
///
/// # Errors
/// - `NotFound`: zone missing
/// - `NoActiveRun` with the reason the lookup failed
#[instrument(skip(ctx))]
pub async fn find_active_run(
    ctx: &AppContext,
    location_id: i64,
    count_type: i32,
    operator: &OperatorIdentity,
    session_id: Option<i64>,
) -> Result<counting_run::Model> {
    validate_count_type(count_type)?;
    let db = &ctx.database;
    let zone = get_location(db, location_id).await?;

    if let Some(session_id) = session_id {
        let open_session = InventorySession::find_by_id(session_id)
            .one(db)
            .await?
            .is_some_and(|s| s.completed_at.is_none() && s.shop_id == zone.shop_id);
        if !open_session {
            return Err(Error::NoActiveRun {
                reason: NoActiveRunReason::NoActiveSession,
            });
        }
    }

    if operator
        .unresolvable_reason(db, &ctx.capabilities, zone.shop_id)
        .await?
        .is_some()
    {
        return Err(Error::NoActiveRun {
            reason: NoActiveRunReason::OperatorUnresolvable,
        });
    }

    let mut candidates = open_runs(location_id, count_type);
    if let Some(session_id) = session_id {
        candidates = candidates.filter(counting_run::Column::SessionId.eq(session_id));
    }
    let open = candidates.all(db).await?;
    if open.is_empty() && session_id.is_none() {
        return Err(Error::NoActiveRun {
            reason: NoActiveRunReason::NoActiveSession,
        });
    }

    open.into_iter()
        .find(|run| operator.signed(run))
        .ok_or(Error::NoActiveRun {
            reason: NoActiveRunReason::NoMatchingRun,
        })
}

/// A run with its lines and resolved operator.
pub async fn get_run_detail(ctx: &AppContext, run_id: i64) -> Result<RunDetail> {
    let db = &ctx.database;
    let run = CountingRun::find_by_id(run_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("run", run_id))?;

    let operator = match OperatorIdentity::from_run(&run) {
        Some(identity) => Some(identity.display_name(db).await?),
        None => None,
    };

    let rows = CountLine::find()
        .filter(count_line::Column::RunId.eq(run_id))
        .find_also_related(product_entity::Entity)
        .order_by_asc(product_entity::Column::SkuKey)
        .all(db)
        .await?;

    let lines: Vec<RunLine> = rows
        .into_iter()
        .filter_map(|(line, product)| {
            product.map(|p| RunLine {
                line_id: line.id,
                product_id: p.id,
                sku: p.sku,
                ean: p.ean,
                name: p.name,
                quantity: line.quantity,
            })
        })
        .collect();
    let total_quantity = lines.iter().map(|line| line.quantity).sum();

    Ok(RunDetail {
        run,
        operator,
        lines,
        total_quantity,
    })
}

/// Open runs of a zone and pass, oldest first.
fn open_runs(location_id: i64, count_type: i32) -> Select<CountingRun> {
    CountingRun::find()
        .filter(counting_run::Column::LocationId.eq(location_id))
        .filter(counting_run::Column::CountType.eq(count_type))
        .filter(counting_run::Column::CompletedAt.is_null())
        .order_by_asc(counting_run::Column::StartedAt)
        .order_by_asc(counting_run::Column::Id)
}

/// Loads a zone or fails with `NotFound`.
pub async fn get_location<C>(db: &C, location_id: i64) -> Result<location::Model>
where
    C: ConnectionTrait,
{
    Location::find_by_id(location_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("location", location_id))
}
