//! In-memory driver
//!
//! Reference interpreter for the query and schema representations, used by
//! the test suite. Tables are plain vectors of records behind a mutex; a
//! query log records every executed query so tests can assert on dispatch
//! counts. Transactions snapshot the whole table map and restore it on
//! rollback or drop.
//!
//! This is test infrastructure, not a storage engine: no indexes, no
//! persistence, and only the constraints the representation carries
//! (unique sets and all-or-nothing checks) are enforced.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::driver::{Driver, Transaction};
use crate::error::{ConstraintError, OrmError, OrmResult};
use crate::query::{
    Aggregate, Comparator, FieldRef, Filter, FilterOp, JoinKind, OrderDirection, Query,
    QueryAction,
};
use crate::schema::{ColumnDefinition, SchemaStatement, TableConstraint, TableDefinition};
use crate::value::{Record, Value};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnDefinition>,
    auto_column: Option<String>,
    next_auto: i64,
    unique_sets: Vec<Vec<String>>,
    checks: Vec<Vec<String>>,
    rows: Vec<Record>,
}

impl Table {
    fn from_definition(def: &TableDefinition) -> Self {
        let mut table = Table {
            columns: def.columns.clone(),
            next_auto: 1,
            ..Table::default()
        };
        for column in &def.columns {
            if column.auto_increment && table.auto_column.is_none() {
                table.auto_column = Some(column.name.clone());
            }
            if column.unique {
                table.unique_sets.push(vec![column.name.clone()]);
            }
        }
        for constraint in &def.constraints {
            table.absorb_constraint(constraint);
        }
        table
    }

    fn absorb_constraint(&mut self, constraint: &TableConstraint) {
        match constraint {
            TableConstraint::PrimaryKey(columns) | TableConstraint::Unique(columns) => {
                self.unique_sets.push(columns.clone());
            }
            TableConstraint::AllOrNothing(columns) => {
                self.checks.push(columns.clone());
            }
            // Referential integrity is not interpreted here
            TableConstraint::ForeignKey { .. } => {}
        }
    }

    /// Fill generated and defaulted columns of an incoming row, returning
    /// the acknowledgement record with any generated key values
    fn prepare_insert(&mut self, row: &mut Record) -> Record {
        let mut ack = Record::new();
        if let Some(auto) = self.auto_column.clone() {
            match row.get(&auto) {
                None | Some(Value::Null) => {
                    let id = self.next_auto;
                    self.next_auto += 1;
                    row.set(auto.clone(), Value::Int(id));
                    ack.set(auto, Value::Int(id));
                }
                Some(Value::Int(n)) => {
                    // Caller-supplied id; keep the counter ahead of it
                    if *n >= self.next_auto {
                        self.next_auto = n + 1;
                    }
                }
                Some(_) => {}
            }
        }
        for column in &self.columns {
            if !row.contains(&column.name) {
                if let Some(default) = &column.default {
                    row.set(column.name.clone(), default.clone());
                }
            }
        }
        ack
    }

    fn enforce_checks(&self, name: &str, row: &Record) -> OrmResult<()> {
        for check in &self.checks {
            let set: Vec<bool> = check
                .iter()
                .map(|c| row.get(c).map(|v| !v.is_null()).unwrap_or(false))
                .collect();
            let any = set.iter().any(|b| *b);
            let all = set.iter().all(|b| *b);
            if any && !all {
                return Err(ConstraintError::Check {
                    table: name.to_string(),
                    message: format!(
                        "columns ({}) must be all set or all null",
                        check.join(", ")
                    ),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Check `row` against every unique set, ignoring the row at
    /// `skip_index` (the row itself during updates)
    fn enforce_unique(
        &self,
        name: &str,
        row: &Record,
        skip_index: Option<usize>,
    ) -> OrmResult<()> {
        for unique in &self.unique_sets {
            let candidate: Vec<Option<&Value>> = unique.iter().map(|c| row.get(c)).collect();
            // Null components never conflict
            if candidate
                .iter()
                .any(|v| v.map(|v| v.is_null()).unwrap_or(true))
            {
                continue;
            }
            for (i, existing) in self.rows.iter().enumerate() {
                if Some(i) == skip_index {
                    continue;
                }
                let collision = unique
                    .iter()
                    .zip(&candidate)
                    .all(|(c, v)| existing.get(c) == *v);
                if collision {
                    return Err(ConstraintError::Unique {
                        table: name.to_string(),
                        columns: unique.join(", "),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Table>,
    log: Vec<Query>,
}

/// In-memory reference driver
#[derive(Debug, Clone, Default)]
pub struct MemoryDriver {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query executed so far, in dispatch order
    pub fn query_log(&self) -> Vec<Query> {
        self.lock().log.clone()
    }

    /// Total number of executed queries
    pub fn query_count(&self) -> usize {
        self.lock().log.len()
    }

    /// Number of SELECT queries against one table
    pub fn select_count(&self, table: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|q| q.table == table && q.action == QueryAction::Select)
            .count()
    }

    /// Number of write queries (insert/update/delete) against one table
    pub fn write_count(&self, table: &str) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|q| {
                q.table == table
                    && matches!(
                        q.action,
                        QueryAction::Insert | QueryAction::Update | QueryAction::Delete
                    )
            })
            .count()
    }

    /// Forget the query log, keeping table contents
    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    /// Raw rows of a table, for assertions that bypass the query path
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // Lock poisoning only follows a panic in this module
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_select(state: &MemoryState, query: &Query) -> OrmResult<Vec<Record>> {
        let envs = Self::matched_envs(state, query)?;
        let mut envs = envs;
        sort_envs(&mut envs, query);
        let envs = apply_range(envs, query);
        Ok(envs
            .into_iter()
            .map(|env| {
                if query.fields.is_empty() {
                    env.base().clone()
                } else {
                    let mut projected = Record::new();
                    for field in &query.fields {
                        projected.set(field.column.clone(), env.lookup(field));
                    }
                    projected
                }
            })
            .collect())
    }

    fn run_aggregate(
        state: &MemoryState,
        query: &Query,
        aggregate: &Aggregate,
    ) -> OrmResult<Vec<Record>> {
        let envs = Self::matched_envs(state, query)?;
        if query.groups.is_empty() {
            return Ok(vec![compute_aggregate(&envs, aggregate)]);
        }
        // One output record per distinct group key tuple, keyed columns first
        let mut order: Vec<Vec<Value>> = Vec::new();
        let mut grouped: HashMap<Vec<Value>, Vec<Env>> = HashMap::new();
        for env in envs {
            let key: Vec<Value> = query.groups.iter().map(|g| env.lookup(g)).collect();
            if !grouped.contains_key(&key) {
                order.push(key.clone());
            }
            grouped.entry(key).or_default().push(env);
        }
        Ok(order
            .into_iter()
            .map(|key| {
                let members = &grouped[&key];
                let mut record = Record::new();
                for (group, value) in query.groups.iter().zip(key) {
                    record.set(group.column.clone(), value);
                }
                let agg = compute_aggregate(members, aggregate);
                for (name, value) in agg.iter() {
                    record.set(name.to_string(), value.clone());
                }
                record
            })
            .collect())
    }

    fn run_insert(state: &mut MemoryState, query: &Query) -> OrmResult<Vec<Record>> {
        // Unknown tables come into existence on first insert, without
        // constraints; migrations create constrained tables up front
        let table = state.tables.entry(query.table.clone()).or_insert_with(|| Table {
            next_auto: 1,
            ..Table::default()
        });
        let mut acks = Vec::with_capacity(query.input.len());
        let mut staged: Vec<Record> = Vec::with_capacity(query.input.len());
        for input in &query.input {
            let mut row = input.clone();
            let ack = table.prepare_insert(&mut row);
            table.enforce_checks(&query.table, &row)?;
            table.enforce_unique(&query.table, &row, None)?;
            // Staged rows must not collide with each other either
            for earlier in &staged {
                for unique in &table.unique_sets {
                    let collision = unique.iter().all(|c| {
                        matches!((row.get(c), earlier.get(c)),
                            (Some(a), Some(b)) if !a.is_null() && a == b)
                    });
                    if collision {
                        return Err(ConstraintError::Unique {
                            table: query.table.clone(),
                            columns: unique.join(", "),
                        }
                        .into());
                    }
                }
            }
            staged.push(row);
            acks.push(ack);
        }
        table.rows.extend(staged);
        Ok(acks)
    }

    fn run_update(state: &mut MemoryState, query: &Query) -> OrmResult<Vec<Record>> {
        let sets = query
            .input
            .first()
            .cloned()
            .ok_or_else(|| OrmError::Database("update without set-clauses".into()))?;
        let table = state
            .tables
            .get_mut(&query.table)
            .ok_or_else(|| OrmError::Database(format!("no such table `{}`", query.table)))?;

        let matched: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row_matches(&query.table, row, query))
            .map(|(i, _)| i)
            .collect();

        // Validate all updated rows before committing any of them
        let mut updated = Vec::with_capacity(matched.len());
        for &i in &matched {
            let mut row = table.rows[i].clone();
            for (name, value) in sets.iter() {
                row.set(name.to_string(), value.clone());
            }
            table.enforce_checks(&query.table, &row)?;
            table.enforce_unique(&query.table, &row, Some(i))?;
            updated.push(row);
        }
        for (&i, row) in matched.iter().zip(updated) {
            table.rows[i] = row;
        }
        Ok(vec![affected(matched.len())])
    }

    fn run_delete(state: &mut MemoryState, query: &Query) -> OrmResult<Vec<Record>> {
        let table = state
            .tables
            .get_mut(&query.table)
            .ok_or_else(|| OrmError::Database(format!("no such table `{}`", query.table)))?;
        let before = table.rows.len();
        let query_table = query.table.clone();
        table
            .rows
            .retain(|row| !row_matches(&query_table, row, query));
        Ok(vec![affected(before - table.rows.len())])
    }

    /// Apply joins and the filter tree, producing one environment per
    /// surviving result row
    fn matched_envs(state: &MemoryState, query: &Query) -> OrmResult<Vec<Env>> {
        let base = state
            .tables
            .get(&query.table)
            .ok_or_else(|| OrmError::Database(format!("no such table `{}`", query.table)))?;

        let mut envs: Vec<Env> = base
            .rows
            .iter()
            .map(|row| Env::new(query.table.clone(), row.clone()))
            .collect();

        for join in &query.joins {
            let joined = state
                .tables
                .get(&join.table)
                .ok_or_else(|| OrmError::Database(format!("no such table `{}`", join.table)))?;
            let name = join.alias.clone().unwrap_or_else(|| join.table.clone());
            let mut next = Vec::new();
            for env in envs {
                let mut matched_any = false;
                for row in &joined.rows {
                    let hit = join.on.iter().all(|(left, right)| {
                        env.lookup(left) == row.get(&right.column).cloned().unwrap_or(Value::Null)
                    });
                    if hit {
                        matched_any = true;
                        next.push(env.extended(name.clone(), row.clone()));
                    }
                }
                if !matched_any && join.kind == JoinKind::Left {
                    next.push(env.extended(name.clone(), Record::new()));
                }
            }
            envs = next;
        }

        if let Some(filter) = &query.filter {
            envs.retain(|env| eval_filter(env, filter));
        }
        Ok(envs)
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn execute(&self, query: &Query) -> OrmResult<Vec<Record>> {
        let mut state = self.lock();
        state.log.push(query.clone());
        match &query.action {
            QueryAction::Select => Self::run_select(&state, query),
            QueryAction::Aggregate(aggregate) => Self::run_aggregate(&state, query, aggregate),
            QueryAction::Insert => Self::run_insert(&mut state, query),
            QueryAction::Update => Self::run_update(&mut state, query),
            QueryAction::Delete => Self::run_delete(&mut state, query),
        }
    }

    async fn execute_schema(&self, statement: &SchemaStatement) -> OrmResult<()> {
        let mut state = self.lock();
        match statement {
            SchemaStatement::CreateTable(def) => {
                if state.tables.contains_key(&def.name) {
                    if def.if_not_exists {
                        return Ok(());
                    }
                    return Err(OrmError::Database(format!(
                        "table `{}` already exists",
                        def.name
                    )));
                }
                state
                    .tables
                    .insert(def.name.clone(), Table::from_definition(def));
                Ok(())
            }
            SchemaStatement::AlterTable {
                table,
                add_columns,
                drop_columns,
                add_constraints,
            } => {
                let t = state
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| OrmError::Database(format!("no such table `{table}`")))?;
                for column in add_columns {
                    t.columns.push(column.clone());
                }
                for name in drop_columns {
                    t.columns.retain(|c| c.name != *name);
                    for row in &mut t.rows {
                        row.remove(name);
                    }
                }
                for constraint in add_constraints {
                    t.absorb_constraint(constraint);
                }
                Ok(())
            }
            SchemaStatement::DropTable { table } => {
                state
                    .tables
                    .remove(table)
                    .map(|_| ())
                    .ok_or_else(|| OrmError::Database(format!("no such table `{table}`")))
            }
        }
    }

    async fn begin(&self) -> OrmResult<Box<dyn Transaction>> {
        let snapshot = self.lock().tables.clone();
        Ok(Box::new(MemoryTransaction {
            driver: self.clone(),
            snapshot: Mutex::new(Some(snapshot)),
        }))
    }
}

/// Snapshot transaction: statements apply to the live table map; rollback
/// (or drop without commit) restores the snapshot taken at `begin`
pub struct MemoryTransaction {
    driver: MemoryDriver,
    snapshot: Mutex<Option<HashMap<String, Table>>>,
}

impl MemoryTransaction {
    fn restore(&self) {
        if let Some(snapshot) = self.snapshot.lock().unwrap_or_else(|e| e.into_inner()).take() {
            self.driver.lock().tables = snapshot;
        }
    }

    fn discard(&self) {
        self.snapshot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(self.driver.clone())
    }

    async fn commit(self: Box<Self>) -> OrmResult<()> {
        self.discard();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> OrmResult<()> {
        self.restore();
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        self.restore();
    }
}

/// One result row with its joined companions. Entry 0 is the base table;
/// unqualified field references resolve against it.
#[derive(Debug, Clone)]
struct Env {
    entries: Vec<(String, Record)>,
}

impl Env {
    fn new(table: String, row: Record) -> Self {
        Self {
            entries: vec![(table, row)],
        }
    }

    fn extended(&self, name: String, row: Record) -> Self {
        let mut entries = self.entries.clone();
        entries.push((name, row));
        Self { entries }
    }

    fn base(&self) -> &Record {
        &self.entries[0].1
    }

    fn lookup(&self, field: &FieldRef) -> Value {
        let record = match &field.table {
            Some(table) => self
                .entries
                .iter()
                .find(|(name, _)| name == table)
                .map(|(_, r)| r),
            None => self.entries.first().map(|(_, r)| r),
        };
        record
            .and_then(|r| r.get(&field.column))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

fn row_matches(table: &str, row: &Record, query: &Query) -> bool {
    match &query.filter {
        Some(filter) => {
            let env = Env::new(table.to_string(), row.clone());
            eval_filter(&env, filter)
        }
        None => true,
    }
}

fn eval_filter(env: &Env, filter: &Filter) -> bool {
    match filter {
        Filter::Value {
            field,
            comparator,
            value,
        } => eval_comparison(&env.lookup(field), *comparator, value),
        Filter::Field {
            left,
            comparator,
            right,
        } => eval_comparison(&env.lookup(left), *comparator, &env.lookup(right)),
        Filter::Group { op, filters } => match op {
            FilterOp::And => filters.iter().all(|f| eval_filter(env, f)),
            FilterOp::Or => filters.iter().any(|f| eval_filter(env, f)),
        },
    }
}

fn eval_comparison(actual: &Value, comparator: Comparator, bound: &Value) -> bool {
    use std::cmp::Ordering;
    match comparator {
        Comparator::Equal => actual == bound,
        Comparator::NotEqual => actual != bound,
        Comparator::LessThan => {
            !actual.is_null() && actual.compare(bound) == Ordering::Less
        }
        Comparator::LessThanOrEqual => {
            !actual.is_null() && actual.compare(bound) != Ordering::Greater
        }
        Comparator::GreaterThan => {
            !actual.is_null() && actual.compare(bound) == Ordering::Greater
        }
        Comparator::GreaterThanOrEqual => {
            !actual.is_null() && actual.compare(bound) != Ordering::Less
        }
        Comparator::Like => match (actual, bound) {
            (Value::String(text), Value::String(pattern)) => like_match(pattern, text),
            _ => false,
        },
        Comparator::NotLike => match (actual, bound) {
            (Value::String(text), Value::String(pattern)) => !like_match(pattern, text),
            _ => false,
        },
        Comparator::In => match bound {
            Value::Array(values) => !actual.is_null() && values.contains(actual),
            _ => false,
        },
        Comparator::NotIn => match bound {
            Value::Array(values) => !actual.is_null() && !values.contains(actual),
            _ => false,
        },
        Comparator::IsNull => actual.is_null(),
        Comparator::IsNotNull => !actual.is_null(),
    }
}

/// SQL LIKE with `%` (any run) and `_` (any one character)
fn like_match(pattern: &str, text: &str) -> bool {
    fn inner(pattern: &[char], text: &[char]) -> bool {
        match pattern.split_first() {
            None => text.is_empty(),
            Some(('%', rest)) => {
                (0..=text.len()).any(|skip| inner(rest, &text[skip..]))
            }
            Some(('_', rest)) => !text.is_empty() && inner(rest, &text[1..]),
            Some((ch, rest)) => {
                text.first() == Some(ch) && inner(rest, &text[1..])
            }
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    inner(&pattern, &text)
}

fn sort_envs(envs: &mut [Env], query: &Query) {
    if query.sorts.is_empty() {
        return;
    }
    envs.sort_by(|a, b| {
        for sort in &query.sorts {
            let ord = a.lookup(&sort.field).compare(&b.lookup(&sort.field));
            let ord = match sort.direction {
                OrderDirection::Asc => ord,
                OrderDirection::Desc => ord.reverse(),
            };
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn apply_range(envs: Vec<Env>, query: &Query) -> Vec<Env> {
    match query.range {
        Some(range) => {
            let iter = envs.into_iter().skip(range.offset as usize);
            match range.limit {
                Some(limit) => iter.take(limit as usize).collect(),
                None => iter.collect(),
            }
        }
        None => envs,
    }
}

fn compute_aggregate(envs: &[Env], aggregate: &Aggregate) -> Record {
    let mut record = Record::new();
    match aggregate {
        Aggregate::Count => {
            record.set("count", Value::Int(envs.len() as i64));
        }
        Aggregate::Sum(column) => {
            record.set("sum", numeric_fold(envs, column, Fold::Sum));
        }
        Aggregate::Average(column) => {
            record.set("average", numeric_fold(envs, column, Fold::Average));
        }
        Aggregate::Min(column) => {
            record.set("min", extremum(envs, column, std::cmp::Ordering::Less));
        }
        Aggregate::Max(column) => {
            record.set("max", extremum(envs, column, std::cmp::Ordering::Greater));
        }
    }
    record
}

enum Fold {
    Sum,
    Average,
}

fn numeric_fold(envs: &[Env], column: &str, fold: Fold) -> Value {
    let field = FieldRef::parse(column);
    let mut sum = 0.0f64;
    let mut count = 0u64;
    let mut all_int = true;
    for env in envs {
        match env.lookup(&field) {
            Value::Int(n) => {
                sum += n as f64;
                count += 1;
            }
            Value::Float(f) => {
                sum += f;
                count += 1;
                all_int = false;
            }
            _ => {}
        }
    }
    if count == 0 {
        return Value::Null;
    }
    match fold {
        Fold::Sum if all_int => Value::Int(sum as i64),
        Fold::Sum => Value::Float(sum),
        Fold::Average => Value::Float(sum / count as f64),
    }
}

fn extremum(envs: &[Env], column: &str, keep: std::cmp::Ordering) -> Value {
    let field = FieldRef::parse(column);
    let mut best: Option<Value> = None;
    for env in envs {
        let value = env.lookup(&field);
        if value.is_null() {
            continue;
        }
        best = Some(match best {
            None => value,
            Some(current) if value.compare(&current) == keep => value,
            Some(current) => current,
        });
    }
    best.unwrap_or(Value::Null)
}

fn affected(n: usize) -> Record {
    let mut record = Record::new();
    record.set("affected", Value::Int(n as i64));
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_matches_wildcards() {
        assert!(like_match("Messier%", "Messier 82"));
        assert!(like_match("%82", "Messier 82"));
        assert!(like_match("M_ssier 82", "Messier 82"));
        assert!(!like_match("Messier", "Messier 82"));
    }

    #[tokio::test]
    async fn insert_assigns_auto_increment_and_acknowledges_it() {
        let driver = MemoryDriver::new();
        driver
            .execute_schema(
                &crate::schema::Schema::create("galaxies")
                    .id()
                    .column("name", crate::schema::ColumnType::Text)
                    .build(),
            )
            .await
            .unwrap();

        let mut row = Record::new();
        row.set("name", "Milky Way");
        let acks = driver
            .execute(&Query::insert("galaxies", vec![row]))
            .await
            .unwrap();
        assert_eq!(acks[0].get("id"), Some(&Value::Int(1)));
        assert_eq!(driver.rows("galaxies")[0].get("id"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn unique_violation_is_classified() {
        let driver = MemoryDriver::new();
        driver
            .execute_schema(
                &crate::schema::Schema::create("tags")
                    .id()
                    .column("name", crate::schema::ColumnType::Text)
                    .unique()
                    .build(),
            )
            .await
            .unwrap();

        let mut row = Record::new();
        row.set("name", "rocky");
        driver
            .execute(&Query::insert("tags", vec![row.clone()]))
            .await
            .unwrap();
        let err = driver
            .execute(&Query::insert("tags", vec![row]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrmError::Constraint(ConstraintError::Unique { .. })
        ));
    }

    #[tokio::test]
    async fn rollback_restores_the_snapshot() {
        let driver = MemoryDriver::new();
        let mut row = Record::new();
        row.set("name", "Earth");
        driver
            .execute(&Query::insert("planets", vec![row]))
            .await
            .unwrap();

        let tx = driver.begin().await.unwrap();
        let scoped = tx.driver();
        let mut row = Record::new();
        row.set("name", "Krypton");
        scoped
            .execute(&Query::insert("planets", vec![row]))
            .await
            .unwrap();
        assert_eq!(driver.rows("planets").len(), 2);
        tx.rollback().await.unwrap();
        assert_eq!(driver.rows("planets").len(), 1);
    }
}
