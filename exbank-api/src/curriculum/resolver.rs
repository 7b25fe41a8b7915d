//! Hierarchy name resolution
//!
//! Resolves a trimmed name within its parent scope to an existing active
//! node, creating one when absent. Matching is case-insensitive; stored
//! names keep their original casing (trimmed).
//!
//! A `ResolverRun` lives for exactly one reconciliation call. It memoizes
//! every resolved node by (scope, normalized name) so repeated references
//! within the run hit the store at most once, and it records the distinct
//! names whose resolution created a node, for the import report.

use exbank_common::{Error, Result};
use sqlx::{Sqlite, Transaction};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Memo key: lowercased, trimmed
fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

pub struct ResolverRun {
    actor: String,
    grades: HashMap<String, String>,
    textbooks: HashMap<(String, String), String>,
    units: HashMap<(String, String), String>,
    lessons: HashMap<(String, String), String>,
    formats: HashMap<String, String>,
    types: HashMap<(String, String), String>,
    pub new_grades: Vec<String>,
    pub new_units: Vec<String>,
    pub new_lessons: Vec<String>,
    pub new_formats: Vec<String>,
    pub new_types: Vec<String>,
}

impl ResolverRun {
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            grades: HashMap::new(),
            textbooks: HashMap::new(),
            units: HashMap::new(),
            lessons: HashMap::new(),
            formats: HashMap::new(),
            types: HashMap::new(),
            new_grades: Vec::new(),
            new_units: Vec::new(),
            new_lessons: Vec::new(),
            new_formats: Vec::new(),
            new_types: Vec::new(),
        }
    }

    pub async fn grade(&mut self, tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<String> {
        let trimmed = validated(name)?;
        let key = normalize(trimmed);
        if let Some(guid) = self.grades.get(&key) {
            return Ok(guid.clone());
        }

        let (guid, created) = resolve_node(tx, "grades", None, trimmed, &self.actor).await?;
        if created {
            record_new(&mut self.new_grades, trimmed);
        }
        self.grades.insert(key, guid.clone());
        Ok(guid)
    }

    pub async fn textbook(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        grade_id: &str,
        name: &str,
    ) -> Result<String> {
        let trimmed = validated(name)?;
        let key = (grade_id.to_string(), normalize(trimmed));
        if let Some(guid) = self.textbooks.get(&key) {
            return Ok(guid.clone());
        }

        // New textbook names are not reported, unlike every other level
        let (guid, _created) =
            resolve_node(tx, "textbooks", Some(("grade_id", grade_id)), trimmed, &self.actor)
                .await?;
        self.textbooks.insert(key, guid.clone());
        Ok(guid)
    }

    pub async fn unit(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        textbook_id: &str,
        name: &str,
    ) -> Result<String> {
        let trimmed = validated(name)?;
        let key = (textbook_id.to_string(), normalize(trimmed));
        if let Some(guid) = self.units.get(&key) {
            return Ok(guid.clone());
        }

        let (guid, created) =
            resolve_node(tx, "units", Some(("textbook_id", textbook_id)), trimmed, &self.actor)
                .await?;
        if created {
            record_new(&mut self.new_units, trimmed);
        }
        self.units.insert(key, guid.clone());
        Ok(guid)
    }

    pub async fn lesson(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        unit_id: &str,
        name: &str,
    ) -> Result<String> {
        let trimmed = validated(name)?;
        let key = (unit_id.to_string(), normalize(trimmed));
        if let Some(guid) = self.lessons.get(&key) {
            return Ok(guid.clone());
        }

        let (guid, created) =
            resolve_node(tx, "lessons", Some(("unit_id", unit_id)), trimmed, &self.actor).await?;
        if created {
            record_new(&mut self.new_lessons, trimmed);
        }
        self.lessons.insert(key, guid.clone());
        Ok(guid)
    }

    pub async fn format(&mut self, tx: &mut Transaction<'_, Sqlite>, name: &str) -> Result<String> {
        let trimmed = validated(name)?;
        let key = normalize(trimmed);
        if let Some(guid) = self.formats.get(&key) {
            return Ok(guid.clone());
        }

        let (guid, created) = resolve_node(tx, "formats", None, trimmed, &self.actor).await?;
        if created {
            record_new(&mut self.new_formats, trimmed);
        }
        self.formats.insert(key, guid.clone());
        Ok(guid)
    }

    pub async fn exercise_type(
        &mut self,
        tx: &mut Transaction<'_, Sqlite>,
        lesson_id: &str,
        name: &str,
    ) -> Result<String> {
        let trimmed = validated(name)?;
        let key = (lesson_id.to_string(), normalize(trimmed));
        if let Some(guid) = self.types.get(&key) {
            return Ok(guid.clone());
        }

        let (guid, created) = resolve_node(
            tx,
            "exercise_types",
            Some(("lesson_id", lesson_id)),
            trimmed,
            &self.actor,
        )
        .await?;
        if created {
            record_new(&mut self.new_types, trimmed);
        }
        self.types.insert(key, guid.clone());
        Ok(guid)
    }
}

/// The report lists distinct names; the same name created in two different
/// scopes appears once.
fn record_new(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

fn validated(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("name must not be empty".into()));
    }
    Ok(trimmed)
}

/// Find one active node matching `name` case-insensitively in its scope, or
/// insert one. Returns the node guid and whether it was created.
///
/// A unique-index violation on insert means a concurrent writer created the
/// node between our lookup and insert; the winner's row is re-fetched and
/// returned as an existing node.
async fn resolve_node(
    tx: &mut Transaction<'_, Sqlite>,
    table: &str,
    scope: Option<(&str, &str)>,
    name: &str,
    actor: &str,
) -> Result<(String, bool)> {
    let mut select = format!(
        "SELECT guid FROM {table} WHERE deleted_at IS NULL AND LOWER(TRIM(name)) = LOWER(TRIM(?))"
    );
    if let Some((column, _)) = scope {
        select.push_str(&format!(" AND {column} = ?"));
    }

    if let Some(guid) = fetch_guid(tx, &select, name, scope).await? {
        return Ok((guid, false));
    }

    let guid = Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let insert = match scope {
        Some((column, _)) => format!(
            "INSERT INTO {table} (guid, name, {column}, created_at, created_by, updated_at, updated_by) \
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        ),
        None => format!(
            "INSERT INTO {table} (guid, name, created_at, created_by, updated_at, updated_by) \
             VALUES (?, ?, ?, ?, ?, ?)"
        ),
    };

    let mut query = sqlx::query(&insert).bind(&guid).bind(name);
    if let Some((_, parent_id)) = scope {
        query = query.bind(parent_id);
    }
    let query = query.bind(now).bind(actor).bind(now).bind(actor);

    match query.execute(&mut **tx).await {
        Ok(_) => {
            debug!("Created {} '{}'", table, name);
            Ok((guid, true))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            // Lost the create race; the committed row is the node
            fetch_guid(tx, &select, name, scope)
                .await?
                .map(|guid| (guid, false))
                .ok_or_else(|| {
                    Error::Internal(format!("{table} row missing after unique conflict"))
                })
        }
        Err(e) => Err(e.into()),
    }
}

async fn fetch_guid(
    tx: &mut Transaction<'_, Sqlite>,
    select: &str,
    name: &str,
    scope: Option<(&str, &str)>,
) -> Result<Option<String>> {
    let mut query = sqlx::query_scalar::<_, String>(select).bind(name);
    if let Some((_, parent_id)) = scope {
        query = query.bind(parent_id);
    }
    Ok(query.fetch_optional(&mut **tx).await?)
}
