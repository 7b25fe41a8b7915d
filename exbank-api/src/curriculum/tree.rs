//! Active hierarchy tree projection
//!
//! Read-only nested view of the active hierarchy, optionally restricted to a
//! set of grades. Every level is re-sorted here, ascending and
//! case-insensitive with the raw name as tiebreak; whatever order the
//! queries return is not trusted as the final order.

use exbank_common::db::models::{ExerciseType, Grade, Lesson, Textbook, Unit};
use exbank_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
pub struct TypeNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct LessonNode {
    pub id: String,
    pub name: String,
    pub types: Vec<TypeNode>,
}

#[derive(Debug, Serialize)]
pub struct UnitNode {
    pub id: String,
    pub name: String,
    pub lessons: Vec<LessonNode>,
}

#[derive(Debug, Serialize)]
pub struct TextbookNode {
    pub id: String,
    pub name: String,
    pub units: Vec<UnitNode>,
}

#[derive(Debug, Serialize)]
pub struct GradeNode {
    pub id: String,
    pub name: String,
    pub textbooks: Vec<TextbookNode>,
}

/// List the active hierarchy as sorted grade trees.
///
/// `grade_ids` restricts the result when non-empty; an empty filter behaves
/// like no filter.
pub async fn list_tree(pool: &SqlitePool, grade_ids: Option<&[String]>) -> Result<Vec<GradeNode>> {
    let types: Vec<ExerciseType> = sqlx::query_as(
        "SELECT guid, name, lesson_id, description FROM exercise_types WHERE deleted_at IS NULL",
    )
    .fetch_all(pool)
    .await?;
    let mut types_by_lesson: HashMap<String, Vec<TypeNode>> = HashMap::new();
    for t in types {
        types_by_lesson.entry(t.lesson_id).or_default().push(TypeNode {
            id: t.guid,
            name: t.name,
        });
    }

    let lessons: Vec<Lesson> =
        sqlx::query_as("SELECT guid, name, unit_id FROM lessons WHERE deleted_at IS NULL")
            .fetch_all(pool)
            .await?;
    let mut lessons_by_unit: HashMap<String, Vec<LessonNode>> = HashMap::new();
    for l in lessons {
        let mut types = types_by_lesson.remove(&l.guid).unwrap_or_default();
        sort_by_name(&mut types, |t| &t.name);
        lessons_by_unit.entry(l.unit_id).or_default().push(LessonNode {
            id: l.guid,
            name: l.name,
            types,
        });
    }

    let units: Vec<Unit> =
        sqlx::query_as("SELECT guid, name, textbook_id FROM units WHERE deleted_at IS NULL")
            .fetch_all(pool)
            .await?;
    let mut units_by_textbook: HashMap<String, Vec<UnitNode>> = HashMap::new();
    for u in units {
        let mut lessons = lessons_by_unit.remove(&u.guid).unwrap_or_default();
        sort_by_name(&mut lessons, |l| &l.name);
        units_by_textbook.entry(u.textbook_id).or_default().push(UnitNode {
            id: u.guid,
            name: u.name,
            lessons,
        });
    }

    let textbooks: Vec<Textbook> =
        sqlx::query_as("SELECT guid, name, grade_id FROM textbooks WHERE deleted_at IS NULL")
            .fetch_all(pool)
            .await?;
    let mut textbooks_by_grade: HashMap<String, Vec<TextbookNode>> = HashMap::new();
    for t in textbooks {
        let mut units = units_by_textbook.remove(&t.guid).unwrap_or_default();
        sort_by_name(&mut units, |u| &u.name);
        textbooks_by_grade.entry(t.grade_id).or_default().push(TextbookNode {
            id: t.guid,
            name: t.name,
            units,
        });
    }

    let grade_rows: Vec<Grade> =
        sqlx::query_as("SELECT guid, name FROM grades WHERE deleted_at IS NULL")
            .fetch_all(pool)
            .await?;

    let mut grades: Vec<GradeNode> = grade_rows
        .into_iter()
        .filter(|g| match grade_ids {
            Some(ids) if !ids.is_empty() => ids.iter().any(|id| id == &g.guid),
            _ => true,
        })
        .map(|g| {
            let mut textbooks = textbooks_by_grade.remove(&g.guid).unwrap_or_default();
            sort_by_name(&mut textbooks, |t| &t.name);
            GradeNode {
                id: g.guid,
                name: g.name,
                textbooks,
            }
        })
        .collect();
    sort_by_name(&mut grades, |g| &g.name);

    Ok(grades)
}

fn sort_by_name<T>(items: &mut [T], name: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        let (a, b) = (name(a), name(b));
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}
