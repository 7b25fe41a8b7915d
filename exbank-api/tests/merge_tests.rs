//! Merge coordinator integration tests

mod helpers;

use exbank_api::curriculum::import::import_exercises;
use exbank_api::curriculum::merge::{merge, MergeTable};
use exbank_api::curriculum::tree::list_tree;
use exbank_common::Error;
use helpers::{count_active, create_test_db, guid_of, import_row, import_row_with_type};
use sqlx::SqlitePool;

async fn seed_two_units(pool: &SqlitePool) {
    import_exercises(
        pool,
        vec![
            import_row("10", "Algebra I", "U1", "La", "MCQ", "q1", "A"),
            import_row("10", "Algebra I", "U1", "Lb", "MCQ", "q2", "A"),
            import_row("10", "Algebra I", "U2", "Lc", "MCQ", "q3", "A"),
        ],
        "seeder",
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_merge_same_ids_is_a_validation_error_with_no_writes() {
    let (_tmp, pool) = create_test_db().await;
    seed_two_units(&pool).await;
    let unit = guid_of(&pool, "units", "U1").await;

    let result = merge(&pool, MergeTable::Unit, &unit, &unit, "admin").await;

    assert!(matches!(result, Err(Error::InvalidInput(_))));
    assert_eq!(count_active(&pool, "units").await, 2);
}

#[tokio::test]
async fn test_merge_missing_source_names_the_missing_id() {
    let (_tmp, pool) = create_test_db().await;
    seed_two_units(&pool).await;
    let destination = guid_of(&pool, "units", "U2").await;

    let result = merge(&pool, MergeTable::Unit, "no-such-node", &destination, "admin").await;

    match result {
        Err(Error::NotFound(message)) => {
            assert!(message.contains("Unit"));
            assert!(message.contains("no-such-node"));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_merge_missing_destination_leaves_source_untouched() {
    let (_tmp, pool) = create_test_db().await;
    seed_two_units(&pool).await;
    let source = guid_of(&pool, "units", "U1").await;

    let result = merge(&pool, MergeTable::Unit, &source, "no-such-node", "admin").await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    // No lesson moved, nothing was soft-deleted
    let lessons_under_source: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lessons WHERE unit_id = ? AND deleted_at IS NULL",
    )
    .bind(&source)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(lessons_under_source, 2);
    assert_eq!(count_active(&pool, "units").await, 2);
}

#[tokio::test]
async fn test_merge_unit_repoints_lessons_and_soft_deletes_source() {
    let (_tmp, pool) = create_test_db().await;
    seed_two_units(&pool).await;
    let source = guid_of(&pool, "units", "U1").await;
    let destination = guid_of(&pool, "units", "U2").await;

    let report = merge(&pool, MergeTable::Unit, &source, &destination, "admin")
        .await
        .unwrap();

    assert_eq!(report.updated_counts.lessons, Some(2));
    assert!(report.updated_counts.exercises.is_none());
    assert!(report.deleted);

    // The tree no longer shows the source unit and the destination holds
    // every lesson
    let tree = list_tree(&pool, None).await.unwrap();
    let units = &tree[0].textbooks[0].units;
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, "U2");
    assert_eq!(units[0].lessons.len(), 3);
}

#[tokio::test]
async fn test_merge_is_single_shot_per_source() {
    let (_tmp, pool) = create_test_db().await;
    seed_two_units(&pool).await;
    let source = guid_of(&pool, "units", "U1").await;
    let destination = guid_of(&pool, "units", "U2").await;

    merge(&pool, MergeTable::Unit, &source, &destination, "admin")
        .await
        .unwrap();

    // The retired source is no longer an active node
    let again = merge(&pool, MergeTable::Unit, &source, &destination, "admin").await;
    assert!(matches!(again, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_merge_grade_repoints_textbooks() {
    let (_tmp, pool) = create_test_db().await;
    import_exercises(
        &pool,
        vec![
            import_row("9", "Pre-Algebra", "U1", "L1", "MCQ", "q1", "A"),
            import_row("10", "Algebra I", "U1", "L1", "MCQ", "q2", "A"),
        ],
        "seeder",
    )
    .await
    .unwrap();
    let source = guid_of(&pool, "grades", "9").await;
    let destination = guid_of(&pool, "grades", "10").await;

    let report = merge(&pool, MergeTable::Grade, &source, &destination, "admin")
        .await
        .unwrap();

    assert_eq!(report.updated_counts.textbooks, Some(1));
    let tree = list_tree(&pool, None).await.unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0].name, "10");
    assert_eq!(tree[0].textbooks.len(), 2);
}

#[tokio::test]
async fn test_merge_lesson_repoints_exercises_and_types() {
    let (_tmp, pool) = create_test_db().await;
    import_exercises(
        &pool,
        vec![
            import_row_with_type("10", "Algebra I", "U1", "La", "MCQ", "Drill", "q1", "A"),
            import_row("10", "Algebra I", "U1", "La", "MCQ", "q2", "B"),
            import_row("10", "Algebra I", "U1", "Lb", "MCQ", "q3", "A"),
        ],
        "seeder",
    )
    .await
    .unwrap();
    let source = guid_of(&pool, "lessons", "La").await;
    let destination = guid_of(&pool, "lessons", "Lb").await;

    let report = merge(&pool, MergeTable::Lesson, &source, &destination, "admin")
        .await
        .unwrap();

    assert_eq!(report.updated_counts.exercises, Some(2));
    assert_eq!(report.updated_counts.exercise_types, Some(1));

    let moved: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM exercises WHERE lesson_id = ? AND deleted_at IS NULL",
    )
    .bind(&destination)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(moved, 3);
}

#[tokio::test]
async fn test_merge_format_repoints_exercises() {
    let (_tmp, pool) = create_test_db().await;
    import_exercises(
        &pool,
        vec![
            import_row("10", "Algebra I", "U1", "L1", "MCQ", "q1", "A"),
            import_row("10", "Algebra I", "U1", "L1", "Essay", "q2", "B"),
        ],
        "seeder",
    )
    .await
    .unwrap();
    let source = guid_of(&pool, "formats", "MCQ").await;
    let destination = guid_of(&pool, "formats", "Essay").await;

    let report = merge(&pool, MergeTable::Format, &source, &destination, "admin")
        .await
        .unwrap();

    assert_eq!(report.updated_counts.exercises, Some(1));
    assert_eq!(count_active(&pool, "formats").await, 1);
}

#[tokio::test]
async fn test_merge_exercise_type_repoints_exercises() {
    let (_tmp, pool) = create_test_db().await;
    import_exercises(
        &pool,
        vec![
            import_row_with_type("10", "Algebra I", "U1", "L1", "MCQ", "Drill", "q1", "A"),
            import_row_with_type("10", "Algebra I", "U1", "L1", "MCQ", "Review", "q2", "B"),
        ],
        "seeder",
    )
    .await
    .unwrap();
    let source = guid_of(&pool, "exercise_types", "Drill").await;
    let destination = guid_of(&pool, "exercise_types", "Review").await;

    let report = merge(&pool, MergeTable::ExerciseType, &source, &destination, "admin")
        .await
        .unwrap();

    assert_eq!(report.updated_counts.exercises, Some(1));

    let typed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM exercises WHERE type_id = ? AND deleted_at IS NULL",
    )
    .bind(&destination)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(typed, 2);
}

#[tokio::test]
async fn test_merge_stamps_actor_on_rewritten_rows_and_source() {
    let (_tmp, pool) = create_test_db().await;
    seed_two_units(&pool).await;
    let source = guid_of(&pool, "units", "U1").await;
    let destination = guid_of(&pool, "units", "U2").await;

    merge(&pool, MergeTable::Unit, &source, &destination, "merger-1")
        .await
        .unwrap();

    let rewritten: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM lessons WHERE unit_id = ? AND updated_by = 'merger-1'",
    )
    .bind(&destination)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(rewritten, 2);

    let (updated_by, deleted): (String, Option<String>) =
        sqlx::query_as("SELECT updated_by, deleted_at FROM units WHERE guid = ?")
            .bind(&source)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(updated_by, "merger-1");
    assert!(deleted.is_some());
}

#[tokio::test]
async fn test_merge_ignores_soft_deleted_dependents() {
    let (_tmp, pool) = create_test_db().await;
    seed_two_units(&pool).await;
    let source = guid_of(&pool, "units", "U1").await;
    let destination = guid_of(&pool, "units", "U2").await;

    // Retire one lesson under the source by hand; the cascade must skip it
    sqlx::query("UPDATE lessons SET deleted_at = '2026-01-01T00:00:00Z' WHERE name = 'La'")
        .execute(&pool)
        .await
        .unwrap();

    let report = merge(&pool, MergeTable::Unit, &source, &destination, "admin")
        .await
        .unwrap();

    assert_eq!(report.updated_counts.lessons, Some(1));
    let stale_parent: String = sqlx::query_scalar("SELECT unit_id FROM lessons WHERE name = 'La'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(stale_parent, source);
}
