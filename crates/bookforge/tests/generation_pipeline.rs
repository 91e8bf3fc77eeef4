//! End-to-end tests for the book generation pipeline.
//!
//! The generator is scripted, everything else is real: job rows,
//! chapter rows, project status and events all go through the same
//! code paths production uses.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use bookforge::db::{chapter_repo, job_repo, project_repo};
use bookforge::{BookEvent, GenerationError, PipelineContext};

use common::{
    book_script, collect_events, generation_request, outline_response, ProjectBuilder,
    ScriptedGenerator, TestHarness,
};

/// Runs one pipeline to completion against a scripted generator and
/// returns the job id.
async fn run_pipeline(
    harness: &TestHarness,
    project_id: i64,
    generator: Arc<ScriptedGenerator>,
) -> String {
    let project = project_repo::find_by_id(&harness.db, project_id)
        .expect("Failed to load project")
        .expect("project exists");
    let job = harness.start_job(project_id);
    let ctx = PipelineContext::new(job.id.clone(), project);

    harness.pipeline(generator).run(ctx).await;
    job.id
}

#[tokio::test]
async fn test_full_generation_produces_complete_book() {
    let harness = TestHarness::new();
    let project_id = harness.insert_project(
        ProjectBuilder::new()
            .subtitle("Growing Software")
            .description("A book about growing software")
            .chapters(10)
            .build(),
    );
    let mut rx = harness.subscribe();
    let generator = Arc::new(ScriptedGenerator::new(book_script(10)));

    let job_id = run_pipeline(&harness, project_id, generator.clone()).await;

    // Outline + copyright + about + introduction + 8 mains + conclusion.
    assert_eq!(generator.calls(), 13);

    // 4 front matter rows plus the 10 outline chapters.
    let chapters = chapter_repo::list_for_project(&harness.db, project_id).unwrap();
    assert_eq!(chapters.len(), 14);
    for (i, chapter) in chapters.iter().enumerate() {
        assert_eq!(chapter.ordinal, i as u32 + 1, "ordinals must be gapless");
    }

    assert_eq!(chapters[0].title, "Title Page");
    assert!(chapters[0].content.contains("The Rust Gardener"));
    assert!(chapters[0].content.contains("Growing Software"));
    assert!(chapters[0].content.contains("by Ada Lovelace"));
    assert_eq!(chapters[1].title, "Copyright");
    assert_eq!(chapters[2].title, "About This Book");
    assert_eq!(chapters[3].title, "Table of Contents");
    assert!(chapters[3].content.contains("Chapter 5: Chapter 5"));

    assert_eq!(chapters[4].title, "Introduction");
    assert_eq!(chapters[4].content, "Introduction content");
    assert_eq!(chapters[5].title, "Chapter 2");
    assert_eq!(chapters[5].content, "Content of chapter 2");
    assert_eq!(chapters[12].title, "Chapter 9");
    assert_eq!(chapters[13].title, "Conclusion");
    assert_eq!(chapters[13].content, "Conclusion content");

    // Job closed with the outline and final count in its result.
    let job = job_repo::find_by_id(&harness.db, &job_id).unwrap().unwrap();
    assert_eq!(job.status, "completed");
    assert_eq!(job.progress, 100);
    assert!(job.completed_at.is_some());
    let result: serde_json::Value = serde_json::from_str(job.result.as_deref().unwrap()).unwrap();
    assert_eq!(result["totalChapters"], 14);
    assert_eq!(result["outline"]["chapters"].as_array().unwrap().len(), 10);

    let project = project_repo::find_by_id(&harness.db, project_id)
        .unwrap()
        .unwrap();
    assert_eq!(project.status, "completed");

    // One event per main chapter, then the completion event.
    let events = collect_events(&mut rx);
    assert_eq!(events.len(), 9);
    for (i, event) in events[..8].iter().enumerate() {
        match event {
            BookEvent::ChapterGenerated {
                chapter_number,
                total_chapters,
                ..
            } => {
                assert_eq!(*chapter_number, i as u32 + 2);
                assert_eq!(*total_chapters, 10);
            }
            other => panic!("expected ChapterGenerated, got {other:?}"),
        }
    }
    match &events[8] {
        BookEvent::GenerationCompleted { total_chapters, .. } => assert_eq!(*total_chapters, 10),
        other => panic!("expected GenerationCompleted, got {other:?}"),
    }

    // The status query sees the same finished job.
    let status = harness.status_service().generation_status(&job_id).unwrap();
    assert_eq!(status.status, "completed");
    assert_eq!(status.progress, 100);
    assert_eq!(status.result.unwrap()["totalChapters"], 14);
}

#[tokio::test]
async fn test_outline_chapter_mismatch_fails_without_storing_chapters() {
    let harness = TestHarness::new();
    let project_id = harness.insert_project(ProjectBuilder::new().chapters(10).build());
    let mut rx = harness.subscribe();
    let generator = Arc::new(ScriptedGenerator::new(vec![Ok(outline_response(8))]));

    let job_id = run_pipeline(&harness, project_id, generator.clone()).await;

    // Nothing past the outline step may run.
    assert_eq!(generator.calls(), 1);
    assert_eq!(
        chapter_repo::count_for_project(&harness.db, project_id).unwrap(),
        0
    );

    let job = job_repo::find_by_id(&harness.db, &job_id).unwrap().unwrap();
    assert_eq!(job.status, "failed");
    assert!(
        job.error
            .as_deref()
            .unwrap()
            .contains("outline has 8 chapters, expected 10"),
        "unexpected error: {:?}",
        job.error
    );

    let project = project_repo::find_by_id(&harness.db, project_id)
        .unwrap()
        .unwrap();
    assert_eq!(project.status, "failed");

    let events = collect_events(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        BookEvent::GenerationFailed { error, .. } => {
            assert!(error.contains("outline has 8 chapters, expected 10"));
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rerun_replaces_previous_chapters() {
    let harness = TestHarness::new();
    let project_id = harness.insert_project(ProjectBuilder::new().chapters(5).build());

    let first_generator = Arc::new(ScriptedGenerator::new(book_script(5)));
    let first_job = run_pipeline(&harness, project_id, first_generator).await;
    assert_eq!(
        chapter_repo::count_for_project(&harness.db, project_id).unwrap(),
        9
    );

    let second_generator = Arc::new(ScriptedGenerator::new(book_script(5)));
    let second_job = run_pipeline(&harness, project_id, second_generator).await;

    // The rerun replaced the book instead of appending to it.
    assert_eq!(
        chapter_repo::count_for_project(&harness.db, project_id).unwrap(),
        9
    );

    let first = job_repo::find_by_id(&harness.db, &first_job).unwrap().unwrap();
    let second = job_repo::find_by_id(&harness.db, &second_job).unwrap().unwrap();
    assert_eq!(first.status, "completed");
    assert_eq!(second.status, "completed");
}

#[tokio::test]
async fn test_failure_midway_keeps_partial_progress_on_the_job() {
    let harness = TestHarness::new();
    let project_id = harness.insert_project(ProjectBuilder::new().chapters(5).build());
    let mut rx = harness.subscribe();

    // Outline succeeds, the copyright page request blows up.
    let generator = Arc::new(ScriptedGenerator::new(vec![
        Ok(outline_response(5)),
        Err(GenerationError::Http {
            provider: "gemini:gemini-2.0-flash".to_string(),
            message: "HTTP 500".to_string(),
        }),
    ]));

    let job_id = run_pipeline(&harness, project_id, generator).await;

    let job = job_repo::find_by_id(&harness.db, &job_id).unwrap().unwrap();
    assert_eq!(job.status, "failed");
    assert_eq!(job.progress, 10, "progress stays where the failure hit");
    assert!(job.error.as_deref().unwrap().contains("HTTP 500"));
    // The outline survives in the result for diagnosis.
    let result: serde_json::Value = serde_json::from_str(job.result.as_deref().unwrap()).unwrap();
    assert_eq!(result["outline"]["chapters"].as_array().unwrap().len(), 5);

    // The title page was already stored; the rerun will clear it.
    assert_eq!(
        chapter_repo::count_for_project(&harness.db, project_id).unwrap(),
        1
    );

    let project = project_repo::find_by_id(&harness.db, project_id)
        .unwrap()
        .unwrap();
    assert_eq!(project.status, "failed");

    let events = collect_events(&mut rx);
    assert!(matches!(&events[..], [BookEvent::GenerationFailed { .. }]));
}

#[tokio::test]
async fn test_start_generation_returns_before_the_book_is_done() {
    let harness = TestHarness::new();
    let project_id = harness.insert_project(ProjectBuilder::new().chapters(5).build());

    // Hold the generator so the spawned pipeline cannot finish early.
    let gate = Arc::new(Semaphore::new(0));
    let generator = Arc::new(ScriptedGenerator::gated(book_script(5), gate.clone()));
    let service = harness.generation_service(generator);

    let started = service
        .start_generation(project_id, &generation_request())
        .unwrap();
    assert_eq!(started.project_id, project_id);
    assert_eq!(started.steps.first(), Some(&"outline"));
    assert_eq!(started.steps.last(), Some(&"conclusion"));

    // The call returned while the pipeline is still parked on the gate.
    let job = job_repo::find_by_id(&harness.db, &started.job_id)
        .unwrap()
        .unwrap();
    assert_eq!(job.status, "pending");

    gate.add_permits(64);
    for _ in 0..400 {
        let job = job_repo::find_by_id(&harness.db, &started.job_id)
            .unwrap()
            .unwrap();
        if job.status == "completed" || job.status == "failed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let job = job_repo::find_by_id(&harness.db, &started.job_id)
        .unwrap()
        .unwrap();
    assert_eq!(job.status, "completed");
    assert_eq!(job.progress, 100);
    assert_eq!(
        chapter_repo::count_for_project(&harness.db, project_id).unwrap(),
        9
    );
}
