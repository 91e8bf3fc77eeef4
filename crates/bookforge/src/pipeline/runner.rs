use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, info_span, warn, Instrument};

use crate::broadcast::{BookEvent, EventBroadcaster};
use crate::db::project_repo::ProjectStatus;
use crate::db::{chapter_repo, job_repo, project_repo, Database};
use crate::generation::{prompts, ChapterRole, Outline, OutlineChapter, TextGenerator};

use super::context::PipelineContext;
use super::error::PipelineError;

/// Rows stored before the outline chapters: title page, copyright,
/// about-this-book page and table of contents.
pub const FRONT_MATTER_CHAPTERS: u32 = 4;

/// Phases of one run, in execution order. Returned to callers so they
/// know what the job's progress is walking through.
pub const GENERATION_STEPS: [&str; 5] = [
    "outline",
    "front_matter",
    "introduction",
    "chapters",
    "conclusion",
];

const PROGRESS_OUTLINE: u8 = 10;
const PROGRESS_FRONT_MATTER: u8 = 15;
const PROGRESS_INTRODUCTION: u8 = 25;
const PROGRESS_CHAPTERS_DONE: u8 = 85;
const PROGRESS_CONCLUSION: u8 = 95;

pub struct Pipeline {
    db: Database,
    generator: Arc<dyn TextGenerator>,
    events: EventBroadcaster,
}

impl Pipeline {
    pub fn new(db: Database, generator: Arc<dyn TextGenerator>, events: EventBroadcaster) -> Self {
        Self {
            db,
            generator,
            events,
        }
    }

    /// Runs the full generation for one job.
    ///
    /// Never returns an error: failures are recorded on the job and
    /// project rows and broadcast as a failure event. Callers spawn
    /// this and move on.
    pub async fn run(self, mut ctx: PipelineContext) {
        let span = info_span!("generation", job_id = %ctx.job_id, project_id = ctx.project.id);
        async {
            if let Err(e) = self.execute(&mut ctx).await {
                self.handle_failure(&ctx, &e);
            }
        }
        .instrument(span)
        .await;
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        // Step 1: Mark the run started and clear output from earlier attempts
        self.step_start(ctx)?;

        // Step 2: Generate and validate the outline
        self.step_outline(ctx)
            .instrument(info_span!("outline"))
            .await?;

        // Step 3: Title page, copyright, about page, table of contents
        self.step_front_matter(ctx)
            .instrument(info_span!("front_matter"))
            .await?;

        // Step 4: Introduction from outline chapter 1
        self.step_introduction(ctx)
            .instrument(info_span!("introduction"))
            .await?;

        // Step 5: Main chapters from outline chapters 2..N-1
        self.step_main_chapters(ctx)
            .instrument(info_span!("chapters"))
            .await?;

        // Step 6: Conclusion from outline chapter N
        self.step_conclusion(ctx)
            .instrument(info_span!("conclusion"))
            .await?;

        // Step 7: Verify the chapter count and close the job
        self.step_finish(ctx)?;

        Ok(())
    }

    fn step_start(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let now = Utc::now().to_rfc3339();
        job_repo::mark_started(&self.db, &ctx.job_id, &now)?;
        let updated = project_repo::update_status(
            &self.db,
            ctx.project.id,
            ProjectStatus::GeneratingContent,
            &now,
        )?;
        if !updated {
            warn!("Project {} missing, skipping status update", ctx.project.id);
        }

        // A rerun replaces the previous output wholesale.
        let cleared = chapter_repo::delete_for_project(&self.db, ctx.project.id)?;
        if cleared > 0 {
            info!(
                "Cleared {cleared} chapters from an earlier run of project {}",
                ctx.project.id
            );
        }
        Ok(())
    }

    async fn step_outline(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let prompt = prompts::outline_prompt(
            &ctx.project.title,
            ctx.project.subtitle.as_deref(),
            ctx.project.description.as_deref(),
            ctx.requested_chapters,
        );
        let raw = self.generator.generate(&prompt).await?;

        let outline = Outline::parse(&raw)?;
        outline.validate(ctx.requested_chapters)?;

        job_repo::merge_result(&self.db, &ctx.job_id, &json!({ "outline": outline }))?;
        job_repo::update_progress(&self.db, &ctx.job_id, PROGRESS_OUTLINE)?;

        ctx.outline = Some(outline);
        Ok(())
    }

    async fn step_front_matter(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let project = &ctx.project;

        let mut title_page = project.title.clone();
        if let Some(subtitle) = &project.subtitle {
            title_page.push_str("\n\n");
            title_page.push_str(subtitle);
        }
        title_page.push_str("\n\nby ");
        title_page.push_str(&project.author);
        self.store_chapter(ctx, 1, "Title Page", &title_page)?;

        let copyright = self
            .generator
            .generate(&prompts::copyright_prompt(&project.title, &project.author))
            .await?;
        self.store_chapter(ctx, 2, "Copyright", &copyright)?;

        let about = self
            .generator
            .generate(&prompts::about_book_prompt(
                &project.title,
                project.description.as_deref(),
            ))
            .await?;
        self.store_chapter(ctx, 3, "About This Book", &about)?;

        let outline = ctx.outline.as_ref().expect("outline step completed");
        self.store_chapter(ctx, 4, "Table of Contents", &outline.table_of_contents())?;

        job_repo::update_progress(&self.db, &ctx.job_id, PROGRESS_FRONT_MATTER)?;
        Ok(())
    }

    async fn step_introduction(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let outline = ctx.outline.as_ref().expect("outline step completed");
        let chapter = outline.chapters.first().expect("validated outline");

        let content = self
            .generate_chapter(ctx, chapter, ChapterRole::Introduction)
            .await?;
        self.store_chapter(ctx, FRONT_MATTER_CHAPTERS + 1, &chapter.title, &content)?;

        job_repo::update_progress(&self.db, &ctx.job_id, PROGRESS_INTRODUCTION)?;
        Ok(())
    }

    async fn step_main_chapters(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let outline = ctx.outline.as_ref().expect("outline step completed");
        let total = ctx.requested_chapters;
        let mains = &outline.chapters[1..outline.chapters.len() - 1];

        for (i, chapter) in mains.iter().enumerate() {
            let content = self.generate_chapter(ctx, chapter, ChapterRole::Body).await?;
            let ordinal = FRONT_MATTER_CHAPTERS + 2 + i as u32;
            self.store_chapter(ctx, ordinal, &chapter.title, &content)?;

            let progress = chapter_progress(i as u32 + 1, mains.len() as u32);
            job_repo::update_progress(&self.db, &ctx.job_id, progress)?;

            info!(
                "Generated chapter {}/{total} of project {}",
                chapter.chapter_number, ctx.project.id
            );
            self.events.send(BookEvent::chapter_generated(
                &ctx.job_id,
                ctx.project.id,
                chapter.chapter_number,
                total,
            ));
        }
        Ok(())
    }

    async fn step_conclusion(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let outline = ctx.outline.as_ref().expect("outline step completed");
        let chapter = outline.chapters.last().expect("validated outline");

        let content = self
            .generate_chapter(ctx, chapter, ChapterRole::Conclusion)
            .await?;
        let ordinal = FRONT_MATTER_CHAPTERS + ctx.requested_chapters;
        self.store_chapter(ctx, ordinal, &chapter.title, &content)?;

        job_repo::update_progress(&self.db, &ctx.job_id, PROGRESS_CONCLUSION)?;
        Ok(())
    }

    fn step_finish(&self, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let expected = u64::from(FRONT_MATTER_CHAPTERS + ctx.requested_chapters);
        let stored = chapter_repo::count_for_project(&self.db, ctx.project.id)?;
        if stored != expected {
            warn!(
                "Project {} finished with {stored} chapters, expected {expected}",
                ctx.project.id
            );
        }

        let now = Utc::now().to_rfc3339();
        job_repo::merge_result(&self.db, &ctx.job_id, &json!({ "totalChapters": stored }))?;
        job_repo::mark_completed(&self.db, &ctx.job_id, &now)?;

        let updated =
            project_repo::update_status(&self.db, ctx.project.id, ProjectStatus::Completed, &now)?;
        if !updated {
            warn!("Project {} missing, skipping status update", ctx.project.id);
        }

        info!("Generation finished for project {}", ctx.project.id);
        self.events.send(BookEvent::generation_completed(
            &ctx.job_id,
            ctx.project.id,
            ctx.requested_chapters,
        ));
        Ok(())
    }

    /// Records the failure on the job and the project, then tells
    /// listeners. Book-keeping errors at this point are logged and
    /// swallowed so the first failure stays visible.
    fn handle_failure(&self, ctx: &PipelineContext, err: &PipelineError) {
        let message = err.to_string();
        error!("Generation failed for project {}: {message}", ctx.project.id);

        let now = Utc::now().to_rfc3339();
        if let Err(db_err) = job_repo::mark_failed(&self.db, &ctx.job_id, &message, &now) {
            error!("Could not record failure on job {}: {db_err}", ctx.job_id);
        }
        match project_repo::update_status(&self.db, ctx.project.id, ProjectStatus::Failed, &now) {
            Ok(true) => {}
            Ok(false) => warn!("Project {} missing, skipping status update", ctx.project.id),
            Err(db_err) => error!(
                "Could not mark project {} failed: {db_err}",
                ctx.project.id
            ),
        }

        self.events.send(BookEvent::generation_failed(
            &ctx.job_id,
            ctx.project.id,
            &message,
        ));
    }

    async fn generate_chapter(
        &self,
        ctx: &PipelineContext,
        chapter: &OutlineChapter,
        role: ChapterRole,
    ) -> Result<String, PipelineError> {
        let prompt = prompts::chapter_prompt(&ctx.project.title, chapter, role);
        Ok(self.generator.generate(&prompt).await?)
    }

    fn store_chapter(
        &self,
        ctx: &PipelineContext,
        ordinal: u32,
        title: &str,
        content: &str,
    ) -> Result<(), PipelineError> {
        let now = Utc::now().to_rfc3339();
        chapter_repo::insert(&self.db, ctx.project.id, ordinal, title, content, &now)?;
        Ok(())
    }
}

/// Maps main-chapter completion onto the 25..85 stretch of the bar.
fn chapter_progress(done: u32, total: u32) -> u8 {
    if total == 0 {
        return PROGRESS_CHAPTERS_DONE;
    }
    let span = u32::from(PROGRESS_CHAPTERS_DONE - PROGRESS_INTRODUCTION);
    (u32::from(PROGRESS_INTRODUCTION) + span * done / total) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_progress_is_linear() {
        assert_eq!(chapter_progress(1, 8), 32);
        assert_eq!(chapter_progress(4, 8), 55);
        assert_eq!(chapter_progress(8, 8), 85);
    }

    #[test]
    fn test_chapter_progress_never_exceeds_band() {
        for total in 1..=28 {
            let mut last = 0;
            for done in 1..=total {
                let p = chapter_progress(done, total);
                assert!(p > PROGRESS_INTRODUCTION);
                assert!(p <= PROGRESS_CHAPTERS_DONE);
                assert!(p >= last);
                last = p;
            }
            assert_eq!(chapter_progress(total, total), PROGRESS_CHAPTERS_DONE);
        }
    }

    #[test]
    fn test_chapter_progress_with_no_main_chapters() {
        assert_eq!(chapter_progress(0, 0), PROGRESS_CHAPTERS_DONE);
    }
}
