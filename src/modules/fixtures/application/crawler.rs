//! Whole-season fixture crawl.
//!
//! The season is cut into month blocks, each block is swept day by day, and
//! the matches found are grouped by competition. A failing block is recorded
//! and the crawl moves on to the next one.

use super::match_day::MatchDayService;
use crate::modules::fixtures::domain::season::{DateBlock, Season};
use crate::modules::fixtures::domain::summary::{BlockError, CrawlProgress, RangeMatches, SeasonFixture};
use crate::modules::jobs::application::context::SyncContext;
use crate::modules::jobs::application::orchestrator::item_error;
use crate::modules::jobs::application::pipelines::drive;
use crate::modules::jobs::domain::entities::{ItemOutcome, JobKey, JobKind};
use crate::modules::jobs::infrastructure::JobHandle;
use crate::shared::errors::AppResult;
use crate::shared::utils::TimedOperation;
use crate::{log_info, log_warn};
use serde::{Deserialize, Serialize};

pub const STAGE_BLOCKS: &str = "blocks";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonFixtureParams {
    pub season: String,
    #[serde(default)]
    pub save: bool,
}

#[derive(Clone)]
pub struct SeasonCrawler {
    ctx: SyncContext,
    days: MatchDayService,
}

impl SeasonCrawler {
    pub fn new(ctx: SyncContext) -> Self {
        Self {
            days: MatchDayService::new(ctx.clone()),
            ctx,
        }
    }

    pub fn days(&self) -> &MatchDayService {
        &self.days
    }

    pub fn job_key(season: &Season) -> JobKey {
        JobKey::scoped(JobKind::SeasonFixture, season)
    }

    /// Validate the season and claim its registry slot.
    pub fn start(&self, params: &SeasonFixtureParams) -> AppResult<(JobHandle, Season)> {
        let season = Season::parse(&params.season)?;
        let handle = self.ctx.registry.try_start(Self::job_key(&season), &[STAGE_BLOCKS])?;
        Ok((handle, season))
    }

    /// Crawl a claimed season to the end, completing or failing its job.
    pub async fn run(&self, handle: JobHandle, season: Season, save: bool) -> AppResult<SeasonFixture> {
        drive(&handle, self.crawl(&handle, season, save)).await
    }

    /// `start` then `run` in the caller's task.
    pub async fn crawl_season(&self, params: SeasonFixtureParams) -> AppResult<SeasonFixture> {
        let (handle, season) = self.start(&params)?;
        self.run(handle, season, params.save).await
    }

    async fn crawl(&self, handle: &JobHandle, season: Season, save: bool) -> AppResult<SeasonFixture> {
        let timer = TimedOperation::new(&format!("season fixture {}", season));
        let blocks = season.blocks()?;
        let mut fixture = SeasonFixture::new(season.to_string(), season.start()?, season.end()?, blocks.len());

        handle.begin_stage(STAGE_BLOCKS, Some(blocks.len()));
        handle.set_detail(&CrawlProgress::from(&fixture));
        log_info!("Season {}: {} blocks to crawl (save: {})", season, blocks.len(), save);

        let pacing = self.ctx.orchestrator.pacing();
        for (position, block) in blocks.iter().enumerate() {
            handle.set_current_item(&block.to_string());
            log_info!("Block {}/{}: {}", block.index, blocks.len(), block);

            match self.crawl_block(block, save).await {
                Ok(range) => {
                    let failures: Vec<String> = range
                        .errors
                        .iter()
                        .map(|e| format!("{}: {}", e.date, e.error))
                        .collect();
                    let found = range.total_matches;
                    fixture.absorb(range);

                    if failures.is_empty() {
                        handle.record(STAGE_BLOCKS, ItemOutcome::Updated, None);
                        log_info!("Block {} done: {} matches", block.index, found);
                    } else {
                        self.block_failed(handle, &mut fixture, position, block, failures.join("; "));
                    }
                }
                Err(e) => self.block_failed(handle, &mut fixture, position, block, e.to_string()),
            }

            fixture.processed_blocks = block.index;
            fixture.summarize();
            handle.set_detail(&CrawlProgress::from(&fixture));

            if position + 1 < blocks.len() {
                self.ctx.orchestrator.pacer().pause(pacing.block).await;
            }
        }

        handle.finish_stage(STAGE_BLOCKS);
        timer.finish_with_info(&format!(
            "{} matches in {} competitions, {} block errors",
            fixture.total_matches,
            fixture.leagues.len(),
            fixture.errors.len()
        ));
        Ok(fixture)
    }

    async fn crawl_block(&self, block: &DateBlock, save: bool) -> AppResult<RangeMatches> {
        self.days.matches_for_range(block.start, block.end, save).await
    }

    fn block_failed(
        &self,
        handle: &JobHandle,
        fixture: &mut SeasonFixture,
        position: usize,
        block: &DateBlock,
        error: String,
    ) {
        log_warn!("Block {} ({}) had errors: {}", block.index, block, error);
        handle.record(
            STAGE_BLOCKS,
            ItemOutcome::Failed,
            Some(item_error(STAGE_BLOCKS, position, &block.to_string(), &error)),
        );
        fixture.errors.push(BlockError {
            block: block.index,
            dates: *block,
            error,
        });
    }
}
