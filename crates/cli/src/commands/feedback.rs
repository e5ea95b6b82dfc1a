use dealerbot_db::{FeedbackRepository, SqlFeedbackRepository};

use crate::commands::{build_runtime, finish, load_config, open_database, CommandResult};

pub fn run(days: u32) -> CommandResult {
    let config = match load_config("feedback-stats") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("feedback-stats") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_database(&config).await?;
        let stats = SqlFeedbackRepository::new(pool.clone()).stats(days).await;
        pool.close().await;
        let stats = stats.map_err(|error| ("repository", error.to_string(), 4u8))?;
        Ok(format!(
            "last {days} days: total={} positive={} negative={} positive_ratio={:.2}",
            stats.total_feedback, stats.positive_count, stats.negative_count, stats.positive_ratio
        ))
    });

    finish("feedback-stats", result)
}
