use tokio::time::sleep;
use tracing::debug;

use crate::config::DelayRange;
use crate::utils::rng::Randomizer;

/// Sleeps for a random duration drawn from the range. All human-like pauses
/// between transactions and wallets go through here.
pub async fn sleep_range(range: DelayRange, rng: &Randomizer) {
    let duration = range.sample(rng);
    debug!("Sleeping for {}s...", duration.as_secs());
    sleep(duration).await;
}
