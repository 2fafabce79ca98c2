//! robots.txt policy check

use crate::robots::ParsedRobots;
use crate::state::CrawlOptions;
use url::Url;

/// Checks a canonical URL against robots rules, honoring `respect_robots`
///
/// Missing rules (robots.txt not fetched or not applicable) allow everything.
pub fn is_allowed(
    url: &Url,
    robots: Option<&ParsedRobots>,
    options: &CrawlOptions,
    user_agent: &str,
) -> bool {
    if !options.respect_robots {
        return true;
    }

    robots.map_or(true, |rules| rules.is_allowed(url.as_str(), user_agent))
}
