//! Report reference extraction from issue markup.

use std::sync::LazyLock;

use indexmap::IndexSet;
use regex::Regex;
use url::Url;

use crate::model::Repository;

/// Hosts that serve bug-bounty reports.
const REPORT_HOSTS: &[&str] = &["hackerone.com", "www.hackerone.com"];

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s[^>]*?href\s*=\s*["']([^"']+)["']"#).expect("href pattern is valid")
});

/// Collects the distinct bug-bounty report links in an issue body.
///
/// Relative links are resolved against the repository they were rendered
/// in, then kept only if they point at a report on the bounty platform: a
/// `reports` path segment or a `report_id` query parameter. Results keep
/// first-seen order.
pub fn extract_report_urls(body_html: &str, repo: &Repository) -> Vec<String> {
    let Ok(base) = Url::parse(&format!("https://github.com/{}/{}/", repo.owner, repo.name)) else {
        return Vec::new();
    };

    let mut urls = IndexSet::new();
    for capture in HREF.captures_iter(body_html) {
        let href = unescape(&capture[1]);
        let Ok(url) = base.join(&href) else {
            continue;
        };
        if is_report_link(&url) {
            urls.insert(url.to_string());
        }
    }
    urls.into_iter().collect()
}

fn is_report_link(url: &Url) -> bool {
    let on_platform = url
        .host_str()
        .is_some_and(|host| REPORT_HOSTS.contains(&host));
    if !on_platform {
        return false;
    }

    let reports_path = url
        .path_segments()
        .is_some_and(|mut segments| segments.any(|s| s == "reports"));
    let report_query = url.query_pairs().any(|(key, _)| key == "report_id");
    reports_path || report_query
}

/// Undo the HTML entity escaping that rendered markup applies inside attributes.
fn unescape(href: &str) -> String {
    href.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
