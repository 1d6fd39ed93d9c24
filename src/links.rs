use once_cell::sync::Lazy;
use regex::Regex;

static EVENT_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://(?:www\.)?(?:meetup\.com|luma\.com)/\S+").expect("valid event link regex")
});

/// Meetup and Luma links in free-form post text, first occurrence order,
/// without duplicates.
pub fn extract_event_links(text: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for found in EVENT_LINK_RE.find_iter(text) {
        let link = found.as_str().to_string();
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}
