use std::time::SystemTime;

pub struct CachePolicy;

impl CachePolicy {
    /// Only complete 200 bodies that carry a validator are kept.
    pub fn is_storable(status: u16, last_modified: Option<&str>) -> bool {
        status == 200 && last_modified.is_some_and(|lm| !lm.trim().is_empty())
    }

    /// Compares two `Last-Modified` values as HTTP dates, falling back to a
    /// trimmed string comparison when either does not parse.
    pub fn same_last_modified(cached: &str, fresh: &str) -> bool {
        match (parse_date(cached), parse_date(fresh)) {
            (Some(a), Some(b)) => a == b,
            _ => cached.trim() == fresh.trim(),
        }
    }
}

fn parse_date(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::CachePolicy;

    #[test]
    fn stores_only_200_with_last_modified() {
        assert!(CachePolicy::is_storable(200, Some("Sat, 20 Oct 2024 19:26:00 GMT")));
        assert!(!CachePolicy::is_storable(200, None));
        assert!(!CachePolicy::is_storable(200, Some("  ")));
        assert!(!CachePolicy::is_storable(404, Some("Sat, 20 Oct 2024 19:26:00 GMT")));
    }

    #[test]
    fn equal_dates_in_different_formats_match() {
        // RFC 850 and IMF-fixdate spellings of the same instant.
        assert!(CachePolicy::same_last_modified(
            "Sunday, 20-Oct-24 19:26:00 GMT",
            "Sun, 20 Oct 2024 19:26:00 GMT",
        ));
    }

    #[test]
    fn different_dates_do_not_match() {
        assert!(!CachePolicy::same_last_modified(
            "Sun, 20 Oct 2024 19:26:00 GMT",
            "Tue, 22 Oct 2024 19:26:00 GMT",
        ));
    }

    #[test]
    fn unparseable_values_compare_as_strings() {
        assert!(CachePolicy::same_last_modified("v1", " v1 "));
        assert!(!CachePolicy::same_last_modified("v1", "v2"));
    }
}
