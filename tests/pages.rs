//! Journal page date-range semantics: which journey photos a page
//! collects, and the derived end date/timezone fallbacks.

use time::{Duration, OffsetDateTime};

use journeylog::domain::journal_page::{JournalPage, PageType};

fn page(
    page_type: PageType,
    date_start: Option<OffsetDateTime>,
    date_end: Option<OffsetDateTime>,
) -> JournalPage {
    JournalPage {
        id: 1,
        slug: "day-one".to_string(),
        name: "Day one".to_string(),
        order_no: 0,
        text: String::new(),
        page_type,
        date_start,
        date_end,
        timezone_start: None,
        timezone_end: None,
        journey_id: 1,
        photos_count: 0,
    }
}

fn ts(unix: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(unix).unwrap()
}

#[test]
fn start_only_pages_cover_the_whole_day() {
    let start = ts(1_539_993_600); // midnight UTC
    let page = page(PageType::Regular, Some(start), None);

    assert_eq!(
        page.effective_date_end().unwrap(),
        start + Duration::days(1) - Duration::seconds(1)
    );

    assert!(page.covers_timestamp(start));
    assert!(page.covers_timestamp(start + Duration::hours(23)));
    assert!(!page.covers_timestamp(start + Duration::days(1)));
    assert!(!page.covers_timestamp(start - Duration::seconds(1)));
}

#[test]
fn explicit_date_ranges_are_inclusive() {
    let start = ts(1_539_993_600);
    let end = start + Duration::days(3);
    let page = page(PageType::Regular, Some(start), Some(end));

    assert_eq!(page.effective_date_end(), Some(end));
    assert!(page.covers_timestamp(end));
    assert!(!page.covers_timestamp(end + Duration::seconds(1)));
}

#[test]
fn end_only_pages_cover_everything_before_the_end() {
    let end = ts(1_539_993_600);
    let page = page(PageType::Special, None, Some(end));

    assert!(page.covers_timestamp(end - Duration::days(365)));
    assert!(!page.covers_timestamp(end + Duration::seconds(1)));
}

#[test]
fn dateless_pages_depend_on_their_type() {
    let stamp = ts(1_540_000_000);

    assert!(page(PageType::Regular, None, None).covers_timestamp(stamp));
    assert!(!page(PageType::Special, None, None).covers_timestamp(stamp));
}

#[test]
fn timezones_fall_back_to_utc_and_to_the_start() {
    let mut p = page(PageType::Regular, Some(ts(1_540_000_000)), None);
    assert_eq!(p.effective_timezone_start(), "UTC");
    // No end date: the end timezone follows the start.
    p.timezone_start = Some("Asia/Tokyo".to_string());
    assert_eq!(p.effective_timezone_end(), "Asia/Tokyo");

    // With an end date the end timezone stands on its own.
    p.date_end = Some(ts(1_540_100_000));
    assert_eq!(p.effective_timezone_end(), "UTC");
    p.timezone_end = Some("Europe/Helsinki".to_string());
    assert_eq!(p.effective_timezone_end(), "Europe/Helsinki");
}

#[test]
fn page_types_round_trip_through_db_strings() {
    assert_eq!(PageType::from_db("REGULAR"), Some(PageType::Regular));
    assert_eq!(PageType::from_db("SPECIAL"), Some(PageType::Special));
    assert_eq!(PageType::from_db("WEEKLY"), None);
    assert_eq!(PageType::Regular.as_db(), "REGULAR");
}
