//! Weekly topic rotation
//!
//! Exactly one topic is active per ISO week. The mapping is a pure function of
//! the topic list and the calendar date, so it survives restarts unchanged.

use time::Date;

/// Index of the active topic for an ISO week number (1-based)
pub fn topic_index(iso_week: u8, topic_count: usize) -> Option<usize> {
    if topic_count == 0 {
        return None;
    }
    let week = usize::from(iso_week.max(1));
    Some((week - 1) % topic_count)
}

/// Topic active on the given date
pub fn topic_for_date(topics: &[String], date: Date) -> Option<&str> {
    topic_index(date.iso_week(), topics.len()).map(|index| topics[index].as_str())
}
