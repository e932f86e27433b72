//! Pagination over a stream set: 1-indexed pages with a fixed header.

use pl_strava::types::StreamSet;

/// One resolved page of samples.
#[derive(Debug, Clone)]
pub struct Page {
    pub slice: StreamSet,
    pub number: usize,
    pub total_pages: usize,
    /// Absolute sample range `[start, end)` this page covers.
    pub start: usize,
    pub end: usize,
}

/// Outcome of a page request.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    Page(Page),
    /// The requested page is past the end.
    OutOfRange { requested: usize, total_pages: usize },
}

/// Slice page `number` (1-indexed) of `size` samples from the set.
pub fn paginate(set: &StreamSet, number: usize, size: usize) -> PageOutcome {
    let sample_count = set.sample_count();
    let size = size.max(1);
    let total_pages = sample_count.div_ceil(size).max(1);

    if number == 0 || number > total_pages {
        return PageOutcome::OutOfRange {
            requested: number,
            total_pages,
        };
    }

    let start = (number - 1) * size;
    let end = (start + size).min(sample_count);
    PageOutcome::Page(Page {
        slice: set.slice(start, end),
        number,
        total_pages,
        start,
        end,
    })
}

/// The page header: position, covered time range, and the directive that
/// keeps the model from immediately asking for everything at once.
pub fn page_header(page: &Page, full_set: &StreamSet) -> String {
    let mut header = format!(
        "**Page {} of {}** (samples {}–{} of {})",
        page.number,
        page.total_pages,
        page.start,
        page.end.saturating_sub(1),
        full_set.sample_count(),
    );

    if let Some(time) = full_set.numeric("time") {
        let from = time.get(page.start).copied().filter(|t| t.is_finite());
        let to = time
            .get(page.end.saturating_sub(1))
            .copied()
            .filter(|t| t.is_finite());
        if let (Some(from), Some(to)) = (from, to) {
            header.push_str(&format!(
                " covering {} – {}",
                format_clock(from),
                format_clock(to)
            ));
        }
    }

    header.push_str(
        ".\n\nReach conclusions about this page before requesting the next.\n",
    );
    header
}

/// The out-of-range message.
pub fn out_of_range_message(requested: usize, total_pages: usize) -> String {
    format!("No such page ({requested}); total pages = {total_pages}.")
}

/// Seconds → `h:mm:ss` or `m:ss`.
pub fn format_clock(seconds: f64) -> String {
    let secs = seconds.max(0.0).round() as i64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pl_strava::types::StreamChannel;
    use std::collections::BTreeMap;

    fn set(samples: usize) -> StreamSet {
        let mut channels = BTreeMap::new();
        channels.insert(
            "time".to_string(),
            StreamChannel::Numeric((0..samples).map(|i| i as f64).collect()),
        );
        StreamSet { channels }
    }

    #[test]
    fn pages_tile_the_dataset() {
        let full = set(2_500);
        match paginate(&full, 1, 1_000) {
            PageOutcome::Page(p) => {
                assert_eq!((p.start, p.end), (0, 1_000));
                assert_eq!(p.total_pages, 3);
            }
            _ => panic!("expected page"),
        }
        match paginate(&full, 3, 1_000) {
            PageOutcome::Page(p) => {
                assert_eq!((p.start, p.end), (2_000, 2_500));
                assert_eq!(p.slice.sample_count(), 500);
            }
            _ => panic!("expected page"),
        }
    }

    #[test]
    fn page_past_end_is_out_of_range() {
        let full = set(100);
        match paginate(&full, 5, 50) {
            PageOutcome::OutOfRange {
                requested,
                total_pages,
            } => {
                assert_eq!(requested, 5);
                assert_eq!(total_pages, 2);
                assert_eq!(
                    out_of_range_message(requested, total_pages),
                    "No such page (5); total pages = 2."
                );
            }
            _ => panic!("expected out of range"),
        }
    }

    #[test]
    fn page_zero_is_out_of_range() {
        assert!(matches!(
            paginate(&set(10), 0, 5),
            PageOutcome::OutOfRange { .. }
        ));
    }

    #[test]
    fn header_names_page_time_range_and_directive() {
        let full = set(2_500);
        let page = match paginate(&full, 2, 1_000) {
            PageOutcome::Page(p) => p,
            _ => panic!(),
        };
        let header = page_header(&page, &full);
        assert!(header.contains("Page 2 of 3"));
        assert!(header.contains("16:40"), "header: {header}");
        assert!(header.contains("33:19"));
        assert!(header.contains("Reach conclusions about this page"));
    }

    #[test]
    fn format_clock_rolls_hours() {
        assert_eq!(format_clock(0.0), "0:00");
        assert_eq!(format_clock(95.0), "1:35");
        assert_eq!(format_clock(3_750.0), "1:02:30");
    }

    #[test]
    fn empty_set_has_one_empty_page() {
        let full = StreamSet::default();
        match paginate(&full, 1, 100) {
            PageOutcome::Page(p) => {
                assert_eq!(p.total_pages, 1);
                assert_eq!(p.slice.sample_count(), 0);
            }
            _ => panic!("expected page 1 of 1"),
        }
    }
}
