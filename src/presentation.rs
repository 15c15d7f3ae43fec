//! View-model derivations for the gallery: which state block to draw, the
//! result summary line and the condensed page-number strip.

use crate::specimen::Specimen;

/// Placeholder card count while loading; independent of the page limit.
pub const SKELETON_CARD_COUNT: usize = 8;

pub const EMPTY_TITLE: &str = "No specimens found";
pub const EMPTY_HINT: &str = "Try adjusting your filters or search query.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultView<'a> {
    Loading { placeholders: usize },
    Failed { message: &'a str },
    Empty,
    Grid(&'a [Specimen]),
}

impl<'a> ResultView<'a> {
    pub fn from_state(loading: bool, error: Option<&'a str>, items: &'a [Specimen]) -> Self {
        if loading {
            ResultView::Loading {
                placeholders: SKELETON_CARD_COUNT,
            }
        } else if let Some(message) = error {
            ResultView::Failed { message }
        } else if items.is_empty() {
            ResultView::Empty
        } else {
            ResultView::Grid(items)
        }
    }
}

pub fn result_summary(total: u64) -> String {
    match total {
        0 => EMPTY_TITLE.to_string(),
        1 => "1 specimen found".to_string(),
        n => format!("{n} specimens found"),
    }
}

pub fn page_position(current: u32, total_pages: u32) -> Option<String> {
    (total_pages > 1).then(|| format!("Page {current} of {total_pages}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSlot {
    Page { number: u32, current: bool },
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageStrip {
    pub slots: Vec<PageSlot>,
    pub prev_enabled: bool,
    pub next_enabled: bool,
}

/// Shows the first page, the last page and the current page with one
/// neighbour on each side; each hidden run collapses to one ellipsis.
pub fn page_strip(total_pages: u32, current: u32) -> PageStrip {
    let mut visible: Vec<u32> = [
        1,
        current.saturating_sub(1),
        current,
        current.saturating_add(1),
        total_pages,
    ]
    .into_iter()
    .filter(|number| (1..=total_pages).contains(number))
    .collect();
    visible.sort_unstable();
    visible.dedup();

    let mut slots = Vec::with_capacity(visible.len() * 2);
    let mut previous = None;
    for number in visible {
        if previous.is_some_and(|previous: u32| number - previous > 1) {
            slots.push(PageSlot::Ellipsis);
        }
        slots.push(PageSlot::Page {
            number,
            current: number == current,
        });
        previous = Some(number);
    }

    PageStrip {
        slots,
        prev_enabled: current > 1,
        next_enabled: current < total_pages,
    }
}

pub fn show_page_strip(loading: bool, error: Option<&str>, total_pages: u32) -> bool {
    !loading && error.is_none() && total_pages > 1
}
