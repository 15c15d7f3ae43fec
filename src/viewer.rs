use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::specimen::Specimen;

/// Tracks outstanding scroll suspensions. The gallery scrolls only when no
/// guard is alive.
#[derive(Debug, Clone, Default)]
pub struct ScrollGate {
    holders: Arc<AtomicUsize>,
}

impl ScrollGate {
    pub fn is_suspended(&self) -> bool {
        self.holders.load(Ordering::Acquire) > 0
    }

    pub fn suspend(&self) -> ScrollGuard {
        self.holders.fetch_add(1, Ordering::AcqRel);
        ScrollGuard {
            holders: Arc::clone(&self.holders),
        }
    }
}

/// Releases its suspension on drop, including during unwinding.
#[derive(Debug)]
pub struct ScrollGuard {
    holders: Arc<AtomicUsize>,
}

impl Drop for ScrollGuard {
    fn drop(&mut self) {
        self.holders.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    CloseButton,
    Backdrop,
    Escape,
}

/// Owns the selected specimen for as long as the detail modal is open.
#[derive(Debug)]
pub struct DetailViewer {
    specimen: Specimen,
    cursor: usize,
    _scroll: ScrollGuard,
}

impl DetailViewer {
    pub fn open(specimen: Specimen, gate: &ScrollGate) -> Self {
        Self {
            specimen,
            cursor: 0,
            _scroll: gate.suspend(),
        }
    }

    pub fn specimen(&self) -> &Specimen {
        &self.specimen
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn image_count(&self) -> usize {
        self.specimen.images.len()
    }

    pub fn has_carousel(&self) -> bool {
        self.image_count() > 1
    }

    pub fn current_image(&self) -> Option<&str> {
        self.specimen.images.get(self.cursor).map(String::as_str)
    }

    pub fn next(&mut self) {
        let count = self.image_count();
        if count > 1 {
            self.cursor = (self.cursor + 1) % count;
        }
    }

    pub fn previous(&mut self) {
        let count = self.image_count();
        if count > 1 {
            self.cursor = (self.cursor + count - 1) % count;
        }
    }

    pub fn select_thumbnail(&mut self, index: usize) {
        if index < self.image_count() {
            self.cursor = index;
        }
    }

    pub fn counter_label(&self) -> Option<String> {
        self.has_carousel()
            .then(|| format!("{} / {}", self.cursor + 1, self.image_count()))
    }
}
