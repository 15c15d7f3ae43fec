use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;

use crate::catalog::{CatalogError, CatalogSource, SpecimenPage};
use crate::query::{Facet, FluorescenceFilter, QueryState, RequestDescriptor};
use crate::specimen::{CategoryIndex, Specimen};

pub const FETCH_FAILED_MESSAGE: &str = "Failed to load specimens. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Fetching,
    Error(String),
}

/// Server-derived pagination totals. Only meaningful once a fetch has
/// succeeded; callers must not present them while `Fetching`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTotals {
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub descriptor: RequestDescriptor,
}

pub struct QueryController {
    query: QueryState,
    phase: FetchPhase,
    items: Vec<Specimen>,
    totals: PageTotals,
    generation: u64,
    last_request: Option<RequestDescriptor>,
}

impl Default for QueryController {
    fn default() -> Self {
        Self::new(QueryState::default())
    }
}

impl QueryController {
    pub fn new(query: QueryState) -> Self {
        Self {
            query,
            phase: FetchPhase::Idle,
            items: Vec::new(),
            totals: PageTotals::default(),
            generation: 0,
            last_request: None,
        }
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn phase(&self) -> &FetchPhase {
        &self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == FetchPhase::Fetching
    }

    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            FetchPhase::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn items(&self) -> &[Specimen] {
        &self.items
    }

    pub fn totals(&self) -> PageTotals {
        self.totals
    }

    pub fn last_request(&self) -> Option<&RequestDescriptor> {
        self.last_request.as_ref()
    }

    pub fn set_facet(&mut self, facet: Facet, value: impl Into<String>) -> FetchTicket {
        let next = self.query.with_facet(facet, value);
        self.replace_query(next)
    }

    pub fn set_fluorescence(&mut self, filter: Option<FluorescenceFilter>) -> FetchTicket {
        let next = self.query.with_fluorescence(filter);
        self.replace_query(next)
    }

    pub fn set_search(&mut self, search: impl Into<String>) -> FetchTicket {
        let next = self.query.with_search(search);
        self.replace_query(next)
    }

    pub fn clear_filters(&mut self) -> FetchTicket {
        let next = self.query.cleared();
        self.replace_query(next)
    }

    /// Returns `None` when `page` already is the current page.
    pub fn go_to_page(&mut self, page: u32) -> Option<FetchTicket> {
        let upper = self.totals.total_pages.max(1);
        let page = page.clamp(1, upper);
        if page == self.query.page() {
            return None;
        }
        let next = self.query.with_page(page);
        Some(self.replace_query(next))
    }

    pub fn refresh(&mut self) -> FetchTicket {
        let descriptor = self.query.descriptor();
        self.issue(descriptor)
    }

    /// Re-issues exactly the last descriptor sent.
    pub fn retry(&mut self) -> Option<FetchTicket> {
        let descriptor = self.last_request.clone()?;
        Some(self.issue(descriptor))
    }

    /// Applies a fetch outcome. Outcomes from superseded generations are
    /// discarded and `false` is returned.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<SpecimenPage, CatalogError>,
    ) -> bool {
        if generation != self.generation {
            log::debug!(
                "Discarding stale specimen response (generation {generation}, current {})",
                self.generation
            );
            return false;
        }

        match result {
            Ok(page) => {
                log::info!(
                    "Loaded {} of {} specimens (page {} of {}, limit {})",
                    page.items.len(),
                    page.total,
                    self.query.page(),
                    page.total_pages,
                    self.query.limit()
                );
                self.items = page.items;
                self.totals = PageTotals {
                    total: page.total,
                    total_pages: page.total_pages,
                };
                self.phase = FetchPhase::Idle;
            }
            Err(err) => {
                if err.is_network() {
                    log::error!("Catalog unreachable while fetching specimens: {err}");
                } else {
                    log::error!("Error fetching specimens: {err}");
                }
                self.phase = FetchPhase::Error(FETCH_FAILED_MESSAGE.to_string());
            }
        }
        true
    }

    fn replace_query(&mut self, next: QueryState) -> FetchTicket {
        self.query = next;
        self.refresh()
    }

    fn issue(&mut self, descriptor: RequestDescriptor) -> FetchTicket {
        self.generation += 1;
        self.phase = FetchPhase::Fetching;
        self.last_request = Some(descriptor.clone());
        FetchTicket {
            generation: self.generation,
            descriptor,
        }
    }
}

type SpecimenOutcome = (u64, Result<SpecimenPage, CatalogError>);

/// Runs catalog requests on background threads and hands the outcomes back
/// to the UI thread.
pub struct FetchWorker {
    source: Arc<dyn CatalogSource>,
    specimen_tx: Sender<SpecimenOutcome>,
    specimen_rx: Receiver<SpecimenOutcome>,
    in_flight: usize,
    categories_rx: Option<Receiver<CategoryIndex>>,
}

impl FetchWorker {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        let (specimen_tx, specimen_rx) = mpsc::channel();
        Self {
            source,
            specimen_tx,
            specimen_rx,
            in_flight: 0,
            categories_rx: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.in_flight > 0 || self.categories_rx.is_some()
    }

    pub fn spawn_specimens(&mut self, ticket: FetchTicket) {
        let source = Arc::clone(&self.source);
        let tx = self.specimen_tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = source.fetch_specimens(&ticket.descriptor);
            let _ = tx.send((ticket.generation, result));
        });
    }

    /// Category failures are logged and degrade to an empty index.
    pub fn spawn_categories(&mut self) {
        let source = Arc::clone(&self.source);
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let index = source.fetch_categories().unwrap_or_else(|err| {
                log::warn!("Error fetching categories: {err}");
                CategoryIndex::default()
            });
            let _ = tx.send(index);
        });
        self.categories_rx = Some(rx);
    }

    pub fn poll_specimens(&mut self, controller: &mut QueryController) -> bool {
        let mut applied = false;
        loop {
            match self.specimen_rx.try_recv() {
                Ok((generation, result)) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    applied |= controller.complete(generation, result);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        applied
    }

    pub fn poll_categories(&mut self) -> Option<CategoryIndex> {
        let receiver = self.categories_rx.take()?;
        match receiver.try_recv() {
            Ok(index) => Some(index),
            Err(TryRecvError::Empty) => {
                self.categories_rx = Some(receiver);
                None
            }
            Err(TryRecvError::Disconnected) => {
                log::warn!("Category fetch worker disconnected.");
                Some(CategoryIndex::default())
            }
        }
    }

    #[cfg(test)]
    fn wait_for_specimen(&mut self, controller: &mut QueryController) -> bool {
        let (generation, result) = self
            .specimen_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("worker should answer");
        self.in_flight = self.in_flight.saturating_sub(1);
        controller.complete(generation, result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::specimen::sample_specimen;

    /// In-memory catalog that records every descriptor it serves.
    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub pages: Mutex<Vec<Result<SpecimenPage, String>>>,
        pub categories: Option<CategoryIndex>,
        pub requests: Mutex<Vec<RequestDescriptor>>,
    }

    impl CatalogSource for FakeCatalog {
        fn fetch_categories(&self) -> Result<CategoryIndex, CatalogError> {
            self.categories
                .clone()
                .ok_or_else(|| CatalogError::InvalidUrl("offline".to_string()))
        }

        fn fetch_specimens(
            &self,
            descriptor: &RequestDescriptor,
        ) -> Result<SpecimenPage, CatalogError> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(descriptor.clone());
            let mut pages = self.pages.lock().expect("pages lock");
            let next = if pages.is_empty() {
                Ok(page_of(0, 0, 0))
            } else {
                pages.remove(0)
            };
            next.map_err(CatalogError::InvalidUrl)
        }
    }

    pub(crate) fn page_of(count: usize, total: u64, total_pages: u32) -> SpecimenPage {
        SpecimenPage {
            items: (0..count)
                .map(|index| sample_specimen(&index.to_string(), 1))
                .collect(),
            total,
            total_pages,
        }
    }

    fn failure() -> CatalogError {
        CatalogError::InvalidUrl("unreachable".to_string())
    }

    #[test]
    fn mutations_enter_fetching_on_page_one() {
        let mut controller = QueryController::default();
        let first = controller.refresh();
        controller.complete(first.generation, Ok(page_of(20, 95, 5)));
        let paged = controller.go_to_page(4).expect("page change fetches");
        assert_eq!(paged.descriptor.page, 4);
        controller.complete(paged.generation, Ok(page_of(20, 95, 5)));

        let ticket = controller.set_facet(Facet::Mineral, "Calcite");
        assert_eq!(ticket.descriptor.page, 1);
        assert_eq!(controller.phase(), &FetchPhase::Fetching);

        let ticket = controller.set_search("crust");
        assert_eq!(ticket.descriptor.page, 1);
        assert_eq!(ticket.descriptor.mineral.as_deref(), Some("Calcite"));
    }

    #[test]
    fn success_updates_items_and_totals() {
        let mut controller = QueryController::default();
        let ticket = controller.refresh();
        assert!(controller.is_loading());
        assert!(controller.complete(ticket.generation, Ok(page_of(3, 3, 1))));
        assert_eq!(controller.phase(), &FetchPhase::Idle);
        assert_eq!(controller.items().len(), 3);
        assert_eq!(
            controller.totals(),
            PageTotals {
                total: 3,
                total_pages: 1
            }
        );
    }

    #[test]
    fn stale_responses_are_ignored() {
        let mut controller = QueryController::default();
        let older = controller.set_search("qu");
        let newer = controller.set_search("quartz");
        assert!(controller.complete(newer.generation, Ok(page_of(2, 2, 1))));
        assert!(!controller.complete(older.generation, Ok(page_of(9, 90, 5))));
        assert_eq!(controller.items().len(), 2);
        assert_eq!(controller.totals().total_pages, 1);
    }

    #[test]
    fn failure_keeps_items_and_exposes_message() {
        let mut controller = QueryController::default();
        let ticket = controller.refresh();
        controller.complete(ticket.generation, Ok(page_of(5, 5, 1)));

        let ticket = controller.set_facet(Facet::Color, "green");
        controller.complete(ticket.generation, Err(failure()));
        assert_eq!(controller.error(), Some(FETCH_FAILED_MESSAGE));
        assert_eq!(controller.items().len(), 5);
        assert!(!controller.is_loading());
    }

    #[test]
    fn retry_reissues_identical_descriptor() {
        let mut controller = QueryController::default();
        assert!(controller.retry().is_none());

        let failed = controller.set_facet(Facet::Location, "Tsumeb");
        controller.complete(failed.generation, Err(failure()));

        let retried = controller.retry().expect("retry should fetch");
        assert_eq!(retried.descriptor, failed.descriptor);
        assert!(retried.generation > failed.generation);
        assert_eq!(controller.phase(), &FetchPhase::Fetching);
    }

    #[test]
    fn page_navigation_clamps_and_skips_current_page() {
        let mut controller = QueryController::default();
        let ticket = controller.refresh();
        controller.complete(ticket.generation, Ok(page_of(20, 60, 3)));

        assert!(controller.go_to_page(1).is_none());
        let ticket = controller.go_to_page(99).expect("clamped page fetches");
        assert_eq!(ticket.descriptor.page, 3);
        assert!(controller.go_to_page(0).map(|t| t.descriptor.page) == Some(1));
    }

    #[test]
    fn clear_filters_resets_query() {
        let mut controller = QueryController::default();
        controller.set_facet(Facet::Mineral, "Calcite");
        controller.set_fluorescence(Some(FluorescenceFilter::Shortwave));
        controller.set_search("crust");
        let ticket = controller.clear_filters();
        assert!(!controller.query().has_active_filters());
        assert_eq!(ticket.descriptor, QueryState::default().descriptor());
    }

    #[test]
    fn worker_round_trips_through_source() {
        let fake = Arc::new(FakeCatalog {
            pages: Mutex::new(vec![Ok(page_of(2, 2, 1))]),
            ..FakeCatalog::default()
        });
        let mut worker = FetchWorker::new(fake.clone());
        let mut controller = QueryController::default();

        let ticket = controller.set_facet(Facet::Mineral, "Fluorite");
        worker.spawn_specimens(ticket.clone());
        assert!(worker.has_pending());
        assert!(worker.wait_for_specimen(&mut controller));
        assert!(!worker.has_pending());
        assert_eq!(controller.items().len(), 2);
        assert_eq!(
            fake.requests.lock().expect("requests lock").as_slice(),
            &[ticket.descriptor]
        );
    }

    #[test]
    fn category_failure_degrades_to_empty_index() {
        let mut worker = FetchWorker::new(Arc::new(FakeCatalog::default()));
        worker.spawn_categories();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        let index = loop {
            if let Some(index) = worker.poll_categories() {
                break index;
            }
            assert!(std::time::Instant::now() < deadline, "categories never arrived");
            thread::sleep(std::time::Duration::from_millis(5));
        };
        assert_eq!(index, CategoryIndex::default());
        assert!(!worker.has_pending());
    }
}
