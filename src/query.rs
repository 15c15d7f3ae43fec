pub const DEFAULT_PAGE_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    Mineral,
    Location,
    Color,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::Mineral, Facet::Location, Facet::Color];

    pub fn param_name(self) -> &'static str {
        match self {
            Facet::Mineral => "mineral",
            Facet::Location => "location",
            Facet::Color => "color",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Facet::Mineral => "Mineral",
            Facet::Location => "Location",
            Facet::Color => "Color",
        }
    }

    pub fn any_label(self) -> &'static str {
        match self {
            Facet::Mineral => "All Minerals",
            Facet::Location => "All Locations",
            Facet::Color => "All Colors",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FluorescenceFilter {
    AllFluorescent,
    Shortwave,
    Midwave,
    Longwave,
    NonFluorescent,
}

impl FluorescenceFilter {
    pub const ALL: [FluorescenceFilter; 5] = [
        FluorescenceFilter::AllFluorescent,
        FluorescenceFilter::Shortwave,
        FluorescenceFilter::Midwave,
        FluorescenceFilter::Longwave,
        FluorescenceFilter::NonFluorescent,
    ];

    pub const ANY_LABEL: &'static str = "All Specimens";

    pub fn wire_value(self) -> &'static str {
        match self {
            FluorescenceFilter::AllFluorescent => "all_fluorescent",
            FluorescenceFilter::Shortwave => "shortwave",
            FluorescenceFilter::Midwave => "midwave",
            FluorescenceFilter::Longwave => "longwave",
            FluorescenceFilter::NonFluorescent => "non_fluorescent",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FluorescenceFilter::AllFluorescent => "Only Fluorescent",
            FluorescenceFilter::Shortwave => "Shortwave (SW)",
            FluorescenceFilter::Midwave => "Midwave (MW)",
            FluorescenceFilter::Longwave => "Longwave (LW)",
            FluorescenceFilter::NonFluorescent => "Non-Fluorescent",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|filter| filter.wire_value().eq_ignore_ascii_case(value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterState {
    pub mineral: String,
    pub location: String,
    pub color: String,
    pub fluorescence: Option<FluorescenceFilter>,
}

impl FilterState {
    pub fn facet(&self, facet: Facet) -> &str {
        match facet {
            Facet::Mineral => &self.mineral,
            Facet::Location => &self.location,
            Facet::Color => &self.color,
        }
    }

    fn facet_mut(&mut self, facet: Facet) -> &mut String {
        match facet {
            Facet::Mineral => &mut self.mineral,
            Facet::Location => &mut self.location,
            Facet::Color => &mut self.color,
        }
    }

    pub fn is_empty(&self) -> bool {
        Facet::ALL
            .into_iter()
            .all(|facet| self.facet(facet).is_empty())
            && self.fluorescence.is_none()
    }
}

/// Session query state. Every mutation returns a new record; filter and
/// search changes always land back on page 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    filters: FilterState,
    search: String,
    page: u32,
    limit: u32,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LIMIT)
    }
}

impl QueryState {
    pub fn new(limit: u32) -> Self {
        Self {
            filters: FilterState::default(),
            search: String::new(),
            page: 1,
            limit: limit.max(1),
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn has_active_filters(&self) -> bool {
        !self.filters.is_empty() || !self.search.is_empty()
    }

    pub fn with_facet(&self, facet: Facet, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        *next.filters.facet_mut(facet) = value.into();
        next.page = 1;
        next
    }

    pub fn with_fluorescence(&self, fluorescence: Option<FluorescenceFilter>) -> Self {
        let mut next = self.clone();
        next.filters.fluorescence = fluorescence;
        next.page = 1;
        next
    }

    pub fn with_search(&self, search: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.search = search.into();
        next.page = 1;
        next
    }

    pub fn with_page(&self, page: u32) -> Self {
        let mut next = self.clone();
        next.page = page.max(1);
        next
    }

    pub fn cleared(&self) -> Self {
        Self::new(self.limit)
    }

    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor {
            page: self.page,
            limit: self.limit,
            search: non_empty(&self.search),
            mineral: non_empty(&self.filters.mineral),
            location: non_empty(&self.filters.location),
            color: non_empty(&self.filters.color),
            fluorescence: self.filters.fluorescence,
        }
    }
}

/// Canonical outbound parameters for one listing request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub mineral: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub fluorescence: Option<FluorescenceFilter>,
}

impl RequestDescriptor {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        let optional = [
            ("search", self.search.as_deref()),
            (Facet::Mineral.param_name(), self.mineral.as_deref()),
            (Facet::Location.param_name(), self.location.as_deref()),
            (Facet::Color.param_name(), self.color.as_deref()),
            (
                "fluorescence",
                self.fluorescence.map(FluorescenceFilter::wire_value),
            ),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                pairs.push((key, value.to_string()));
            }
        }
        pairs
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deep_state() -> QueryState {
        QueryState::default()
            .with_facet(Facet::Location, "Franklin, NJ")
            .with_page(7)
    }

    #[test]
    fn filter_and_search_mutations_reset_page() {
        let state = deep_state();
        assert_eq!(state.descriptor().page, 7);

        assert_eq!(state.with_facet(Facet::Mineral, "Calcite").descriptor().page, 1);
        assert_eq!(
            state
                .with_fluorescence(Some(FluorescenceFilter::Longwave))
                .descriptor()
                .page,
            1
        );
        assert_eq!(state.with_search("crust").descriptor().page, 1);
        assert_eq!(state.with_search("").descriptor().page, 1);
        assert_eq!(state.cleared().descriptor().page, 1);
    }

    #[test]
    fn page_navigation_keeps_filters() {
        let state = QueryState::default()
            .with_facet(Facet::Color, "green")
            .with_search("willemite");
        let paged = state.with_page(3);
        assert_eq!(paged.filters(), state.filters());
        assert_eq!(paged.search(), "willemite");
        assert_eq!(paged.page(), 3);
        assert_eq!(state.with_page(0).page(), 1);
    }

    #[test]
    fn descriptor_includes_only_non_empty_fields() {
        let descriptor = QueryState::default()
            .with_facet(Facet::Mineral, "Calcite")
            .with_fluorescence(Some(FluorescenceFilter::Shortwave))
            .descriptor();
        assert_eq!(
            descriptor.query_pairs(),
            vec![
                ("page", "1".to_string()),
                ("limit", "20".to_string()),
                ("mineral", "Calcite".to_string()),
                ("fluorescence", "shortwave".to_string()),
            ]
        );

        let unfiltered = QueryState::default().descriptor().query_pairs();
        assert_eq!(
            unfiltered,
            vec![("page", "1".to_string()), ("limit", "20".to_string())]
        );
    }

    #[test]
    fn descriptors_compare_on_all_inputs() {
        let base = QueryState::default().with_search("agate");
        assert_eq!(base.descriptor(), base.clone().descriptor());
        assert_ne!(base.descriptor(), base.with_page(2).descriptor());
        assert_ne!(
            base.descriptor(),
            base.with_facet(Facet::Color, "red").descriptor()
        );
        assert_ne!(base.descriptor(), QueryState::new(10).with_search("agate").descriptor());
    }

    #[test]
    fn clearing_resets_everything_but_limit() {
        let state = QueryState::new(12)
            .with_facet(Facet::Mineral, "Quartz")
            .with_facet(Facet::Location, "Herkimer")
            .with_facet(Facet::Color, "clear")
            .with_fluorescence(Some(FluorescenceFilter::NonFluorescent))
            .with_search("diamond")
            .with_page(4);
        assert!(state.has_active_filters());

        let cleared = state.cleared();
        assert!(!cleared.has_active_filters());
        assert_eq!(cleared.page(), 1);
        assert_eq!(cleared.limit(), 12);
    }

    #[test]
    fn fluorescence_wire_values_round_trip_through_parser() {
        assert_eq!(
            FluorescenceFilter::from_wire(" MIDWAVE "),
            Some(FluorescenceFilter::Midwave)
        );
        assert_eq!(FluorescenceFilter::from_wire("ultraviolet"), None);
    }
}
