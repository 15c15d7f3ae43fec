use crate::query::{Facet, FluorescenceFilter, QueryState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub api_url: Option<String>,
    pub search: Option<String>,
    pub mineral: Option<String>,
    pub location: Option<String>,
    pub color: Option<String>,
    pub fluorescence: Option<FluorescenceFilter>,
    pub page: Option<u32>,
}

impl LaunchOptions {
    /// Initial query for the session; the requested page is applied last so
    /// filter resets do not discard it.
    pub fn initial_query(&self, limit: u32) -> QueryState {
        let mut query = QueryState::new(limit);
        let facets = [
            (Facet::Mineral, &self.mineral),
            (Facet::Location, &self.location),
            (Facet::Color, &self.color),
        ];
        for (facet, value) in facets {
            if let Some(value) = value {
                query = query.with_facet(facet, value.as_str());
            }
        }
        if self.fluorescence.is_some() {
            query = query.with_fluorescence(self.fluorescence);
        }
        if let Some(search) = self.search.as_ref() {
            query = query.with_search(search.as_str());
        }
        if let Some(page) = self.page {
            query = query.with_page(page);
        }
        query
    }
}

pub fn parse_launch_options_from_args(args: &[String]) -> Result<LaunchOptions, String> {
    let mut options = LaunchOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let (flag, inline_value) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag, Some(value.to_string())),
            _ => (arg.as_str(), None),
        };
        let mut value = || -> Result<String, String> {
            match inline_value.clone() {
                Some(value) => Ok(value),
                None => iter
                    .next()
                    .cloned()
                    .ok_or_else(|| format!("Missing value after {flag}.")),
            }
        };

        match flag {
            "--api-url" | "--api" => options.api_url = Some(value()?),
            "--search" | "-s" => options.search = Some(value()?),
            "--mineral" => options.mineral = Some(value()?),
            "--location" => options.location = Some(value()?),
            "--color" => options.color = Some(value()?),
            "--fluorescence" => {
                let raw = value()?;
                let parsed = FluorescenceFilter::from_wire(&raw).ok_or_else(|| {
                    format!(
                        "Unknown fluorescence {raw:?}; expected one of {}.",
                        FluorescenceFilter::ALL
                            .iter()
                            .map(|filter| filter.wire_value())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })?;
                options.fluorescence = Some(parsed);
            }
            "--page" => {
                let raw = value()?;
                let page = raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|page| *page >= 1)
                    .ok_or_else(|| "page must be a positive integer.".to_string())?;
                options.page = Some(page);
            }
            other => return Err(format!("Unrecognized argument {other:?}.")),
        }
    }

    Ok(options)
}
