//! HTML templates for the web dashboard.
//!
//! Templates are embedded at compile time using `include_str!`.

/// The base HTML template with navigation and layout.
pub const BASE_TEMPLATE: &str = include_str!("templates/base.html");

/// Dashboard pages in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
    Time,
    Team,
    Budget,
    ValueStreams,
    Stale,
    Table,
    Schema,
}

impl Page {
    pub const ALL: [Page; 8] = [
        Self::Overview,
        Self::Time,
        Self::Team,
        Self::Budget,
        Self::ValueStreams,
        Self::Stale,
        Self::Table,
        Self::Schema,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Self::Overview => "/",
            Self::Time => "/time",
            Self::Team => "/team",
            Self::Budget => "/budget",
            Self::ValueStreams => "/value-streams",
            Self::Stale => "/stale",
            Self::Table => "/table",
            Self::Schema => "/schema",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Time => "Time Tracking",
            Self::Team => "Team",
            Self::Budget => "Budget vs Actuals",
            Self::ValueStreams => "Value Streams",
            Self::Stale => "Stale Items",
            Self::Table => "Data Table",
            Self::Schema => "Schema",
        }
    }
}

/// Navigation links; `query` keeps the current filter on every page.
pub fn nav(active: Page, query: &str) -> String {
    Page::ALL
        .iter()
        .map(|page| {
            let class = if *page == active { r#" class="active""# } else { "" };
            let href = if query.is_empty() || *page == Page::Schema {
                page.path().to_string()
            } else {
                format!("{}?{}", page.path(), query)
            };
            format!(r#"<a href="{}"{}>{}</a>"#, super::html::escape(&href), class, page.title())
        })
        .collect()
}

/// Fill the base template. `title` is escaped, the fragments are not.
pub fn render_page(title: &str, nav: &str, filters: &str, content: &str) -> String {
    BASE_TEMPLATE
        .replace("{{title}}", &super::html::escape(title))
        .replace("{{nav}}", nav)
        .replace("{{filters}}", filters)
        .replace("{{version}}", env!("CARGO_PKG_VERSION"))
        .replace("{{content}}", content)
}
