use std::fmt;

/// One scraped advertisement
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Raw tile title, kept for debugging; not written to the CSV
    pub title: Option<String>,
    pub property_type: Option<String>,
    pub size: Option<String>,
    pub price: Option<String>,
    /// Digits only
    pub bedrooms: Option<String>,
    /// Digits only
    pub bathrooms: Option<String>,
    pub floor: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
}

/// Output columns in their fixed preferred order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    PropertyType,
    Size,
    Price,
    Bedrooms,
    Bathrooms,
    Floor,
    Location,
    Description,
    Url,
}

impl Column {
    pub const ORDER: [Column; 9] = [
        Column::PropertyType,
        Column::Size,
        Column::Price,
        Column::Bedrooms,
        Column::Bathrooms,
        Column::Floor,
        Column::Location,
        Column::Description,
        Column::Url,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::PropertyType => "property_type",
            Column::Size => "size",
            Column::Price => "price",
            Column::Bedrooms => "bedrooms",
            Column::Bathrooms => "bathrooms",
            Column::Floor => "floor",
            Column::Location => "location",
            Column::Description => "description",
            Column::Url => "url",
        }
    }

    pub fn value(self, listing: &Listing) -> Option<&str> {
        let field = match self {
            Column::PropertyType => &listing.property_type,
            Column::Size => &listing.size,
            Column::Price => &listing.price,
            Column::Bedrooms => &listing.bedrooms,
            Column::Bathrooms => &listing.bathrooms,
            Column::Floor => &listing.floor,
            Column::Location => &listing.location,
            Column::Description => &listing.description,
            Column::Url => &listing.url,
        };
        field.as_deref()
    }
}

/// Why pagination of an area ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    PageCap,
    EmptyPage(u32),
    FetchFailed { page: u32, error: String },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::PageCap => write!(f, "page cap reached"),
            StopReason::EmptyPage(page) => write!(f, "no listings on page {}", page),
            StopReason::FetchFailed { page, error } => {
                write!(f, "page {} failed: {}", page, error)
            }
        }
    }
}

/// Per-area outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaStats {
    pub name: String,
    pub pages_fetched: u32,
    pub listings: usize,
    pub stop: StopReason,
}

/// Everything collected by one run, in accumulation order
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub listings: Vec<Listing>,
    pub areas: Vec<AreaStats>,
}
