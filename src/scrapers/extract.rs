use crate::models::Listing;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// One listing tile on a results page
pub const LISTING_SELECTOR: &str = "article.ordered-element";

const TITLE_SELECTOR: &str = "h3.tile__title";
const LOCATION_SELECTOR: &str = "h3.tile__location";
const DESCRIPTION_SELECTOR: &str = "p.tile__description";
const PRICE_SELECTOR: &str = "p.price__text";
const INFO_SELECTOR: &str = "ul.tile__info li";
const LINK_SELECTOR: &str = "a.tile__link";

struct Selectors {
    listing: Selector,
    title: Selector,
    location: Selector,
    description: Selector,
    price: Selector,
    info: Selector,
    link: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        // Constant selectors, known to parse
        let parse = |s: &str| Selector::parse(s).unwrap();
        Selectors {
            listing: parse(LISTING_SELECTOR),
            title: parse(TITLE_SELECTOR),
            location: parse(LOCATION_SELECTOR),
            description: parse(DESCRIPTION_SELECTOR),
            price: parse(PRICE_SELECTOR),
            info: parse(INFO_SELECTOR),
            link: parse(LINK_SELECTOR),
        }
    })
}

/// Fields a tile can fail to provide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Location,
    Description,
    Price,
    Info,
    Url,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Title => "title",
            Field::Location => "location",
            Field::Description => "description",
            Field::Price => "price",
            Field::Info => "info",
            Field::Url => "url",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    #[error("no element matching `{0}`")]
    MissingElement(&'static str),
    #[error("element has no `{0}` attribute")]
    MissingAttribute(&'static str),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Why a field came out empty
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field}: {kind}")]
pub struct FieldError {
    pub field: Field,
    pub kind: FieldErrorKind,
}

impl FieldError {
    fn new(field: Field, kind: FieldErrorKind) -> Self {
        Self { field, kind }
    }
}

/// A listing plus the fields that could not be filled
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub listing: Listing,
    pub failures: Vec<FieldError>,
}

impl Extraction {
    pub fn failed(&self, field: Field) -> Option<&FieldError> {
        self.failures.iter().find(|f| f.field == field)
    }
}

/// Result of extracting every tile on one page
#[derive(Debug, Clone, Default)]
pub struct PageExtraction {
    /// Tiles present on the page
    pub found: usize,
    /// Tiles that yielded a url
    pub listings: Vec<Listing>,
    /// Tiles dropped for lacking a url
    pub dropped: usize,
}

/// Visible text with whitespace collapsed
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

// ASCII only, so "2 m²" gives "2" rather than "2²"
fn digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// "Apartment, 101m²" -> ("Apartment", Some("101m²"))
pub fn split_title(title: &str) -> (String, Option<String>) {
    if !title.contains(',') {
        return (title.trim().to_string(), None);
    }

    let mut parts = title.split(',');
    let property_type = parts.next().unwrap_or_default().trim().to_string();
    let size = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    (property_type, size)
}

/// Absolute URL for a tile link, joined onto the site origin when relative
pub fn resolve_url(origin: &Url, href: &str) -> Result<String, FieldErrorKind> {
    let href = href.trim();
    if href.is_empty() {
        return Err(FieldErrorKind::InvalidUrl("empty href".to_string()));
    }

    origin
        .join(href)
        .map(|u| u.to_string())
        .map_err(|e| FieldErrorKind::InvalidUrl(format!("{}: {}", href, e)))
}

fn select_text(
    tile: ElementRef<'_>,
    selector: &Selector,
    css: &'static str,
    field: Field,
    failures: &mut Vec<FieldError>,
) -> Option<String> {
    match tile.select(selector).next() {
        Some(el) => Some(element_text(el)),
        None => {
            failures.push(FieldError::new(field, FieldErrorKind::MissingElement(css)));
            None
        }
    }
}

/// Extract one listing tile. Missing pieces become `None` and are recorded
/// in `failures`; nothing here aborts the rest of the record.
pub fn extract_listing(tile: ElementRef<'_>, origin: &Url) -> Extraction {
    let sel = selectors();
    let mut failures = Vec::new();
    let mut listing = Listing::default();

    if let Some(title) = select_text(tile, &sel.title, TITLE_SELECTOR, Field::Title, &mut failures)
    {
        let (property_type, size) = split_title(&title);
        listing.property_type = Some(property_type);
        listing.size = size;
        listing.title = Some(title);
    }

    listing.location = select_text(
        tile,
        &sel.location,
        LOCATION_SELECTOR,
        Field::Location,
        &mut failures,
    );
    listing.description = select_text(
        tile,
        &sel.description,
        DESCRIPTION_SELECTOR,
        Field::Description,
        &mut failures,
    );
    listing.price = select_text(tile, &sel.price, PRICE_SELECTOR, Field::Price, &mut failures);

    let mut info_items = tile.select(&sel.info).peekable();
    if info_items.peek().is_none() {
        failures.push(FieldError::new(
            Field::Info,
            FieldErrorKind::MissingElement(INFO_SELECTOR),
        ));
    }
    for item in info_items {
        let kind = item.value().attr("title").unwrap_or_default().to_lowercase();
        let text = element_text(item);

        if kind.contains("floor") {
            listing.floor = Some(text);
        } else if kind.contains("bedroom") {
            listing.bedrooms = Some(digits(&text));
        } else if kind.contains("bathroom") {
            listing.bathrooms = Some(digits(&text));
        }
    }

    let url = match tile.select(&sel.link).next() {
        None => Err(FieldErrorKind::MissingElement(LINK_SELECTOR)),
        Some(link) => match link.value().attr("href") {
            None => Err(FieldErrorKind::MissingAttribute("href")),
            Some(href) => resolve_url(origin, href),
        },
    };
    match url {
        Ok(url) => listing.url = Some(url),
        Err(kind) => failures.push(FieldError::new(Field::Url, kind)),
    }

    Extraction { listing, failures }
}

/// Extract every tile on a results page, keeping only listings with a url
pub fn extract_page(html: &str, origin: &Url) -> PageExtraction {
    let document = Html::parse_document(html);
    let mut page = PageExtraction::default();

    for tile in document.select(&selectors().listing) {
        page.found += 1;
        let extraction = extract_listing(tile, origin);

        for failure in extraction.failures.iter().filter(|f| f.field != Field::Url) {
            debug!("    Tile {}: {}", page.found, failure);
        }

        if extraction.listing.url.is_some() {
            page.listings.push(extraction.listing);
        } else {
            if let Some(failure) = extraction.failed(Field::Url) {
                debug!("    Dropping tile {}: {}", page.found, failure);
            }
            page.dropped += 1;
        }
    }

    page
}
