use lotgrab_core::plan::file_name_of;
use lotgrab_core::{sanitize_name, LotRecord};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Page address fragment identifying the seller dashboard.
pub const DASHBOARD_URL_MARKER: &str = "seller.ctbids.com/sales/dashboard/";
/// Auction name used when the page carries none.
pub const DEFAULT_AUCTION_NAME: &str = "Default-Auction";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResult {
    pub auction_name: String,
    pub lots: Vec<LotRecord>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Not a seller dashboard page: {0}")]
    NotADashboard(String),
    #[error("No data received from page.")]
    NoData,
}

pub fn is_dashboard_url(url: &str) -> bool {
    url.contains(DASHBOARD_URL_MARKER)
}

struct Selectors {
    auction_name: Selector,
    lot_cards: Selector,
    lot_container: Selector,
    image: Selector,
    title: Selector,
    status: Selector,
}

impl Selectors {
    fn new() -> Option<Self> {
        Some(Self {
            auction_name: Selector::parse("span.mx-2").ok()?,
            lot_cards: Selector::parse(".row.row-cols-1 > .col").ok()?,
            lot_container: Selector::parse(".row.row-cols-1").ok()?,
            image: Selector::parse("img.location-image").ok()?,
            title: Selector::parse(".title.h5.text-bold").ok()?,
            status: Selector::parse(".d-flex.align-items-center.justify-content-between.header > div > div")
                .ok()?,
        })
    }
}

/// Reads the auction name and lot cards out of a dashboard page.
///
/// `page_url` resolves relative image sources. A page without any lot grid is
/// a scrape failure; a grid with no usable cards yields an empty lot list.
pub fn scrape_dashboard(html: &str, page_url: Option<&str>) -> Result<ScrapeResult, ScrapeError> {
    let selectors = Selectors::new().ok_or(ScrapeError::NoData)?;
    let document = Html::parse_document(html);
    if document.select(&selectors.lot_container).next().is_none() {
        return Err(ScrapeError::NoData);
    }
    let base = page_url.and_then(|u| Url::parse(u).ok());

    let auction_name = document
        .select(&selectors.auction_name)
        .next()
        .map(element_text)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_AUCTION_NAME.to_string());

    let lots = document
        .select(&selectors.lot_cards)
        .filter_map(|card| scrape_card(card, &selectors, base.as_ref()))
        .collect();

    Ok(ScrapeResult { auction_name, lots })
}

fn scrape_card(card: ElementRef, selectors: &Selectors, base: Option<&Url>) -> Option<LotRecord> {
    let image = card.select(&selectors.image).next()?;
    let title = card.select(&selectors.title).next()?;
    let src = image.value().attr("src")?.trim();
    let thumbnail_url = match base {
        Some(base) => base.join(src).map(String::from).unwrap_or_else(|_| src.to_string()),
        None => src.to_string(),
    };
    let is_pending = card
        .select(&selectors.status)
        .next()
        .is_some_and(|status| element_text(status) == "Pending");
    let lot_id = file_name_of(&thumbnail_url)
        .split('_')
        .next()
        .unwrap_or_default()
        .to_string();

    Some(LotRecord {
        title: sanitize_name(&title.text().collect::<String>()),
        thumbnail_url,
        is_pending,
        lot_id,
    })
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
