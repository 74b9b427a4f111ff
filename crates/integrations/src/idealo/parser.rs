use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use landed_core::search::ProductListing;

use super::selectors;

pub const IDEALO_ORIGIN: &str = "https://www.idealo.de";

const UNTITLED: &str = "Untitled product";
const PRICE_UNKNOWN: &str = "price not listed";

/// Extracts at most `limit` result cards from an idealo search page.
pub fn parse_listings(html: &str, limit: usize) -> Vec<ProductListing> {
    let document = Html::parse_document(html);
    let listings: Vec<ProductListing> =
        document.select(&selectors::RESULT).take(limit).map(parse_card).collect();

    debug!(event_name = "search.page_parsed", listings = listings.len(), "parsed idealo results");
    listings
}

fn parse_card(card: ElementRef<'_>) -> ProductListing {
    let link_tag = card.select(&selectors::LINK).next();
    let image_tag = card.select(&selectors::IMAGE).next();

    let link = link_tag
        .and_then(|tag| tag.value().attr("href"))
        .map(absolute_link)
        .unwrap_or_default();

    let title = first_text(card, &selectors::TITLE)
        .or_else(|| link_tag.map(element_text).filter(|text| !text.is_empty()))
        .or_else(|| {
            image_tag
                .and_then(|tag| tag.value().attr("alt"))
                .map(|alt| alt.trim().to_owned())
                .filter(|alt| !alt.is_empty())
        })
        .unwrap_or_else(|| UNTITLED.to_owned());

    let price = first_text(card, &selectors::PRICE)
        .map(|text| text.replace("ab", "").trim().to_owned())
        .unwrap_or_else(|| PRICE_UNKNOWN.to_owned());

    let offers_count = first_text(card, &selectors::OFFER_COUNT)
        .map(|text| text.replace("Angebote", "").trim().to_owned());

    let image_url = image_tag
        .and_then(|tag| tag.value().attr("src"))
        .map(str::to_owned)
        .filter(|src| !src.is_empty());

    ProductListing { title, price, image_url, link, offers_count }
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector).next().map(element_text).filter(|text| !text.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).filter(|part| !part.is_empty()).collect::<Vec<_>>().join(" ")
}

fn absolute_link(href: &str) -> String {
    if href.starts_with("http") {
        href.to_owned()
    } else {
        format!("{IDEALO_ORIGIN}{href}")
    }
}
