//! CSS selectors for idealo search result pages.
//!
//! idealo ships hashed class names; when results stop parsing, capture a fresh
//! page into `tests/fixtures/` and update the suffixes here.

use std::sync::LazyLock;

use scraper::Selector;

/// Class the renderer waits for before returning the page.
pub const RESULT_CLASS: &str = "sr-resultList__item_m6xdA";

pub static RESULT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.sr-resultList__item_m6xdA").expect("static selector"));

pub static TITLE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.sr-productSummary__title_f5flP").expect("static selector")
});

pub static PRICE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.sr-detailedPriceInfo__price_sYVmx").expect("static selector")
});

pub static OFFER_COUNT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.sr-detailedPriceInfo__offerCount_PJByo").expect("static selector")
});

pub static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

pub static IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img").expect("static selector"));
