//! User-facing texts and the keyboards attached to them.

use std::fmt::Write as _;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use landed_core::currency::CurrencyConverter;
use landed_core::domain::{Cart, ItemSource};
use landed_core::errors::InterfaceError;
use landed_core::money::{Currency, Money};
use landed_core::pricing::{
    LandedCostEngine, PriceQuote, PricingEngine, PricingRates, ShippingTable, ShippingTier,
};
use landed_core::session::{CheckoutDraft, SearchResults};
use landed_core::submission::SubmissionReceipt;

use crate::actions::CallbackAction;
use crate::keyboards::{main_menu, InlineKeyboardBuilder, MessageBuilder, Reply};

/// Formats source-currency amounts with an approximate display-currency figure.
///
/// The converted figure is dropped, never the message, when rates are unavailable.
pub struct PriceFormatter {
    source: Currency,
    display: Currency,
    converter: Option<Arc<CurrencyConverter>>,
}

impl PriceFormatter {
    pub fn new(
        source: Currency,
        display: Currency,
        converter: Option<Arc<CurrencyConverter>>,
    ) -> Self {
        Self { source, display, converter }
    }

    /// Formatter that never converts.
    pub fn source_only(source: Currency) -> Self {
        Self { display: source.clone(), source, converter: None }
    }

    pub fn source(&self) -> &Currency {
        &self.source
    }

    pub async fn amount(&self, amount: Decimal) -> String {
        let money = Money::new(amount, self.source.clone());
        let Some(converter) = self.converter.as_ref().filter(|_| self.source != self.display)
        else {
            return money.display();
        };

        match converter.convert(amount, &self.source, &self.display).await {
            Ok(converted) => format!("{} (≈ {})", money.display(), converted.display()),
            Err(error) => {
                warn!(
                    event_name = "render.conversion_skipped",
                    error = %error,
                    "showing amount without converted figure"
                );
                money.display()
            }
        }
    }

    fn plain(&self, amount: Decimal) -> String {
        Money::new(amount, self.source.clone()).display()
    }
}

pub fn percent(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::from(100)).normalize())
}

pub fn welcome() -> Reply {
    main_menu(
        MessageBuilder::new("Hi! I help you buy goods from German shops with delivery to Russia.")
            .paragraph(
                "🧮 Calculate delivery: send a price and get the full landed cost.\n\
                 🔎 Search products: find offers on idealo.de.\n\
                 🛒 Cart: collect items and place one order.",
            ),
    )
    .build()
}

pub fn help() -> Reply {
    main_menu(
        MessageBuilder::new("Commands")
            .paragraph(
                "/calc - calculate delivery for an item\n\
                 /search - search products\n\
                 /cart - show your cart\n\
                 /cancel - stop the current step\n\
                 /about - how pricing works\n\
                 /support - contact us",
            ),
    )
    .build()
}

pub fn about(rates: &PricingRates, currency: &Currency) -> Reply {
    let money = |amount| Money::new(amount, currency.clone()).display();
    MessageBuilder::new("How the price is built")
        .paragraph(format!(
            "1. German VAT ({}) is removed from the listed price.\n\
             2. Forwarding to our warehouse costs {}.\n\
             3. International shipping follows the carrier tariff for the parcel weight.\n\
             4. Our commission is {} of goods plus shipping.\n\
             5. Insurance is {} of goods plus commission.",
            percent(rates.vat_rate),
            money(rates.warehouse_leg),
            percent(rates.commission_rate),
            percent(rates.insurance_rate),
        ))
        .paragraph(format!(
            "Orders above {} per parcel may be charged import duty of {} on the excess.",
            money(rates.duty_threshold),
            percent(rates.duty_rate),
        ))
        .inline(|keyboard| {
            keyboard.row(|row| {
                row.callback("🧮 Calculate delivery", CallbackAction::StartCalculation);
            });
        })
        .build()
}

pub fn support() -> Reply {
    MessageBuilder::new("Questions about an order or a product?")
        .paragraph("Write to us right here and a manager will reply during working hours.")
        .build()
}

pub fn main_menu_reply() -> Reply {
    main_menu(MessageBuilder::new("Main menu. What would you like to do?")).build()
}

pub fn stale_action() -> Reply {
    main_menu(MessageBuilder::new("That button is no longer active.")).build()
}

/// Shown when handling an update failed unexpectedly. The session keeps its last good state.
pub fn internal_error(failure: &InterfaceError) -> Reply {
    main_menu(
        MessageBuilder::new(format!("⚠️ {}", failure.user_message()))
            .paragraph(format!("Reference: {}", failure.correlation_id())),
    )
    .build()
}

pub fn unexpected_text() -> Reply {
    main_menu(MessageBuilder::new("Please pick an option from the menu below.")).build()
}

pub fn price_prompt() -> Reply {
    MessageBuilder::new("Send the item price in euros as listed in the shop, for example 89.95.")
        .inline(cancel_row)
        .build()
}

pub fn duty_notice(
    engine: &LandedCostEngine,
    listed_price: Decimal,
    currency: &Currency,
) -> Reply {
    let rates = engine.rates();
    let money = |amount| Money::new(amount, currency.clone()).display();
    let duty = engine.duty_estimate(listed_price).unwrap_or(Decimal::ZERO);
    MessageBuilder::new(format!(
        "⚠️ The price is above the {} customs threshold.",
        money(rates.duty_threshold)
    ))
    .paragraph(format!(
        "Import duty may apply on receipt: ({} - {}) × {} = {}.",
        money(listed_price),
        money(rates.duty_threshold),
        percent(rates.duty_rate),
        money(duty),
    ))
    .build()
}

pub fn tier_prompt(table: &ShippingTable) -> Reply {
    MessageBuilder::new("Choose a shipping method.")
        .inline(|keyboard| {
            for tier in table.tiers() {
                keyboard.row(|row| {
                    row.callback(tier.label(), CallbackAction::Tier(tier));
                });
            }
            cancel_row(keyboard);
        })
        .build()
}

pub fn weight_prompt(table: &ShippingTable, tier: ShippingTier, currency: &Currency) -> Reply {
    let weights = table.weights(tier).unwrap_or_default();
    MessageBuilder::new(format!("{}: choose the parcel weight.", tier.label()))
        .paragraph("Shipping cost for each weight is shown on the button.")
        .inline(|keyboard| {
            for pair in weights.chunks(2) {
                keyboard.row(|row| {
                    for (weight, cost) in pair {
                        let label =
                            format!("{weight} · {}", Money::new(*cost, currency.clone()).display());
                        row.callback(label, CallbackAction::Weight(*weight));
                    }
                });
            }
            cancel_row(keyboard);
        })
        .build()
}

pub fn link_prompt() -> Reply {
    MessageBuilder::new("Send the product link (it must start with http:// or https://).")
        .inline(cancel_row)
        .build()
}

pub fn features_prompt() -> Reply {
    MessageBuilder::new("Describe size, colour or other details we should know when ordering.")
        .inline(cancel_row)
        .build()
}

pub fn quantity_prompt() -> Reply {
    MessageBuilder::new("How many pieces? Send a number from 1 to 999.").inline(cancel_row).build()
}

pub async fn quote_breakdown(
    quote: &PriceQuote,
    rates: &PricingRates,
    formatter: &PriceFormatter,
) -> Reply {
    let mut lines = String::new();
    let _ = writeln!(lines, "Listed price: {}", formatter.amount(quote.listed_price).await);
    let _ = writeln!(
        lines,
        "Without German VAT ({}): {}",
        percent(quote.vat_rate),
        formatter.amount(quote.net_price).await
    );
    let _ = writeln!(lines, "Forwarding to warehouse: {}", formatter.plain(quote.warehouse_leg));
    let _ = writeln!(
        lines,
        "Shipping {} {}: {}",
        quote.tier,
        quote.weight,
        formatter.plain(quote.international_leg)
    );
    let _ = writeln!(
        lines,
        "Commission ({}): {}",
        percent(rates.commission_rate),
        formatter.plain(quote.commission)
    );
    let _ = write!(
        lines,
        "Insurance ({}): {}",
        percent(rates.insurance_rate),
        formatter.plain(quote.insurance)
    );

    MessageBuilder::new("📦 Delivery estimate")
        .paragraph(lines)
        .paragraph(format!("Total: {}", formatter.amount(quote.total).await))
        .paragraph(format!(
            "You save {} of VAT. With VAT the same item would cost {}.",
            formatter.plain(quote.savings),
            formatter.plain(quote.total_with_notional_vat()),
        ))
        .inline(|keyboard| {
            keyboard
                .row(|row| {
                    row.callback("🛒 Add to cart", CallbackAction::AddToCart)
                        .callback("🔢 Quantity", CallbackAction::ChooseQuantity);
                })
                .row(|row| {
                    row.callback("🧮 New calculation", CallbackAction::StartCalculation)
                        .callback("Main menu", CallbackAction::MainMenu);
                });
        })
        .build()
}

pub fn added_to_cart(cart_len: usize) -> Reply {
    MessageBuilder::new(format!("✅ Added to cart. Items in cart: {cart_len}."))
        .inline(|keyboard| {
            keyboard.row(|row| {
                row.callback("🛒 Cart", CallbackAction::ShowCart)
                    .callback("✔️ Checkout", CallbackAction::Checkout);
            });
        })
        .build()
}

pub fn query_prompt() -> Reply {
    MessageBuilder::new("What are you looking for? Send at least 2 characters, e.g. nike air max.")
        .inline(cancel_row)
        .build()
}

pub fn listing_card(results: &SearchResults) -> Reply {
    let Some(listing) = results.current() else {
        return no_results(&results.query);
    };
    let position = results.position;

    let mut details = format!("Price: {}", listing.price);
    if let Some(offers) = &listing.offers_count {
        let _ = write!(details, "\nOffers: {offers}");
    }

    let builder = MessageBuilder::new(listing.title.clone())
        .paragraph(details)
        .paragraph(format!("Result {} of {}", position + 1, results.listings.len()))
        .inline(|keyboard| {
            if !listing.link.is_empty() {
                keyboard.row(|row| {
                    row.link("🔗 Open product", listing.link.clone());
                });
            }
            keyboard
                .row(|row| {
                    let calculate = CallbackAction::ListingCalculate(position);
                    row.callback("🧮 Calculate delivery", calculate);
                })
                .row(|row| {
                    row.callback("🛒 Add to cart", CallbackAction::ListingAdd(position));
                })
                .row(|row| {
                    if results.has_previous() {
                        row.callback("◀️ Previous", CallbackAction::Page(position - 1));
                    }
                    if results.has_next() {
                        row.callback("Next ▶️", CallbackAction::Page(position + 1));
                    }
                })
                .row(|row| {
                    row.callback("Main menu", CallbackAction::MainMenu);
                });
        });

    match &listing.image_url {
        Some(url) => builder.photo(url.clone()).build(),
        None => builder.build(),
    }
}

pub fn no_results(query: &str) -> Reply {
    MessageBuilder::new(format!("Nothing found for \"{query}\". Try another query."))
        .inline(cancel_row)
        .build()
}

pub fn search_unavailable() -> Reply {
    MessageBuilder::new("Search is temporarily unavailable. Please try again later.")
        .paragraph("You can still calculate delivery by entering the price yourself.")
        .inline(|keyboard| {
            keyboard.row(|row| {
                row.callback("🧮 Calculate delivery", CallbackAction::StartCalculation)
                    .callback("Main menu", CallbackAction::MainMenu);
            });
        })
        .build()
}

pub fn listing_without_price() -> Reply {
    MessageBuilder::new("This offer has no price listed. Enter the price yourself to calculate.")
        .inline(|keyboard| {
            keyboard.row(|row| {
                row.callback("🧮 Calculate delivery", CallbackAction::StartCalculation);
            });
        })
        .build()
}

pub async fn cart_view(
    cart: &Cart,
    engine: &dyn PricingEngine,
    formatter: &PriceFormatter,
) -> Reply {
    if cart.is_empty() {
        return MessageBuilder::new("🛒 Your cart is empty.")
            .inline(|keyboard| {
                keyboard.row(|row| {
                    row.callback("🧮 Calculate delivery", CallbackAction::StartCalculation)
                        .callback("🔎 Search", CallbackAction::StartSearch);
                });
            })
            .build();
    }

    let mut builder = MessageBuilder::new(format!("🛒 Your cart ({} items)", cart.len()));
    for (index, item) in cart.items().iter().enumerate() {
        let mut block = format!("{}. {} ×{}", index + 1, item.display_title(), item.quantity);
        if let Some(price) = item.listed_price {
            let _ = write!(block, "\nListed price: {}", formatter.plain(price));
        }
        match item.effective_quote(engine) {
            Some(quote) => {
                let _ = write!(
                    block,
                    "\nDelivered: {} each, {} total",
                    formatter.plain(quote.total),
                    formatter.amount(item.line_total(engine)).await
                );
            }
            None => block.push_str("\nDelivery not calculated yet"),
        }
        if let Some(features) = &item.features {
            let _ = write!(block, "\nDetails: {features}");
        }
        if item.source == ItemSource::Search {
            if let Some(link) = &item.link {
                let _ = write!(block, "\n{link}");
            }
        }
        builder = builder.paragraph(block);
    }
    if cart.len() > 1 {
        let grand_total = formatter.amount(cart.total(engine)).await;
        builder = builder.paragraph(format!("Grand total: {grand_total}"));
    }

    let count = cart.len();
    builder
        .inline(|keyboard| {
            for index in 0..count {
                keyboard.row(|row| {
                    let label = format!("❌ Remove {}", index + 1);
                    row.callback(label, CallbackAction::Remove(index));
                });
            }
            keyboard.row(|row| {
                row.callback("🗑 Clear cart", CallbackAction::ClearCart)
                    .callback("✔️ Checkout", CallbackAction::Checkout);
            });
        })
        .build()
}

pub fn item_removed(title: &str) -> Reply {
    MessageBuilder::new(format!("Removed \"{title}\" from the cart."))
        .inline(|keyboard| {
            keyboard.row(|row| {
                row.callback("🛒 Cart", CallbackAction::ShowCart);
            });
        })
        .build()
}

pub fn cart_cleared() -> Reply {
    main_menu(MessageBuilder::new("Cart cleared.")).build()
}

pub fn empty_cart_checkout() -> Reply {
    main_menu(MessageBuilder::new("Your cart is empty. Add an item before checking out.")).build()
}

pub fn name_prompt() -> Reply {
    MessageBuilder::new("Checkout 1/4. What is the recipient's full name?")
        .inline(cancel_row)
        .build()
}

pub fn phone_prompt() -> Reply {
    MessageBuilder::new("Checkout 2/4. Phone number for the courier?").inline(cancel_row).build()
}

pub fn email_prompt() -> Reply {
    MessageBuilder::new("Checkout 3/4. Email for order updates?").inline(cancel_row).build()
}

pub fn address_prompt() -> Reply {
    MessageBuilder::new("Checkout 4/4. Delivery address with postcode and city?")
        .inline(cancel_row)
        .build()
}

pub async fn order_summary(
    checkout: &CheckoutDraft,
    cart: &Cart,
    engine: &dyn PricingEngine,
    formatter: &PriceFormatter,
) -> Reply {
    let field = |value: &Option<String>| value.clone().unwrap_or_default();
    let customer = format!(
        "Name: {}\nPhone: {}\nEmail: {}\nAddress: {}",
        field(&checkout.name),
        field(&checkout.phone),
        field(&checkout.email),
        field(&checkout.address),
    );

    let mut items = String::from("Items:");
    for (index, item) in cart.items().iter().enumerate() {
        let _ = write!(
            items,
            "\n{}. {} ×{} = {}",
            index + 1,
            item.display_title(),
            item.quantity,
            formatter.plain(item.line_total(engine))
        );
    }

    MessageBuilder::new("Please check your order")
        .paragraph(customer)
        .paragraph(items)
        .paragraph(format!("Total: {}", formatter.amount(cart.total(engine)).await))
        .inline(|keyboard| {
            keyboard
                .row(|row| {
                    row.callback("✅ Confirm", CallbackAction::Confirm);
                })
                .row(|row| {
                    row.callback("✏️ Start over", CallbackAction::Restart)
                        .callback("Cancel", CallbackAction::Cancel);
                });
        })
        .build()
}

pub fn order_accepted(receipt: &SubmissionReceipt) -> Reply {
    let total = Money::new(receipt.order.totals.grand_total, receipt.order.currency.clone());
    main_menu(
        MessageBuilder::new(format!("✅ Order #{} accepted.", receipt.order.order_id))
            .paragraph(format!("Total: {}", total.display()))
            .paragraph("A manager will contact you shortly to arrange payment."),
    )
    .build()
}

pub fn submission_failed(failure: &InterfaceError) -> Reply {
    MessageBuilder::new(format!("❌ {}", failure.user_message()))
        .paragraph(format!(
            "Please try again in a minute or contact support with reference {}.",
            failure.correlation_id()
        ))
        .inline(|keyboard| {
            keyboard
                .row(|row| {
                    row.callback("🔁 Try again", CallbackAction::Confirm);
                })
                .row(|row| {
                    row.callback("💬 Support", CallbackAction::Support)
                        .callback("Cancel", CallbackAction::Cancel);
                });
        })
        .build()
}

/// Prefixes a re-prompt with what was wrong with the last input.
pub fn rejected(reason: &str, prompt: Reply) -> Reply {
    match prompt {
        Reply::Text { text, keyboard } => {
            Reply::Text { text: format!("{reason}\n\n{text}"), keyboard }
        }
        Reply::Photo { photo_url, caption, keyboard } => {
            Reply::Photo { photo_url, caption: format!("{reason}\n\n{caption}"), keyboard }
        }
    }
}

fn cancel_row(keyboard: &mut InlineKeyboardBuilder) {
    keyboard.row(|row| {
        row.callback("✖️ Cancel", CallbackAction::Cancel);
    });
}
