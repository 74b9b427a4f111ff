use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{Cart, CustomerDetails};
use crate::flows::DialogState;
use crate::pricing::{PriceQuote, ShippingTier, Weight};
use crate::search::ProductListing;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scratch fields of the delivery calculation in progress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CalculationDraft {
    pub listed_price: Option<Decimal>,
    pub tier: Option<ShippingTier>,
    pub weight: Option<Weight>,
    pub quote: Option<PriceQuote>,
    pub link: Option<String>,
    pub features: Option<String>,
    pub title: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckoutDraft {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl CheckoutDraft {
    /// All four fields, or `None` while any is still missing.
    pub fn customer(&self) -> Option<CustomerDetails> {
        Some(CustomerDetails {
            name: self.name.clone()?,
            phone: self.phone.clone()?,
            email: self.email.clone()?,
            address: self.address.clone()?,
        })
    }
}

/// One page cursor over the results of the last search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResults {
    pub query: String,
    pub listings: Vec<ProductListing>,
    pub position: usize,
}

impl SearchResults {
    pub fn new(query: impl Into<String>, listings: Vec<ProductListing>) -> Self {
        Self { query: query.into(), listings, position: 0 }
    }

    pub fn current(&self) -> Option<&ProductListing> {
        self.listings.get(self.position)
    }

    pub fn get(&self, index: usize) -> Option<&ProductListing> {
        self.listings.get(index)
    }

    /// Moves the cursor; out-of-range pages leave it where it was.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index < self.listings.len() {
            self.position = index;
            true
        } else {
            false
        }
    }

    pub fn has_previous(&self) -> bool {
        self.position > 0
    }

    pub fn has_next(&self) -> bool {
        self.position + 1 < self.listings.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: SessionId,
    pub state: DialogState,
    pub calculation: CalculationDraft,
    pub checkout: CheckoutDraft,
    pub cart: Cart,
    pub search: Option<SearchResults>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: DialogState::Idle,
            calculation: CalculationDraft::default(),
            checkout: CheckoutDraft::default(),
            cart: Cart::new(),
            search: None,
        }
    }

    /// Drops calculation scratch and cached search results. The cart is untouched.
    pub fn reset_calculation(&mut self) {
        self.calculation = CalculationDraft::default();
        self.search = None;
    }

    pub fn reset_checkout(&mut self) {
        self.checkout = CheckoutDraft::default();
    }

    pub fn clear_cart(&mut self) {
        self.cart.clear();
    }
}

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_seen: Instant,
}

/// Bounded map of live conversations with idle-TTL and LRU eviction.
///
/// Each session sits behind its own mutex, so a caller holding it processes one
/// interaction at a time for that chat while other chats proceed.
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, SessionSlot>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), idle_ttl, max_sessions: max_sessions.max(1) }
    }

    /// Returns the session for `id`, creating it on first contact.
    pub async fn acquire(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        if let Some(slot) = sessions.get_mut(id) {
            slot.last_seen = now;
            return Arc::clone(&slot.session);
        }

        while sessions.len() >= self.max_sessions {
            let Some(oldest) =
                sessions.iter().min_by_key(|(_, slot)| slot.last_seen).map(|(key, _)| key.clone())
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(
                event_name = "session.evicted_lru",
                session_id = %oldest,
                "evicted least recently used session"
            );
        }

        let session = Arc::new(Mutex::new(Session::new(id.clone())));
        sessions.insert(id.clone(), SessionSlot { session: Arc::clone(&session), last_seen: now });
        session
    }

    /// Removes sessions idle for at least the configured TTL; returns how many went.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.last_seen.elapsed() < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(
                event_name = "session.evicted_idle",
                evicted,
                remaining = sessions.len(),
                "evicted idle sessions"
            );
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    pub async fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().await.contains_key(id)
    }
}
