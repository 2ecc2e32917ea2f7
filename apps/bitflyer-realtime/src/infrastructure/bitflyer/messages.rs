//! bitFlyer Realtime Message Types
//!
//! Payloads carried in the `message` field of `channelMessage` notifications.
//!
//! # References
//!
//! - [Realtime API](https://bf-lightning-api.readme.io/docs/realtime-api)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Best bid/ask and volume snapshot for one product.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "product_code": "BTC_JPY",
///   "state": "RUNNING",
///   "timestamp": "2019-04-11T05:14:12.3739915Z",
///   "tick_id": 25965446,
///   "best_bid": 580006,
///   "best_ask": 580771,
///   "best_bid_size": 2.00000013,
///   "best_ask_size": 0.4,
///   "total_bid_depth": 1581.64414981,
///   "total_ask_depth": 1415.32079982,
///   "market_bid_size": 0,
///   "market_ask_size": 0,
///   "ltp": 580790,
///   "volume": 6703.96837634,
///   "volume_by_product": 6703.96837634
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    /// Product code, e.g. `BTC_JPY`.
    pub product_code: String,

    /// Time the snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Board state, e.g. `RUNNING`.
    pub state: String,

    /// Monotonic tick id.
    pub tick_id: i64,

    /// Best bid price.
    pub best_bid: Decimal,

    /// Best ask price.
    pub best_ask: Decimal,

    /// Size at the best bid.
    pub best_bid_size: Decimal,

    /// Size at the best ask.
    pub best_ask_size: Decimal,

    /// Total size on the bid side.
    pub total_bid_depth: Decimal,

    /// Total size on the ask side.
    pub total_ask_depth: Decimal,

    /// Pending market buy size.
    pub market_bid_size: Decimal,

    /// Pending market sell size.
    pub market_ask_size: Decimal,

    /// Last traded price.
    #[serde(rename = "ltp")]
    pub last_trade_price: Decimal,

    /// 24h volume.
    pub volume: Decimal,

    /// 24h volume of this product.
    pub volume_by_product: Decimal,
}

impl Ticker {
    /// Difference between best ask and best bid.
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.best_ask - self.best_bid
    }
}

/// Taker side of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Taker bought.
    Buy,
    /// Taker sold.
    Sell,
    /// No taker, e.g. executions during itayose.
    #[serde(other)]
    Unknown,
}

/// One trade on the executions channel.
///
/// The channel pushes a JSON array of these per message.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "id": 39361,
///   "side": "SELL",
///   "price": 35100,
///   "size": 0.01,
///   "exec_date": "2015-07-07T10:44:33.547Z",
///   "buy_child_order_acceptance_id": "JRF20150707-014356-184990",
///   "sell_child_order_acceptance_id": "JRF20150707-104433-186048"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    /// Execution id.
    pub id: i64,

    /// Taker side.
    pub side: Side,

    /// Execution price.
    pub price: Decimal,

    /// Executed size.
    pub size: Decimal,

    /// Execution time.
    pub exec_date: DateTime<Utc>,

    /// Acceptance id of the buy order.
    pub buy_child_order_acceptance_id: String,

    /// Acceptance id of the sell order.
    pub sell_child_order_acceptance_id: String,
}
