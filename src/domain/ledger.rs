//! FIFO cost-basis ledger.
//!
//! Holdings and realized gains are never stored; they are rebuilt by
//! replaying the transaction log oldest first. All money amounts are whole
//! currency units.

use crate::domain::error::EntryError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

/// Tax charged per direction. Only the sell leg is taxed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxPolicy {
    pub sell_tax_rate: f64,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        TaxPolicy {
            sell_tax_rate: 0.003,
        }
    }
}

impl TaxPolicy {
    pub fn tax_for(&self, direction: Direction, gross: i64) -> i64 {
        match direction {
            Direction::Buy => 0,
            Direction::Sell => (gross as f64 * self.sell_tax_rate).round() as i64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub security: String,
    pub date: NaiveDate,
    pub direction: Direction,
    pub price: f64,
    pub quantity: i64,
    pub fee: i64,
    pub tax: i64,
    pub gross_amount: i64,
    /// Buy: total paid. Sell: total received.
    pub net_amount: i64,
}

impl Transaction {
    /// Derive gross, tax and net amounts from price × quantity.
    pub fn new(
        security: &str,
        date: NaiveDate,
        direction: Direction,
        price: f64,
        quantity: i64,
        fee: i64,
        policy: &TaxPolicy,
    ) -> Result<Self, EntryError> {
        if quantity <= 0 {
            return Err(EntryError::InvalidNumber {
                field: "quantity",
                value: quantity.to_string(),
            });
        }
        if !price.is_finite() || price < 0.0 {
            return Err(EntryError::InvalidNumber {
                field: "price",
                value: price.to_string(),
            });
        }
        if fee < 0 {
            return Err(EntryError::InvalidNumber {
                field: "fee",
                value: fee.to_string(),
            });
        }

        let gross_amount = (price * quantity as f64).round() as i64;
        let tax = policy.tax_for(direction, gross_amount);
        let net_amount = match direction {
            Direction::Buy => gross_amount + fee,
            Direction::Sell => gross_amount - fee - tax,
        };

        Ok(Transaction {
            security: security.to_string(),
            date,
            direction,
            price,
            quantity,
            fee,
            tax,
            gross_amount,
            net_amount,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lot {
    pub security: String,
    pub acquired: NaiveDate,
    pub quantity: i64,
    pub net_cost: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealizedGain {
    pub security: String,
    pub date: NaiveDate,
    pub quantity: i64,
    pub proceeds: i64,
    pub cost_basis: i64,
    pub net_gain: i64,
}

/// A sell that exceeded the recorded holdings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityIssue {
    pub security: String,
    pub date: NaiveDate,
    pub unmatched: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    lots: BTreeMap<String, VecDeque<Lot>>,
    realized: Vec<RealizedGain>,
    issues: Vec<DataQualityIssue>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh ledger built from `transactions`, which must be oldest first.
    pub fn replay<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut ledger = Ledger::new();
        for tx in transactions {
            ledger.apply(tx);
        }
        ledger
    }

    pub fn apply(&mut self, tx: &Transaction) {
        match tx.direction {
            Direction::Buy => self.buy(tx),
            Direction::Sell => self.sell(tx),
        }
    }

    fn buy(&mut self, tx: &Transaction) {
        self.lots
            .entry(tx.security.clone())
            .or_default()
            .push_back(Lot {
                security: tx.security.clone(),
                acquired: tx.date,
                quantity: tx.quantity,
                net_cost: tx.net_amount,
            });
    }

    fn sell(&mut self, tx: &Transaction) {
        let mut remaining_qty = tx.quantity;
        let mut remaining_net = tx.net_amount;
        let mut proceeds = 0;
        let mut cost_basis = 0;

        if let Some(queue) = self.lots.get_mut(&tx.security) {
            while remaining_qty > 0 {
                let Some(lot) = queue.front_mut() else {
                    break;
                };
                let k = lot.quantity.min(remaining_qty);
                let cost = pro_rata(lot.net_cost, k, lot.quantity);
                let share = pro_rata(remaining_net, k, remaining_qty);

                cost_basis += cost;
                proceeds += share;
                lot.quantity -= k;
                lot.net_cost -= cost;
                remaining_qty -= k;
                remaining_net -= share;

                if lot.quantity == 0 {
                    queue.pop_front();
                }
            }
            if queue.is_empty() {
                self.lots.remove(&tx.security);
            }
        }

        if remaining_qty > 0 {
            tracing::warn!(
                security = %tx.security,
                date = %tx.date,
                sold = tx.quantity,
                unmatched = remaining_qty,
                "sell exceeds recorded holdings"
            );
            self.issues.push(DataQualityIssue {
                security: tx.security.clone(),
                date: tx.date,
                unmatched: remaining_qty,
            });
        }

        let matched = tx.quantity - remaining_qty;
        if matched > 0 {
            self.realized.push(RealizedGain {
                security: tx.security.clone(),
                date: tx.date,
                quantity: matched,
                proceeds,
                cost_basis,
                net_gain: proceeds - cost_basis,
            });
        }
    }

    /// Open lots of one security, oldest first.
    pub fn lots(&self, security: &str) -> impl Iterator<Item = &Lot> {
        self.lots.get(security).into_iter().flatten()
    }

    /// Securities with open lots, sorted.
    pub fn held_securities(&self) -> impl Iterator<Item = &str> {
        self.lots.keys().map(String::as_str)
    }

    /// (quantity, net cost) still open for `security`.
    pub fn position(&self, security: &str) -> (i64, i64) {
        self.lots(security)
            .fold((0, 0), |(q, c), lot| (q + lot.quantity, c + lot.net_cost))
    }

    pub fn realized(&self) -> &[RealizedGain] {
        &self.realized
    }

    pub fn issues(&self) -> &[DataQualityIssue] {
        &self.issues
    }
}

/// round(amount × part / whole)
fn pro_rata(amount: i64, part: i64, whole: i64) -> i64 {
    if part == whole {
        return amount;
    }
    (amount as f64 * part as f64 / whole as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn tx(day: u32, direction: Direction, price: f64, quantity: i64, fee: i64) -> Transaction {
        Transaction::new("2330", d(day), direction, price, quantity, fee, &TaxPolicy::default())
            .unwrap()
    }

    #[test]
    fn buy_amounts() {
        let t = tx(1, Direction::Buy, 10.0, 100, 20);
        assert_eq!(t.gross_amount, 1000);
        assert_eq!(t.tax, 0);
        assert_eq!(t.net_amount, 1020);
    }

    #[test]
    fn sell_amounts_include_tax() {
        let t = tx(1, Direction::Sell, 12.0, 1000, 17);
        assert_eq!(t.gross_amount, 12_000);
        assert_eq!(t.tax, 36);
        assert_eq!(t.net_amount, 12_000 - 17 - 36);
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let err = Transaction::new(
            "2330",
            d(1),
            Direction::Buy,
            10.0,
            0,
            0,
            &TaxPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, EntryError::InvalidNumber { field: "quantity", .. }));
    }

    #[test]
    fn buy_creates_lot_without_gain() {
        let ledger = Ledger::replay(&[tx(1, Direction::Buy, 10.0, 100, 20)]);
        assert_eq!(ledger.position("2330"), (100, 1020));
        assert!(ledger.realized().is_empty());
    }

    #[test]
    fn full_sell_consumes_lot() {
        let buy = tx(1, Direction::Buy, 10.0, 100, 20);
        let sell = tx(2, Direction::Sell, 12.0, 100, 20);
        let ledger = Ledger::replay(&[buy, sell.clone()]);

        assert_eq!(ledger.position("2330"), (0, 0));
        assert_eq!(ledger.held_securities().count(), 0);
        let gain = &ledger.realized()[0];
        assert_eq!(gain.quantity, 100);
        assert_eq!(gain.proceeds, sell.net_amount);
        assert_eq!(gain.cost_basis, 1020);
        assert_eq!(gain.net_gain, sell.net_amount - 1020);
    }

    #[test]
    fn partial_sell_splits_cost_pro_rata() {
        let ledger = Ledger::replay(&[
            tx(1, Direction::Buy, 10.0, 100, 0),
            tx(2, Direction::Sell, 15.0, 40, 0),
        ]);
        // cost 1000 * 40/100
        assert_eq!(ledger.realized()[0].cost_basis, 400);
        assert_eq!(ledger.position("2330"), (60, 600));
    }

    #[test]
    fn sell_spans_lots_oldest_first() {
        let ledger = Ledger::replay(&[
            tx(1, Direction::Buy, 10.0, 50, 0),
            tx(2, Direction::Buy, 20.0, 50, 0),
            tx(3, Direction::Sell, 30.0, 75, 0),
        ]);
        let gain = &ledger.realized()[0];
        // all of lot 1 (500) + half of lot 2 (500)
        assert_eq!(gain.cost_basis, 1000);
        assert_eq!(gain.quantity, 75);

        let open: Vec<_> = ledger.lots("2330").collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].acquired, d(2));
        assert_eq!(open[0].quantity, 25);
        assert_eq!(open[0].net_cost, 500);
    }

    #[test]
    fn sell_exceeding_holdings_records_matched_part() {
        let ledger = Ledger::replay(&[
            tx(1, Direction::Buy, 10.0, 60, 0),
            tx(2, Direction::Sell, 11.0, 100, 0),
        ]);

        assert_eq!(ledger.realized().len(), 1);
        assert_eq!(ledger.realized()[0].quantity, 60);
        assert_eq!(ledger.issues()[0].unmatched, 40);
        assert_eq!(ledger.position("2330"), (0, 0));
    }

    #[test]
    fn sell_with_no_holdings_records_nothing() {
        let ledger = Ledger::replay(&[tx(2, Direction::Sell, 11.0, 100, 0)]);
        assert!(ledger.realized().is_empty());
        assert_eq!(ledger.issues().len(), 1);
        assert_eq!(ledger.issues()[0].unmatched, 100);
    }

    #[test]
    fn replay_is_deterministic() {
        let log = vec![
            tx(1, Direction::Buy, 10.5, 333, 7),
            tx(2, Direction::Buy, 11.25, 71, 3),
            tx(3, Direction::Sell, 12.0, 200, 9),
            tx(4, Direction::Sell, 9.0, 150, 9),
        ];
        assert_eq!(Ledger::replay(&log), Ledger::replay(&log));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Buy { qty: i64, price: u32, fee: i64 },
        Sell { pct: u8, price: u32, fee: i64 },
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            (1i64..5_000, 1u32..2_000, 0i64..100)
                .prop_map(|(qty, price, fee)| Step::Buy { qty, price, fee }),
            (1u8..=100, 1u32..2_000, 0i64..100)
                .prop_map(|(pct, price, fee)| Step::Sell { pct, price, fee }),
        ]
    }

    proptest! {
        #[test]
        fn fifo_conserves_quantity_and_cost(steps in prop::collection::vec(step(), 1..60)) {
            let policy = TaxPolicy::default();
            let mut log = Vec::new();
            let mut held = 0i64;
            let mut bought_qty = 0i64;
            let mut bought_cost = 0i64;

            for (i, s) in steps.iter().enumerate() {
                let date = d(1) + chrono::Duration::days(i as i64);
                match *s {
                    Step::Buy { qty, price, fee } => {
                        let t = Transaction::new("X", date, Direction::Buy, price as f64 / 10.0, qty, fee, &policy).unwrap();
                        bought_qty += qty;
                        bought_cost += t.net_amount;
                        held += qty;
                        log.push(t);
                    }
                    Step::Sell { pct, price, fee } => {
                        let qty = held * pct as i64 / 100;
                        if qty == 0 {
                            continue;
                        }
                        held -= qty;
                        log.push(Transaction::new("X", date, Direction::Sell, price as f64 / 10.0, qty, fee, &policy).unwrap());
                    }
                }
            }

            let ledger = Ledger::replay(&log);
            let (open_qty, open_cost) = ledger.position("X");
            let sold_qty: i64 = ledger.realized().iter().map(|g| g.quantity).sum();
            let sold_cost: i64 = ledger.realized().iter().map(|g| g.cost_basis).sum();

            prop_assert!(ledger.issues().is_empty());
            prop_assert_eq!(open_qty + sold_qty, bought_qty);
            prop_assert_eq!(open_qty, held);
            prop_assert_eq!(open_cost + sold_cost, bought_cost);
            prop_assert!(ledger.lots("X").all(|l| l.quantity > 0));
        }
    }
}
