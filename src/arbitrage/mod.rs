//! Arbitrage detection and trade sizing.

use crate::amm::{price_impact, SwapSide, VirtualReserves};
use crate::models::{ArbOpportunity, TradeDirection};

pub mod planner;

pub use planner::{Planner, PlannerConfig};

/// Candidate trade sizes as fractions of the buy venue's quote reserve.
/// Small to large; both venues' impact curves are nonlinear and asymmetric,
/// so there is no closed-form optimum to solve for.
const SIZE_LADDER: [f64; 8] = [1e-4, 3e-4, 1e-3, 3e-3, 0.01, 0.02, 0.03, 0.05];

/// A raw spread reading that cleared the fee-net profitability gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadSignal {
    pub spread_bps: i32,
    pub direction: TradeDirection,
}

/// Compare venue prices and decide whether the spread clears the combined
/// fees plus the minimum profit threshold.
///
/// The curve is venue A, the pool venue B:
/// `spread_bps = round((price_curve - price_amm) / price_amm * 10_000)`.
/// Both venues' fees are subtracted from the raw spread before the
/// threshold check; skipping that subtraction yields false positives.
pub fn detect(
    price_curve: f64,
    price_amm: f64,
    fee_curve_bps: f64,
    fee_amm_bps: f64,
    min_profit_bps: i32,
) -> Option<SpreadSignal> {
    if price_curve <= 0.0 || price_amm <= 0.0 {
        return None;
    }
    let spread_bps = ((price_curve - price_amm) / price_amm * 10_000.0).round() as i32;
    if spread_bps == 0 {
        return None;
    }
    let net_bps = spread_bps.abs() as f64 - fee_curve_bps - fee_amm_bps;
    if net_bps < min_profit_bps as f64 {
        return None;
    }
    let direction = if spread_bps > 0 {
        // Curve is pricier: buy on the pool, sell into the curve.
        TradeDirection::BuyAmmSellCurve
    } else {
        TradeDirection::BuyCurveSellAmm
    };
    Some(SpreadSignal {
        spread_bps,
        direction,
    })
}

/// A sized round trip: quote committed on the buy leg and the estimated net
/// quote profit after fees and impact on both venues.
#[derive(Debug, Clone, Copy)]
pub struct SizedTrade {
    pub amount_in_quote: f64,
    pub profit_quote: f64,
}

/// Walk the size ladder, quoting the full round trip on both venues, and
/// keep the largest size whose net profit is positive and maximal.
pub fn size_trade(
    buy: &VirtualReserves,
    buy_fee_ppm: u32,
    sell: &VirtualReserves,
    sell_fee_ppm: u32,
) -> Option<SizedTrade> {
    let mut best: Option<SizedTrade> = None;
    for fraction in SIZE_LADDER {
        let amount_in = buy.quote * fraction;
        let Ok(buy_leg) = price_impact(buy, amount_in, SwapSide::QuoteIn, buy_fee_ppm) else {
            continue;
        };
        if buy_leg.amount_out <= 0.0 {
            continue;
        }
        let Ok(sell_leg) = price_impact(sell, buy_leg.amount_out, SwapSide::BaseIn, sell_fee_ppm)
        else {
            continue;
        };
        let profit = sell_leg.amount_out - amount_in;
        // `>=` prefers the larger of equally profitable sizes.
        if profit > 0.0 && best.map(|b| profit >= b.profit_quote).unwrap_or(true) {
            best = Some(SizedTrade {
                amount_in_quote: amount_in,
                profit_quote: profit,
            });
        }
    }
    best
}

/// Full detection pass over one snapshot of each venue.
pub fn find_opportunity(
    curve: &VirtualReserves,
    curve_fee_ppm: u32,
    amm: &VirtualReserves,
    amm_fee_ppm: u32,
    min_profit_bps: i32,
) -> Option<ArbOpportunity> {
    let price_curve = curve.spot_price();
    let price_amm = amm.spot_price();
    let signal = detect(
        price_curve,
        price_amm,
        curve_fee_ppm as f64 / 100.0,
        amm_fee_ppm as f64 / 100.0,
        min_profit_bps,
    )?;

    let (buy, buy_fee, sell, sell_fee) = match signal.direction {
        TradeDirection::BuyAmmSellCurve => (amm, amm_fee_ppm, curve, curve_fee_ppm),
        TradeDirection::BuyCurveSellAmm => (curve, curve_fee_ppm, amm, amm_fee_ppm),
    };
    let sized = size_trade(buy, buy_fee, sell, sell_fee)?;

    Some(ArbOpportunity {
        price_curve,
        price_amm,
        spread_bps: signal.spread_bps,
        direction: signal.direction,
        trade_amount: sized.amount_in_quote,
        expected_profit: sized.profit_quote,
    })
}
