use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

/// Sized order handed to the execution router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    /// Order size as a fraction of portfolio value.
    pub size_pct: f64,
    pub kind: OrderKind,
}

/// Microstructure snapshot at routing time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub spread_bps: f64,
    pub depth_usd: f64,
    pub volatility_pct: f64,
    /// 1 = deep/liquid, 2 = moderate, 3 = thin/illiquid.
    pub liquidity_tier: u8,
}

/// The fixed set of execution styles the router may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStyle {
    Limit,
    Twap,
    Vwap,
    Iceberg,
    Halt,
}

impl fmt::Display for ExecutionStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStyle::Limit => "limit",
            ExecutionStyle::Twap => "twap",
            ExecutionStyle::Vwap => "vwap",
            ExecutionStyle::Iceberg => "iceberg",
            ExecutionStyle::Halt => "halt",
        };
        write!(f, "{s}")
    }
}

/// Child-order schedule for sliced styles (twap/vwap/iceberg).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSchedule {
    pub slices: u32,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLeg {
    pub style: ExecutionStyle,
    pub schedule: Option<ChildSchedule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub primary: ExecutionLeg,
    pub fallback: Option<ExecutionLeg>,
}

impl ExecutionPlan {
    pub fn is_halt(&self) -> bool {
        self.primary.style == ExecutionStyle::Halt
    }
}
