//! Domain types shared by the planner, synchronizer and factor engine.

pub mod action;
pub mod bar;
pub mod factor;
pub mod kind;
pub mod symbol;

pub use action::{ActionKind, CorporateAction, ExRights, GbbqRecord};
pub use bar::{DailyPoint, MinutePoint, PricePoint, Stamp};
pub use factor::AdjustmentFactor;
pub use kind::{DataKind, MinuteStream, ParseKindError};
pub use symbol::{Symbol, SymbolError};
