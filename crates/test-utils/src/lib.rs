// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! Shared test fixtures for the ROLAP execution core.
//!
//! Every crate from `rolap-cache` up needs a sample star, a dialect, and
//! something to execute SQL against without a real database. This crate
//! centralises those so individual test modules don't hand-roll schema
//! setup — see [`fixtures`] for the star/AggStar builders and [`executor`]
//! for the in-memory [`rolap_loader::SqlExecutor`]/[`rolap_loader::RowCursor`]
//! pair.

pub mod assertions;
pub mod executor;
pub mod fixtures;

pub use executor::{FixedRowCursor, FixedRowsExecutor};
pub use fixtures::{conservative_dialect, permissive_dialect, sales_star, sales_star_with_agg};
