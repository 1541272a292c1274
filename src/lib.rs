//! NIFTY stock screener.
//!
//! Loads an index universe from the NSE indices CSV, fetches price history
//! and fundamentals from Yahoo Finance plus best-effort promoter shareholding
//! from NSE, evaluates each ticker against threshold rules across five
//! dimensions, and writes a ranked CSV report.

#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod screen;
pub mod technical;
pub mod universe;
