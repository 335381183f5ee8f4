// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Auth - Wallet Connection and Challenge-Response Sign-In
//!
//! A user proves control of a blockchain account by signing a one-time,
//! server-issued message. This crate holds both halves of that exchange.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Challenge issuance, signature verification, session tokens
//! - `storage` - Challenge and user records (redb)
//! - `wallet` - Client library: provider discovery, request gating and the
//!   connection state machine

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
pub mod wallet;

#[cfg(test)]
mod testing;
