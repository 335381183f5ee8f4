// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Wallet sign-in by challenge-response.
//!
//! ## Auth Flow
//!
//! 1. Client requests a challenge for its address (`/auth/siwe/challenge`)
//! 2. Server stores a nonce-bound EIP-4361 message, valid for 10 minutes
//! 3. Client signs the exact message with its wallet
//! 4. Server consumes the challenge, verifies the signature and issues an
//!    HS256 session token
//! 5. Client sends `Authorization: Bearer <token>` on protected routes
//!
//! ## Security
//!
//! - A challenge verifies at most once, even under concurrent requests
//! - Failed verification attempts still consume the challenge
//! - Tokens are always signature-checked; there is no unverified decode path
//! - Clock skew tolerance is 60 seconds

pub mod challenge;
pub mod claims;
pub mod error;
pub mod extractor;
pub mod message;
pub mod token;
pub mod verifier;

pub use challenge::{ChallengeService, ChallengeSettings, CHALLENGE_TTL_SECS};
pub use claims::{AuthenticatedUser, SessionClaims};
pub use error::AuthError;
pub use extractor::Auth;
pub use message::SignInMessage;
pub use token::{IssuedToken, TokenIssuer};
pub use verifier::SignatureVerifier;
