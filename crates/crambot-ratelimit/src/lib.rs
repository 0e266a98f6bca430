// SPDX-FileCopyrightText: 2026 Crambot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate limiting for the Crambot gateway.

pub mod bucket;
pub mod limiter;
pub mod throttle;
pub mod window;

pub use limiter::RateLimiter;
pub use throttle::ThrottledTransport;
