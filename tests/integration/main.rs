//! atoll integration harness.
//!
//! The engines are driven end to end through a scripted mock session
//! that records every wire call, so surviving sets, compensation targets
//! and chunk sequences can be asserted literally. The balancer tests
//! script the msgpack bus the same way.


mod chunked;
mod read_lookup;
