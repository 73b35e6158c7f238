//! Integration tests for the shipyard engine


mod test_compose_sync;
mod test_fingerprint;
mod test_properties;
