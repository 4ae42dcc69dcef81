//! Contract constants for the Agoric chain node service.
//!
//! The marker patterns and the unit name must match the real service's
//! journal output for a measurement to succeed.

/// Unit restarted and watched by default.
pub const SERVICE_NAME: &str = "ag-chain-cosmos.service";

/// Journal line marking that systemd finished starting the unit.
pub const STARTED_MARKER: &str = r"Started Agoric Cosmos daemon\.$";

/// Journal line marking the first block received from the chain.
pub const FIRST_BLOCK_MARKER: &str = r"block-manager: block \d+ begin$";

/// How long each restart cycle may wait for both markers.
pub const DEFAULT_SCAN_TIMEOUT: &str = "120s";
