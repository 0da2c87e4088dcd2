//! alpha-client
//!
//! Client side of Alpha Builder: polling market feeds, presenting stability
//! and airdrop rows, calling the onboarding backend, and resolving embedded
//! smart-account wallets.

pub mod airdrop;
pub mod api;
pub mod feed;
pub mod format;
pub mod stability;
pub mod wallet;

pub use airdrop::{airdrop_feed, AirdropFeed, AirdropItem, AirdropStatus, AirdropSummary};
pub use api::{ApiClientError, BackendClient};
pub use feed::{FeedError, FeedOptions, FeedState, PollingFeed, DEFAULT_POLL_INTERVAL};
pub use format::FeedValue;
pub use stability::{
    stability_feed, StabilityFeed, StabilityItem, StabilityRow, StabilityStatus, StabilitySummary,
};
pub use wallet::{embedded_wallet, EmbeddedWalletConfig};
