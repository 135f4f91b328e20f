//! Client side of the contribution flow.
//!
//! [`ethereum::EthereumWallet`] drives an EIP-1193 style wallet through an
//! ethers provider (account access, chain switch, balance, transfer, receipt
//! wait).
//! [`tracker_api::TrackerClient`] talks to the tracker service, and
//! [`orchestrator::Orchestrator`] sequences one contribution attempt across
//! both.

pub mod chain;
pub mod ethereum;
pub mod orchestrator;
pub mod provider;
pub mod tracker_api;
