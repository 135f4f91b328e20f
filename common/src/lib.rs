pub mod contribution;
pub mod network;
pub mod wallet;
