// Upstream client for the iClass campus service

pub mod client;

pub use client::IClassClient;
