//! `ag-webrtc-sfu`
//!
//! A many-to-many WebRTC selective forwarding unit: clients connect over
//! a websocket control channel, authenticate with a bearer token, and
//! establish a single peer connection with the server, which republishes
//! every participant's media to every other participant in the room.

pub mod api;
pub mod auth;
pub mod config;
pub mod sfu;
pub mod ws;
