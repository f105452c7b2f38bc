//! Side effects the core asks the shell to perform.

pub mod gateway;
pub mod navigate;
pub mod realtime;

use crux_core::render::Render;

pub use gateway::{Gateway, GatewayOperation, GatewayOutput, GatewayResponse};
pub use navigate::{Destination, Navigate};
pub use realtime::{Realtime, RealtimeOperation};

use crate::event::Event;
use crate::screen::ListingScreen;

#[derive(crux_core::macros::Effect)]
#[effect(app = "ListingScreen")]
pub struct Capabilities {
    pub gateway: Gateway<Event>,
    pub navigate: Navigate<Event>,
    pub realtime: Realtime<Event>,
    pub render: Render<Event>,
}
