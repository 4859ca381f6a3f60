//! Client transports

mod websocket;

pub use websocket::WebSocketChannel;
