//! Test-only mock WebSocket client speaking the course-selection server's
//! text frame protocol, for use from `services/server`'s integration
//! tests.

mod mock_ws_client;

pub use mock_ws_client::CcaWsClient;
