//! Test doubles for the client and module layers.
//!
//! A [`ScriptedTransport`] answers an ordered script of expected requests
//! with named responses from a [`ResponseRegistry`], recording everything it
//! sees in a [`RequestRecorder`]. Tests assert on the recorded sequence.

pub mod recorder;
pub mod recording_host;
pub mod registry;
pub mod scripted_transport;

pub use recorder::{RecordedRequest, RequestRecorder};
pub use recording_host::RecordingHost;
pub use registry::{CannedResponse, ResponseRegistry};
pub use scripted_transport::ScriptedTransport;
