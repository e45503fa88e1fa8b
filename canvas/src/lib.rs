//! Board model and interaction engine for the multi-user whiteboard.
//!
//! Everything here is pure state: no sockets, no timers, no rendering
//! surface. The client crate feeds it remote events and pointer / key input,
//! and forwards the resulting [`engine::Action`]s to the transport.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Testable [`engine::EngineCore`] and the actions it emits |
//! | [`batch`] | AI action batches applied through the engine |
//! | [`doc`] | Board objects, patches, and the replicated object store |
//! | [`select`] | Selection set and rubber-band selection |
//! | [`transform`] | Group resize / rotate math |
//! | [`layout`] | Connector routing, content bounds, renormalization |
//! | [`presence`] | Remote cursors, the presence roster, cursor throttling |
//! | [`camera`] | Pan/zoom camera, canvas offset, and geometry primitives |
//! | [`input`] | Input event types and the gesture state machine |
//! | [`hit`] | Hit-testing against board objects and selection handles |
//! | [`consts`] | Shared numeric constants (zoom limits, minimum sizes, etc.) |

pub mod batch;
pub mod camera;
pub mod consts;
pub mod doc;
pub mod engine;
pub mod hit;
pub mod input;
pub mod layout;
pub mod presence;
pub mod select;
pub mod transform;
