//! Cross-process event dispatch.

mod dispatcher;

pub use dispatcher::EventDispatcher;
