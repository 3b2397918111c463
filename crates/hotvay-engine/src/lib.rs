//! Hotvay Engine
//!
//! The engine turns keypad events into actions:
//! - [`DeviceSource`] reads the keypad and emits [`DeviceEvent`]s
//! - [`ConfigSource`] watches the config file and emits validated configs
//! - [`Dispatcher`] owns the live [`RegistrationTable`], consumes both streams
//!   and runs matching [`Action`]s concurrently
//!
//! Both sources are [`EventStream`]s: cancellable, deduplicating wrappers
//! around native callback or blocking producers.
//!
//! ```no_run
//! # async fn demo() -> hotvay_engine::Result<()> {
//! use std::sync::Arc;
//! use hotvay_engine::*;
//!
//! let configs = ConfigSource::new("/home/me/.hotvay").watch()?;
//! let devices = DeviceSource::real(DeviceCfg::default()).subscribe();
//! let dispatcher = Dispatcher::new(Arc::new(SystemActions), DispatchCfg::default());
//! dispatcher.start(configs, devices)?;
//! // ... later
//! dispatcher.stop().await;
//! # Ok(())
//! # }
//! ```

mod action;
mod deps;
mod device;
mod dispatcher;
mod error;
mod focus;
mod registration;
mod source;
mod stream;
pub mod test_support;

pub use action::{Action, ActionFactory, CommandAction, FocusAppAction, NO_OUTPUT, SystemActions};
pub use deps::{AppControl, DeviceApi, DeviceLink, RealAppControl, RealDeviceApi};
pub use device::{DeviceCfg, DeviceEvent, DeviceSource, ReconnectPolicy};
pub use dispatcher::{DispatchCfg, Dispatcher, DispatcherState};
pub use error::{Error, Result};
pub use registration::{Registration, RegistrationTable};
pub use source::{ConfigSource, watch_file};
pub use stream::{Dedup, Emitter, EventStream};
