//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements         | Connects to                     |
//! |-------------|--------------------|---------------------------------|
//! | `hardware`  | SensorPort         | `embedded-hal` input pins       |
//! |             | ActuatorPort       | `embedded-hal` output pins      |
//! | `sim`       | (pins for above)   | in-memory lines (debug mode)    |
//! | `store`     | LastOpenStore      | postcard file / memory          |
//! | `transport` | NotifyTransport    | log output                      |
//! | `log_sink`  | EventSink          | log output                      |
//! | `time`      | Clock              | system wall clock               |
//! | `logger`    | `log::Log`         | log file / stderr               |
//! | `http`      | (serves `Router`)  | `std::net` TCP listener         |

pub mod hardware;
pub mod http;
pub mod log_sink;
pub mod logger;
pub mod sim;
pub mod store;
pub mod time;
pub mod transport;
