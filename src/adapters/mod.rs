//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                 |
//! |-------------|---------------------|-----------------------------|
//! | `hardware`  | OutputPort          | siren, strobe, LED, relays  |
//! |             | InputPin            | wired zone GPIOs            |
//! | `log_sink`  | EventSink           | Serial log output           |
//! |             | NotifyPort          | Serial log (messenger stub) |
//! |             | PublishPort         | Serial log (broker stub)    |
//! | `nvs`       | ConfigPort          | NVS / in-memory store       |
//! |             | StoragePort         |                             |
//! | `time`      | -                   | ESP32 system timer          |
//! | `device`    | AlarmIo (all ports) | the adapters above          |

pub mod device;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
