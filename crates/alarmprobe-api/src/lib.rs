// alarmprobe-api: transport plumbing for the alarm pipeline harness
//
// REST gateway client, Consul endpoint resolution and a bounded Kafka
// subscription. No scenario logic lives here.

pub mod discovery;
pub mod error;
pub mod kafka;
pub mod rest;
pub mod transport;

pub use discovery::{ConsulResolver, Endpoint};
pub use error::Error;
pub use kafka::{KafkaBroker, SubscribeOptions, Subscription};
pub use rest::{AdminState, Device, NewDevice, RestClient};
pub use transport::{TlsMode, TransportConfig};
