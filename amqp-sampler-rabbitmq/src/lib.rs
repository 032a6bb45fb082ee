mod options;
mod rabbit_client;

pub use options::{amqp_uri, connection_properties, redacted_uri};
pub use rabbit_client::{RabbitChannel, RabbitClient, RabbitConnection};
