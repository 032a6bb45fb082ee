use amqp_sampler_core::ConnectionOptions;
use lapin::ConnectionProperties;

/// Builds the `amqp://` URI for a connection. Credentials and the virtual
/// host are percent-encoded, so the default vhost `/` becomes `%2f`.
pub fn amqp_uri(opts: &ConnectionOptions) -> String {
    format!(
        "amqp://{}:{}@{}:{}/{}",
        urlencoding::encode(&opts.username),
        urlencoding::encode(&opts.password),
        opts.host,
        opts.port,
        urlencoding::encode(&opts.virtual_host),
    )
}

/// Same as [`amqp_uri`] with the password masked, for logs.
pub fn redacted_uri(opts: &ConnectionOptions) -> String {
    format!(
        "amqp://{}:***@{}:{}/{}",
        urlencoding::encode(&opts.username),
        opts.host,
        opts.port,
        urlencoding::encode(&opts.virtual_host),
    )
}

pub fn connection_properties(name: &str) -> ConnectionProperties {
    ConnectionProperties::default().with_connection_name(name.into())
}
