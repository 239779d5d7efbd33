pub mod changes;
pub mod flaky_channel;
pub mod proxy_pair;

pub use changes::{create_node, set_property};
pub use flaky_channel::{flaky_channel, FlakySwitch};
pub use proxy_pair::{test_endpoint_config, ProxyPair};
