pub mod loopback_endpoint;
