pub mod capture_session;
pub mod host_args;
pub mod pump;

#[cfg(test)]
pub(crate) mod fake_endpoint;
